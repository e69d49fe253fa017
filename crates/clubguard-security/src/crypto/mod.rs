//! Cryptographic utilities
//!
//! Field encryption is AES-256-GCM with a random nonce; the output text is
//! base64 of `nonce || ciphertext || tag`. Secret hashing is PBKDF2-HMAC-SHA256
//! with an application salt, so equal inputs give equal digests.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::Hmac;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use clubguard_common::error::{DecryptionError, Error, Result};

/// Random bytes behind each generated token (hex-encoded to 32 characters)
const TOKEN_BYTES: usize = 16;

const TAG_LEN: usize = 16;

/// Keyed encryption, hashing and token generation
#[derive(Clone)]
pub struct Encryptor {
    rng: SystemRandom,
    hash_salt: Vec<u8>,
    hash_iterations: u32,
}

impl Encryptor {
    pub fn new(hash_salt: &str, hash_iterations: u32) -> Self {
        Self {
            rng: SystemRandom::new(),
            hash_salt: hash_salt.as_bytes().to_vec(),
            hash_iterations: hash_iterations.max(1),
        }
    }

    /// Encrypt `plaintext` under `key`
    pub fn encrypt(&self, plaintext: &str, key: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| Error::Crypto("Failed to generate nonce".to_string()))?;

        let key = sealing_key(key)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut sealed = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut sealed)
            .map_err(|_| Error::Crypto("Encryption failed".to_string()))?;

        let mut output = nonce_bytes.to_vec();
        output.extend(sealed);
        Ok(BASE64.encode(output))
    }

    /// Decrypt text produced by [`Encryptor::encrypt`] with the same key
    pub fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String> {
        let raw = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| DecryptionError::Malformed(e.to_string()))?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(DecryptionError::Malformed("ciphertext too short".to_string()).into());
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| DecryptionError::Malformed("invalid nonce".to_string()))?;

        let key = sealing_key(key)?;
        let mut buffer = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| DecryptionError::AuthenticationFailed)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| DecryptionError::Malformed("plaintext is not UTF-8".to_string()).into())
    }

    /// Unpredictable 32-character hex token
    pub fn generate_token(&self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| Error::Crypto("Failed to generate token".to_string()))?;
        Ok(hex::encode(bytes))
    }

    /// Deterministic one-way digest of `secret`, hex-encoded
    pub fn hash_secret(&self, secret: &str) -> Result<String> {
        let mut digest = [0u8; 32];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(
            secret.as_bytes(),
            &self.hash_salt,
            self.hash_iterations,
            &mut digest,
        )
        .map_err(|e| Error::Crypto(format!("Secret hashing failed: {}", e)))?;
        Ok(hex::encode(digest))
    }

    /// Check `secret` against a digest from [`Encryptor::hash_secret`]
    #[allow(deprecated)]
    pub fn verify_secret(&self, secret: &str, digest: &str) -> bool {
        let Ok(expected) = hex::decode(digest) else {
            return false;
        };
        let Ok(actual) = self.hash_secret(secret).and_then(|h| {
            hex::decode(h).map_err(|e| Error::Crypto(e.to_string()))
        }) else {
            return false;
        };

        ring::constant_time::verify_slices_are_equal(&actual, &expected).is_ok()
    }
}

impl Default for Encryptor {
    fn default() -> Self {
        Self::new("clubguard.secret-hash.v1", 100_000)
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor")
            .field("hash_iterations", &self.hash_iterations)
            .finish_non_exhaustive()
    }
}

/// Derive the AES-256 key from the configured key string
fn sealing_key(key: &str) -> Result<LessSafeKey> {
    let key_bytes = Sha256::digest(key.as_bytes());
    let unbound = UnboundKey::new(&AES_256_GCM, key_bytes.as_slice())
        .map_err(|_| Error::Crypto("Invalid key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encryptor() -> Encryptor {
        // Low iteration count keeps the hashing tests fast.
        Encryptor::new("test-salt", 1_000)
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let enc = encryptor();
        let ciphertext = enc.encrypt("+49 170 1234567", "club-key").unwrap();
        assert_ne!(ciphertext, "+49 170 1234567");
        assert_eq!(enc.decrypt(&ciphertext, "club-key").unwrap(), "+49 170 1234567");
    }

    #[test]
    fn test_encryption_is_randomized() {
        let enc = encryptor();
        let a = enc.encrypt("same", "k").unwrap();
        let b = enc.encrypt("same", "k").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let enc = encryptor();
        let ciphertext = enc.encrypt("allergy: peanuts", "right").unwrap();
        let result = enc.decrypt(&ciphertext, "wrong");
        assert!(matches!(
            result,
            Err(Error::Decryption(DecryptionError::AuthenticationFailed))
        ));
    }

    #[test]
    fn test_decrypt_malformed_input() {
        let enc = encryptor();
        assert!(matches!(
            enc.decrypt("not base64!!", "k"),
            Err(Error::Decryption(DecryptionError::Malformed(_)))
        ));
        assert!(matches!(
            enc.decrypt(&BASE64.encode([0u8; 8]), "k"),
            Err(Error::Decryption(DecryptionError::Malformed(_)))
        ));
    }

    #[test]
    fn test_decrypt_tampered_ciphertext_fails() {
        let enc = encryptor();
        let ciphertext = enc.encrypt("medical note", "k").unwrap();
        let mut raw = BASE64.decode(&ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        assert!(enc.decrypt(&BASE64.encode(raw), "k").unwrap_err().is_decryption());
    }

    #[test]
    fn test_generate_token_shape() {
        let enc = encryptor();
        let a = enc.generate_token().unwrap();
        let b = enc.generate_token().unwrap();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_secret_is_deterministic() {
        let enc = encryptor();
        let a = enc.hash_secret("Rex").unwrap();
        let b = enc.hash_secret("Rex").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, enc.hash_secret("rex").unwrap());
        assert!(!a.contains("Rex"));
    }

    #[test]
    fn test_hash_depends_on_salt() {
        let a = Encryptor::new("salt-a", 1_000).hash_secret("secret").unwrap();
        let b = Encryptor::new("salt-b", 1_000).hash_secret("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_secret() {
        let enc = encryptor();
        let digest = enc.hash_secret("blue").unwrap();
        assert!(enc.verify_secret("blue", &digest));
        assert!(!enc.verify_secret("green", &digest));
        assert!(!enc.verify_secret("blue", "zz-not-hex"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip(plaintext in ".*", key in ".*") {
            let enc = encryptor();
            let ciphertext = enc.encrypt(&plaintext, &key).unwrap();
            prop_assert_eq!(enc.decrypt(&ciphertext, &key).unwrap(), plaintext);
        }

        #[test]
        fn prop_other_key_fails(plaintext in ".*", k1 in "[a-z]{1,16}", k2 in "[A-Z]{1,16}") {
            let enc = encryptor();
            let ciphertext = enc.encrypt(&plaintext, &k1).unwrap();
            prop_assert!(enc.decrypt(&ciphertext, &k2).is_err());
        }
    }
}
