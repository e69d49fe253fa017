//! Error types for ClubGuard
//!
//! Provides a unified error type hierarchy for the security subsystem.
//! Validation failures are not errors: they are reported as values by the
//! validators themselves.

use thiserror::Error;

/// Result type alias using ClubGuard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ClubGuard
#[derive(Error, Debug)]
pub enum Error {
    // Authentication/Authorization Errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    // Decryption Errors
    #[error("Decryption error: {0}")]
    Decryption(#[from] DecryptionError),

    // Cryptographic primitive failures (RNG, key setup)
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Encryption key is not configured (set {0})")]
    MissingEncryptionKey(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication/Authorization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Account locked for {0} more minute(s)")]
    AccountLocked(i64),
}

/// Decryption errors
///
/// Kept distinct from other crypto failures so callers can tell a bad key or
/// tampered ciphertext apart from an infrastructure problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Ciphertext authentication failed (wrong key or tampered data)")]
    AuthenticationFailed,
}

impl Error {
    /// Returns true when this error came from decrypting bad input
    pub fn is_decryption(&self) -> bool {
        matches!(self, Error::Decryption(_))
    }
}
