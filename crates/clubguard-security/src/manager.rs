//! Security manager implementation
//!
//! The single boundary request handlers call. It wires the stateless checks
//! to the per-principal state and writes outcomes to the audit log.

use std::env::VarError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use clubguard_common::config::SecurityConfig;
use clubguard_common::error::{AuthError, Error, Result};
use clubguard_common::{metrics, Principal};

use crate::audit::{AuditDetails, AuditLog, AuditLogEntry};
use crate::authz::{Role, RoleAuthorizer};
use crate::clock::{Clock, SystemClock};
use crate::crypto::Encryptor;
use crate::csrf::CsrfTokenManager;
use crate::detector::SuspiciousActivityDetector;
use crate::lockout::{LockoutState, LockoutStatus, LockoutTracker};
use crate::settings::{SecurityQuestion, SecuritySettings, SecuritySettingsUpdate, SettingsStore};
use crate::store::{MemoryStore, StateStore};
use crate::validation::{InputKind, InputValidator, ValidationOutcome};

/// Key used when no encryption key is configured and the fallback is allowed.
/// Development and tests only.
const DEV_ENCRYPTION_KEY: &str = "clubguard-dev-encryption-key";

/// Main security manager
pub struct SecurityManager {
    config: SecurityConfig,
    clock: Arc<dyn Clock>,
    validator: InputValidator,
    encryptor: Arc<Encryptor>,
    lockout: LockoutTracker,
    csrf: CsrfTokenManager,
    authorizer: RoleAuthorizer,
    audit: Arc<AuditLog>,
    detector: SuspiciousActivityDetector,
    settings: SettingsStore,
    warned_dev_key: AtomicBool,
}

impl SecurityManager {
    /// Create a security manager with in-memory state and the system clock
    pub fn new(config: &SecurityConfig) -> Self {
        Self::with_components(
            config,
            Arc::new(SystemClock),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Create a security manager over caller-supplied stores and clock
    pub fn with_components(
        config: &SecurityConfig,
        clock: Arc<dyn Clock>,
        lockout_store: Arc<dyn StateStore<LockoutState>>,
        settings_store: Arc<dyn StateStore<SecuritySettings>>,
    ) -> Self {
        info!("Initializing security manager");

        let encryptor = Arc::new(Encryptor::new(&config.hash_salt, config.hash_iterations));
        let audit = Arc::new(AuditLog::new(&config.audit, clock.clone()));

        Self {
            config: config.clone(),
            validator: InputValidator::new(&config.validation),
            lockout: LockoutTracker::new(&config.lockout, lockout_store, clock.clone()),
            csrf: CsrfTokenManager::new(&config.csrf, encryptor.clone()),
            authorizer: RoleAuthorizer::new(),
            detector: SuspiciousActivityDetector::new(audit.clone()),
            settings: SettingsStore::new(settings_store, clock.clone()),
            encryptor,
            audit,
            clock,
            warned_dev_key: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Input validation
    // ------------------------------------------------------------------

    pub fn validate_input(&self, value: &str, kind: InputKind) -> ValidationOutcome {
        self.validator.validate(value, kind)
    }

    pub fn sanitize_input(&self, value: &str) -> String {
        self.validator.sanitize(value)
    }

    pub fn validator(&self) -> &InputValidator {
        &self.validator
    }

    // ------------------------------------------------------------------
    // Login lockout
    // ------------------------------------------------------------------

    /// Count a failed login; the transition into Locked is audited
    pub fn increment_failed_login_attempts(&self, principal: &Principal) -> LockoutStatus {
        let record = self.lockout.record_failure(principal);
        if record.newly_locked {
            let mut details = AuditDetails::new();
            details.insert("failed_attempts".to_string(), Value::from(record.failed_attempts));
            details.insert(
                "remaining_minutes".to_string(),
                Value::from(record.status.remaining_minutes),
            );
            self.audit.record(principal, "ACCOUNT_LOCKED", "auth", false, Some(details));
        }
        record.status
    }

    pub fn reset_failed_login_attempts(&self, principal: &Principal) {
        self.lockout.reset(principal);
    }

    pub fn check_account_lockout(&self, principal: &Principal) -> LockoutStatus {
        self.lockout.is_locked(principal)
    }

    /// Fail with `AuthError::AccountLocked` while the principal is locked
    pub fn ensure_unlocked(&self, principal: &Principal) -> Result<()> {
        let status = self.lockout.is_locked(principal);
        if status.is_locked {
            return Err(AuthError::AccountLocked(status.remaining_minutes.unwrap_or(0)).into());
        }
        Ok(())
    }

    /// Record the outcome of an authentication attempt made by a login handler
    pub fn record_login_attempt(&self, principal: &Principal, success: bool) -> LockoutStatus {
        if success {
            self.lockout.record_success(principal);
            self.audit.record(principal, "LOGIN_SUCCESS", "auth", true, None);
            return LockoutStatus::unlocked();
        }

        let status = self.increment_failed_login_attempts(principal);
        let mut details = AuditDetails::new();
        details.insert("locked".to_string(), Value::from(status.is_locked));
        self.audit.record(principal, "LOGIN_FAILED", "auth", false, Some(details));
        status
    }

    // ------------------------------------------------------------------
    // Sensitive data
    // ------------------------------------------------------------------

    pub fn encrypt_sensitive_data(&self, value: &str) -> Result<String> {
        let key = self.encryption_key()?;
        self.encryptor.encrypt(value, &key)
    }

    pub fn decrypt_sensitive_data(&self, value: &str) -> Result<String> {
        let key = self.encryption_key()?;
        self.encryptor.decrypt(value, &key).map_err(|e| {
            if e.is_decryption() {
                metrics::record_decryption_failure();
                warn!(error = %e, "Rejected sensitive data decryption");
            }
            e
        })
    }

    pub fn hash_secret(&self, secret: &str) -> Result<String> {
        self.encryptor.hash_secret(secret)
    }

    pub fn verify_secret(&self, secret: &str, digest: &str) -> bool {
        self.encryptor.verify_secret(secret, digest)
    }

    /// Key from the environment, read on every call
    fn encryption_key(&self) -> Result<String> {
        let var = &self.config.encryption_key_env;
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(key),
            Err(VarError::NotUnicode(_)) => Err(Error::Config(format!(
                "Encryption key variable {var} is not valid UTF-8"
            ))),
            _ if self.config.allow_default_encryption_key => {
                if !self.warned_dev_key.swap(true, Ordering::Relaxed) {
                    warn!("Using built-in development encryption key. Set {var} for production!");
                }
                Ok(DEV_ENCRYPTION_KEY.to_string())
            }
            _ => Err(Error::MissingEncryptionKey(var.clone())),
        }
    }

    // ------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------

    pub fn check_permission(&self, actual: Role, required: Role) -> bool {
        self.authorizer.has_permission(actual, required)
    }

    pub fn check_role_hierarchy(&self, actual: Role, required: &[Role]) -> bool {
        self.authorizer.satisfies_any(actual, required)
    }

    /// Role check for a protected resource; denials are audited
    pub fn authorize(
        &self,
        principal: &Principal,
        actual: Role,
        required: Role,
        resource: &str,
    ) -> Result<()> {
        let result = self.authorizer.require(actual, required);
        if result.is_err() {
            let mut details = AuditDetails::new();
            details.insert("role".to_string(), Value::from(actual.as_str()));
            details.insert("required_role".to_string(), Value::from(required.as_str()));
            self.audit.record(principal, "ACCESS_DENIED", resource, false, Some(details));
        } else {
            debug!(principal = %principal, role = %actual, resource, "Access granted");
        }
        result
    }

    // ------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------

    pub fn log_audit_event(
        &self,
        principal: &Principal,
        action: &str,
        resource: &str,
        success: bool,
        details: Option<AuditDetails>,
    ) -> Uuid {
        self.audit.record(principal, action, resource, success, details)
    }

    pub fn get_audit_logs(&self, principal: &Principal, limit: Option<usize>) -> Vec<AuditLogEntry> {
        self.audit.query(principal, limit)
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // ------------------------------------------------------------------
    // CSRF
    // ------------------------------------------------------------------

    pub fn generate_csrf_token(&self) -> Result<String> {
        self.csrf.issue()
    }

    pub fn validate_csrf_token(&self, token: &str) -> bool {
        self.csrf.validate(token)
    }

    pub fn csrf(&self) -> &CsrfTokenManager {
        &self.csrf
    }

    // ------------------------------------------------------------------
    // Suspicious activity
    // ------------------------------------------------------------------

    pub fn detect_suspicious_activity(
        &self,
        principal: &Principal,
        activity: &str,
        details: Option<AuditDetails>,
    ) -> bool {
        self.detector.detect(principal, activity, details)
    }

    // ------------------------------------------------------------------
    // Security settings
    // ------------------------------------------------------------------

    /// Settings for `principal`, or `None` if never written.
    ///
    /// Failed-login fields reflect the lockout tracker at read time.
    pub fn get_user_security_settings(&self, principal: &Principal) -> Option<SecuritySettings> {
        self.settings
            .get(principal)
            .map(|settings| self.with_lockout_view(principal, settings))
    }

    pub fn update_user_security_settings(
        &self,
        principal: &Principal,
        update: SecuritySettingsUpdate,
    ) -> SecuritySettings {
        let settings = self.settings.update(principal, update);
        self.with_lockout_view(principal, settings)
    }

    pub fn add_trusted_device(&self, principal: &Principal, device: &str) -> SecuritySettings {
        let device = device.to_string();
        let settings = self.settings.modify(principal, &mut |settings| {
            settings.trusted_devices.insert(device.clone());
        });
        self.audit.record(principal, "TRUSTED_DEVICE_ADDED", "settings", true, None);
        self.with_lockout_view(principal, settings)
    }

    pub fn remove_trusted_device(&self, principal: &Principal, device: &str) -> SecuritySettings {
        let settings = self.settings.modify(principal, &mut |settings| {
            settings.trusted_devices.remove(device);
        });
        self.with_lockout_view(principal, settings)
    }

    pub fn is_trusted_device(&self, principal: &Principal, device: &str) -> bool {
        self.settings
            .get(principal)
            .is_some_and(|settings| settings.trusted_devices.contains(device))
    }

    /// Store `question` with a hashed answer, replacing an existing entry for the same question
    pub fn set_security_question(
        &self,
        principal: &Principal,
        question: &str,
        answer: &str,
    ) -> Result<SecuritySettings> {
        let answer_hash = self.hash_secret(&normalize_answer(answer))?;
        let question = question.trim().to_string();
        let settings = self.settings.modify(principal, &mut |settings| {
            let entry = SecurityQuestion {
                question: question.clone(),
                answer_hash: answer_hash.clone(),
            };
            match settings
                .security_questions
                .iter_mut()
                .find(|q| q.question == question)
            {
                Some(existing) => *existing = entry,
                None => settings.security_questions.push(entry),
            }
        });
        Ok(self.with_lockout_view(principal, settings))
    }

    /// Answers compare case-insensitively and ignore surrounding whitespace
    pub fn verify_security_answer(
        &self,
        principal: &Principal,
        question: &str,
        answer: &str,
    ) -> bool {
        let Some(settings) = self.settings.get(principal) else {
            return false;
        };
        let question = question.trim();
        settings
            .security_questions
            .iter()
            .find(|q| q.question == question)
            .is_some_and(|q| self.verify_secret(&normalize_answer(answer), &q.answer_hash))
    }

    pub fn record_password_change(&self, principal: &Principal) -> SecuritySettings {
        let now = self.clock.now();
        let settings = self.settings.modify(principal, &mut |settings| {
            settings.last_password_change = now;
        });
        self.audit.record(principal, "PASSWORD_CHANGED", "auth", true, None);
        self.with_lockout_view(principal, settings)
    }

    fn with_lockout_view(
        &self,
        principal: &Principal,
        mut settings: SecuritySettings,
    ) -> SecuritySettings {
        let state = self.lockout.current(principal).unwrap_or_default();
        settings.failed_login_attempts = state.failed_attempts;
        settings.last_failed_login = state.last_failed_at;
        settings
    }
}

fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn test_config() -> SecurityConfig {
        SecurityConfig {
            encryption_key_env: "CLUBGUARD_TEST_KEY_UNSET".to_string(),
            hash_iterations: 1_000,
            ..Default::default()
        }
    }

    fn manager() -> (SecurityManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let manager = SecurityManager::with_components(
            &test_config(),
            clock.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        );
        (manager, clock)
    }

    #[test]
    fn test_four_failures_then_success_unlocks() {
        let (manager, _) = manager();
        let p = Principal::from("u1");
        for _ in 0..4 {
            manager.record_login_attempt(&p, false);
        }
        manager.record_login_attempt(&p, true);

        assert_eq!(manager.check_account_lockout(&p), LockoutStatus::unlocked());
        // Counter was cleared: four more failures still do not lock.
        for _ in 0..4 {
            manager.increment_failed_login_attempts(&p);
        }
        assert!(!manager.check_account_lockout(&p).is_locked);
    }

    #[test]
    fn test_lockout_is_audited_once() {
        let (manager, _) = manager();
        let p = Principal::from("u1");
        for _ in 0..7 {
            manager.increment_failed_login_attempts(&p);
        }

        let locked: Vec<_> = manager
            .get_audit_logs(&p, Some(100))
            .into_iter()
            .filter(|e| e.action == "ACCOUNT_LOCKED")
            .collect();
        assert_eq!(locked.len(), 1);
        assert!(matches!(
            manager.ensure_unlocked(&p),
            Err(Error::Auth(AuthError::AccountLocked(15)))
        ));
    }

    #[test]
    fn test_lockout_expires_lazily() {
        let (manager, clock) = manager();
        let p = Principal::from("u1");
        for _ in 0..5 {
            manager.increment_failed_login_attempts(&p);
        }
        assert!(manager.check_account_lockout(&p).is_locked);

        clock.advance(Duration::minutes(15) + Duration::seconds(1));
        assert!(!manager.check_account_lockout(&p).is_locked);
        assert!(manager.ensure_unlocked(&p).is_ok());
    }

    #[test]
    fn test_sensitive_data_round_trip_with_dev_key() {
        let (manager, _) = manager();
        let ciphertext = manager.encrypt_sensitive_data("emergency contact").unwrap();
        assert_eq!(
            manager.decrypt_sensitive_data(&ciphertext).unwrap(),
            "emergency contact"
        );
        assert!(manager.decrypt_sensitive_data("garbage").unwrap_err().is_decryption());
    }

    #[test]
    fn test_missing_key_is_an_error_when_fallback_disabled() {
        let config = SecurityConfig {
            encryption_key_env: "CLUBGUARD_TEST_KEY_ALSO_UNSET".to_string(),
            allow_default_encryption_key: false,
            hash_iterations: 1_000,
            ..Default::default()
        };
        let manager = SecurityManager::new(&config);

        assert!(matches!(
            manager.encrypt_sensitive_data("x"),
            Err(Error::MissingEncryptionKey(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_key_does_not_fall_back() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let var = "CLUBGUARD_TEST_KEY_NOT_UTF8";
        let config = SecurityConfig {
            encryption_key_env: var.to_string(),
            hash_iterations: 1_000,
            ..Default::default()
        };
        let manager = SecurityManager::new(&config);
        std::env::set_var(var, OsStr::from_bytes(&[0x6b, 0xff, 0x79]));

        assert!(matches!(manager.encrypt_sensitive_data("x"), Err(Error::Config(_))));
        std::env::remove_var(var);
    }

    #[test]
    fn test_authorize_audits_denials() {
        let (manager, _) = manager();
        let p = Principal::from("kid");

        assert!(manager.authorize(&p, Role::Manager, Role::Coach, "schedule").is_ok());
        assert!(manager.authorize(&p, Role::Child, Role::SmmManager, "news").is_err());

        let entries = manager.get_audit_logs(&p, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "ACCESS_DENIED");
        assert_eq!(entries[0].resource, "news");
    }

    #[test]
    fn test_role_checks() {
        let (manager, _) = manager();
        assert!(manager.check_permission(Role::Manager, Role::Coach));
        assert!(!manager.check_permission(Role::Coach, Role::Manager));
        assert!(manager.check_role_hierarchy(Role::Manager, &[Role::Coach, Role::Parent]));
    }

    #[test]
    fn test_settings_lifecycle() {
        let (manager, _) = manager();
        let p = Principal::from("u1");
        assert!(manager.get_user_security_settings(&p).is_none());

        manager.update_user_security_settings(
            &p,
            SecuritySettingsUpdate {
                two_factor_enabled: Some(true),
                ..Default::default()
            },
        );
        manager.add_trusted_device(&p, "tablet-1");
        manager.increment_failed_login_attempts(&p);

        let settings = manager.get_user_security_settings(&p).unwrap();
        assert!(settings.two_factor_enabled);
        assert!(manager.is_trusted_device(&p, "tablet-1"));
        assert_eq!(settings.failed_login_attempts, 1);
        assert!(settings.last_failed_login.is_some());

        manager.remove_trusted_device(&p, "tablet-1");
        assert!(!manager.is_trusted_device(&p, "tablet-1"));
    }

    #[test]
    fn test_settings_failed_logins_clear_after_window() {
        let (manager, clock) = manager();
        let p = Principal::from("u1");
        manager.update_user_security_settings(&p, SecuritySettingsUpdate::default());
        for _ in 0..5 {
            manager.increment_failed_login_attempts(&p);
        }

        clock.advance(Duration::minutes(16));
        let settings = manager.get_user_security_settings(&p).unwrap();
        assert_eq!(settings.failed_login_attempts, 0);
        assert!(settings.last_failed_login.is_none());
        assert!(!manager.check_account_lockout(&p).is_locked);
    }

    #[test]
    fn test_security_questions() {
        let (manager, _) = manager();
        let p = Principal::from("parent-7");

        let settings = manager
            .set_security_question(&p, "First pet?", "  Rex ")
            .unwrap();
        assert_eq!(settings.security_questions.len(), 1);
        assert!(!settings.security_questions[0].answer_hash.contains("rex"));

        assert!(manager.verify_security_answer(&p, "First pet?", "rex"));
        assert!(!manager.verify_security_answer(&p, "First pet?", "max"));
        assert!(!manager.verify_security_answer(&p, "Unknown?", "rex"));

        manager.set_security_question(&p, "First pet?", "Max").unwrap();
        let settings = manager.get_user_security_settings(&p).unwrap();
        assert_eq!(settings.security_questions.len(), 1);
        assert!(manager.verify_security_answer(&p, "First pet?", "max"));
    }

    #[test]
    fn test_password_change_timestamp() {
        let (manager, clock) = manager();
        let p = Principal::from("u1");
        manager.update_user_security_settings(&p, SecuritySettingsUpdate::default());

        clock.advance(Duration::days(3));
        let settings = manager.record_password_change(&p);
        assert_eq!(settings.last_password_change, clock.now());
    }

    #[test]
    fn test_suspicious_activity_is_audited() {
        let (manager, _) = manager();
        let p = Principal::from("u1");
        let before = manager.audit_log().len();

        assert!(manager.detect_suspicious_activity(&p, "DROP TABLE users", None));
        assert_eq!(manager.audit_log().len(), before + 1);
        assert_eq!(manager.get_audit_logs(&p, Some(1))[0].action, "SUSPICIOUS_ACTIVITY");
    }
}
