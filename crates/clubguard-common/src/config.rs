//! Configuration management for ClubGuard

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Environment variable holding the field-encryption key
pub const DEFAULT_ENCRYPTION_KEY_ENV: &str = "CLUBGUARD_ENCRYPTION_KEY";

/// Main configuration structure for ClubGuard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Security subsystem configuration
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML, YAML or JSON file (chosen by extension)
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;

        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        let config: Config = match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?,
        };

        tracing::debug!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Emit JSON-formatted log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "clubguard=info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Name of the environment variable read for the encryption key
    pub encryption_key_env: String,
    /// Fall back to the built-in development key when the variable is unset.
    /// Must be disabled in production.
    pub allow_default_encryption_key: bool,
    /// Application salt for deterministic secret hashing
    pub hash_salt: String,
    /// PBKDF2 iteration count for secret hashing
    pub hash_iterations: u32,
    /// Failed-login lockout
    pub lockout: LockoutConfig,
    /// CSRF token pool
    pub csrf: CsrfConfig,
    /// Audit log
    pub audit: AuditConfig,
    /// Input validation limits
    pub validation: ValidationConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            encryption_key_env: DEFAULT_ENCRYPTION_KEY_ENV.to_string(),
            allow_default_encryption_key: true,
            hash_salt: "clubguard.secret-hash.v1".to_string(),
            hash_iterations: 100_000,
            lockout: LockoutConfig::default(),
            csrf: CsrfConfig::default(),
            audit: AuditConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Failures that trigger a lockout
    pub max_failed_attempts: u32,
    /// Lockout window in minutes
    pub window_minutes: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            window_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Maximum number of outstanding tokens
    pub pool_capacity: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self { pool_capacity: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum number of retained entries
    pub capacity: usize,
    /// Entries returned by a query without an explicit limit
    pub default_query_limit: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_query_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Sanitized output is truncated to this many characters
    pub max_input_length: usize,
    /// Password rules
    pub password: PasswordPolicy,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_input_length: 1000,
            password: PasswordPolicy::default(),
        }
    }
}

/// Password requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 5,
            max_length: 128,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}
