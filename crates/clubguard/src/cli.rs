//! Command handlers
//!
//! Each handler returns the JSON document printed on stdout.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use clubguard_security::{InputKind, Role, SecurityManager};

/// Validate `value` as `kind`
pub fn validate(manager: &SecurityManager, kind: &str, value: &str) -> Result<Value> {
    let kind: InputKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let outcome = manager.validate_input(value, kind);
    Ok(serde_json::to_value(outcome)?)
}

pub fn sanitize(manager: &SecurityManager, value: &str) -> Value {
    json!({ "sanitized": manager.sanitize_input(value) })
}

/// Screen free text for injection and suspicious-activity signatures
pub fn scan(manager: &SecurityManager, value: &str) -> Value {
    let validator = manager.validator();
    json!({
        "sql_injection": validator.contains_sql_injection(value),
        "xss": validator.contains_xss(value),
        "suspicious": manager.detect_suspicious_activity(&"cli".into(), value, None),
    })
}

pub fn hash(manager: &SecurityManager, secret: &str) -> Result<Value> {
    Ok(json!({ "hash": manager.hash_secret(secret)? }))
}

pub fn encrypt(manager: &SecurityManager, plaintext: &str) -> Result<Value> {
    Ok(json!({ "ciphertext": manager.encrypt_sensitive_data(plaintext)? }))
}

pub fn decrypt(manager: &SecurityManager, ciphertext: &str) -> Result<Value> {
    Ok(json!({ "plaintext": manager.decrypt_sensitive_data(ciphertext)? }))
}

pub fn token(manager: &SecurityManager) -> Result<Value> {
    Ok(json!({ "token": manager.generate_csrf_token()? }))
}

/// Does `actual` satisfy any of `required`?
pub fn check_role(manager: &SecurityManager, actual: &str, required: &[String]) -> Result<Value> {
    let actual: Role = actual.parse()?;
    let required = required
        .iter()
        .map(|role| role.parse::<Role>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(json!({
        "role": actual,
        "required": required,
        "allowed": manager.check_role_hierarchy(actual, &required),
    }))
}
