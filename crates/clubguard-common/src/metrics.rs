//! Security metrics for ClubGuard
//!
//! Thin wrappers over the `metrics` facade. The library never installs a
//! recorder; hosts that want these counters install their own exporter.

use metrics::counter;

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a failed login attempt
pub fn record_failed_login() {
    counter!("clubguard_failed_logins_total").increment(1);
}

/// Record an account transitioning into the locked state
pub fn record_account_locked() {
    counter!("clubguard_account_lockouts_total").increment(1);
}

// ============================================================================
// Request Protection Metrics
// ============================================================================

/// Record a CSRF validation and its outcome
pub fn record_csrf_validation(valid: bool) {
    let outcome = if valid { "accepted" } else { "rejected" };
    counter!("clubguard_csrf_validations_total", "outcome" => outcome).increment(1);
}

/// Record a payload flagged as suspicious
pub fn record_suspicious_activity(pattern: &str) {
    counter!("clubguard_suspicious_activity_total", "pattern" => pattern.to_string()).increment(1);
}

// ============================================================================
// Audit and Crypto Metrics
// ============================================================================

/// Record an audit log write
pub fn record_audit_event(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("clubguard_audit_events_total", "outcome" => outcome).increment(1);
}

/// Record a rejected decryption
pub fn record_decryption_failure() {
    counter!("clubguard_decryption_failures_total").increment(1);
}
