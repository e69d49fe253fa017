//! Suspicious-activity detection
//!
//! Screens free-text activity descriptions for known destructive signatures.
//! A hit is written to the audit log; detection never fails the caller.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use clubguard_common::{metrics, Principal};

use crate::audit::{AuditDetails, AuditLog};

/// Audit action recorded for flagged activity
pub const SUSPICIOUS_ACTIVITY: &str = "SUSPICIOUS_ACTIVITY";

/// Signatures matched against the upper-cased payload
const SIGNATURES: [&str; 6] = [
    "DROP TABLE",
    "DELETE FROM",
    "UNION SELECT",
    "JAVASCRIPT:",
    "ONERROR=",
    "ONLOAD=",
];

pub struct SuspiciousActivityDetector {
    audit: Arc<AuditLog>,
}

impl SuspiciousActivityDetector {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self { audit }
    }

    /// First signature found in the payload, if any
    pub fn scan(&self, activity: &str, details: Option<&AuditDetails>) -> Option<&'static str> {
        let mut payload = Map::new();
        payload.insert("activity".to_string(), Value::from(activity));
        if let Some(details) = details {
            payload.extend(details.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let haystack = Value::Object(payload).to_string().to_uppercase();
        SIGNATURES
            .iter()
            .copied()
            .find(|signature| haystack.contains(signature))
    }

    /// Flag `activity` for `principal`; writes one audit entry on a match
    pub fn detect(
        &self,
        principal: &Principal,
        activity: &str,
        details: Option<AuditDetails>,
    ) -> bool {
        let Some(pattern) = self.scan(activity, details.as_ref()) else {
            return false;
        };

        warn!(principal = %principal, pattern, "Suspicious activity detected");
        metrics::record_suspicious_activity(pattern);

        let mut entry_details = details.unwrap_or_default();
        entry_details.insert("activity".to_string(), Value::from(activity));
        entry_details.insert("pattern".to_string(), Value::from(pattern));
        self.audit
            .record(principal, SUSPICIOUS_ACTIVITY, "security", false, Some(entry_details));

        true
    }
}
