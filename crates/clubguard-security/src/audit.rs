//! Security audit log
//!
//! Append-only and bounded: the newest entry sits at the front and the oldest
//! is dropped in the same critical section once capacity is exceeded.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use clubguard_common::config::AuditConfig;
use clubguard_common::{metrics, Principal};

use crate::clock::Clock;

/// Free-form structured details attached to an entry
pub type AuditDetails = Map<String, Value>;

/// Immutable record of a security-relevant action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub principal: Principal,
    pub action: String,
    pub resource: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub details: AuditDetails,
}

/// Bounded in-memory audit log
pub struct AuditLog {
    capacity: usize,
    default_limit: usize,
    entries: Mutex<VecDeque<AuditLogEntry>>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(config: &AuditConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            capacity,
            default_limit: config.default_query_limit,
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            clock,
        }
    }

    /// Append an entry and return its id.
    ///
    /// Failed outcomes are mirrored to the security-event log.
    pub fn record(
        &self,
        principal: &Principal,
        action: &str,
        resource: &str,
        success: bool,
        details: Option<AuditDetails>,
    ) -> Uuid {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            principal: principal.clone(),
            action: action.to_string(),
            resource: resource.to_string(),
            timestamp: self.clock.now(),
            success,
            details: details.unwrap_or_default(),
        };
        let id = entry.id;

        if !success {
            let details = Value::Object(entry.details.clone());
            tracing::warn!(
                target: "clubguard::security_event",
                principal = %entry.principal,
                action = %entry.action,
                resource = %entry.resource,
                details = %details,
                "Security event"
            );
        }

        {
            let mut entries = self.entries.lock();
            entries.push_front(entry);
            while entries.len() > self.capacity {
                entries.pop_back();
            }
        }

        metrics::record_audit_event(success);
        id
    }

    /// Entries for `principal`, newest first; `None` uses the configured default limit
    pub fn query(&self, principal: &Principal, limit: Option<usize>) -> Vec<AuditLogEntry> {
        let limit = limit.unwrap_or(self.default_limit);
        self.entries
            .lock()
            .iter()
            .filter(|entry| &entry.principal == principal)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Newest entries across all principals
    pub fn recent(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.entries.lock().iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
