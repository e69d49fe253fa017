//! Per-principal security settings

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubguard_common::Principal;

use crate::clock::Clock;
use crate::store::StateStore;

/// Security question with a hashed answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityQuestion {
    pub question: String,
    pub answer_hash: String,
}

/// Security settings for one principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub two_factor_enabled: bool,
    pub last_password_change: DateTime<Utc>,
    /// Mirrors the lockout tracker when read through `SecurityManager`
    pub failed_login_attempts: u32,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub trusted_devices: BTreeSet<String>,
    pub security_questions: Vec<SecurityQuestion>,
}

impl SecuritySettings {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            two_factor_enabled: false,
            last_password_change: now,
            failed_login_attempts: 0,
            last_failed_login: None,
            trusted_devices: BTreeSet::new(),
            security_questions: Vec::new(),
        }
    }

    /// Merge the fields present in `update`
    pub fn apply(&mut self, update: SecuritySettingsUpdate) {
        if let Some(enabled) = update.two_factor_enabled {
            self.two_factor_enabled = enabled;
        }
        if let Some(changed) = update.last_password_change {
            self.last_password_change = changed;
        }
        if let Some(devices) = update.trusted_devices {
            self.trusted_devices = devices;
        }
        if let Some(questions) = update.security_questions {
            self.security_questions = questions;
        }
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettingsUpdate {
    pub two_factor_enabled: Option<bool>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub trusted_devices: Option<BTreeSet<String>>,
    pub security_questions: Option<Vec<SecurityQuestion>>,
}

/// Settings storage, created lazily on first write
pub struct SettingsStore {
    store: Arc<dyn StateStore<SecuritySettings>>,
    clock: Arc<dyn Clock>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn StateStore<SecuritySettings>>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn get(&self, principal: &Principal) -> Option<SecuritySettings> {
        self.store.load(principal.as_str())
    }

    /// Merge `update`, creating default settings if none exist
    pub fn update(&self, principal: &Principal, update: SecuritySettingsUpdate) -> SecuritySettings {
        let mut update = Some(update);
        self.modify(principal, &mut |settings| {
            if let Some(update) = update.take() {
                settings.apply(update);
            }
        })
    }

    /// Atomically mutate the settings for `principal`, creating defaults if absent
    pub fn modify(
        &self,
        principal: &Principal,
        f: &mut dyn FnMut(&mut SecuritySettings),
    ) -> SecuritySettings {
        let now = self.clock.now();
        let mut result = None;
        self.store.modify(principal.as_str(), &mut |current| {
            let mut settings = current.unwrap_or_else(|| SecuritySettings::new(now));
            f(&mut settings);
            result = Some(settings.clone());
            Some(settings)
        });
        result.unwrap_or_else(|| SecuritySettings::new(now))
    }
}
