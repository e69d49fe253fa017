//! Failed-login lockout tracking
//!
//! Per principal the tracker is either Normal (fewer than `max_failed_attempts`
//! recent failures) or Locked (threshold reached, last failure inside the
//! window). Expiry is evaluated lazily on read; there is no background timer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use clubguard_common::config::LockoutConfig;
use clubguard_common::{metrics, Principal};

use crate::clock::Clock;
use crate::store::StateStore;

/// Lockout record for one principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Answer to "may this principal attempt to authenticate?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutStatus {
    pub is_locked: bool,
    /// Whole minutes left, rounded up; present only while locked
    pub remaining_minutes: Option<i64>,
}

impl LockoutStatus {
    pub fn unlocked() -> Self {
        Self {
            is_locked: false,
            remaining_minutes: None,
        }
    }

    fn locked_for(remaining: Duration) -> Self {
        let millis = remaining.num_milliseconds().max(0);
        Self {
            is_locked: true,
            remaining_minutes: Some((millis + 59_999) / 60_000),
        }
    }
}

/// Result of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub status: LockoutStatus,
    pub failed_attempts: u32,
    /// This failure moved the principal from Normal to Locked
    pub newly_locked: bool,
}

/// Tracks failed authentications per principal
pub struct LockoutTracker {
    max_failed_attempts: u32,
    window: Duration,
    store: Arc<dyn StateStore<LockoutState>>,
    clock: Arc<dyn Clock>,
}

impl LockoutTracker {
    pub fn new(
        config: &LockoutConfig,
        store: Arc<dyn StateStore<LockoutState>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            max_failed_attempts: config.max_failed_attempts.max(1),
            window: Duration::minutes(config.window_minutes),
            store,
            clock,
        }
    }

    /// Count a failed attempt
    pub fn record_failure(&self, principal: &Principal) -> FailureRecord {
        let now = self.clock.now();
        let window = self.window;
        let threshold = self.max_failed_attempts;
        let mut newly_locked = false;

        let state = self.store.modify(principal.as_str(), &mut |current| {
            let mut state = current.unwrap_or_default();
            let stale = state
                .last_failed_at
                .is_some_and(|last| now - last >= window);
            if stale {
                state = LockoutState::default();
            }

            state.failed_attempts = state.failed_attempts.saturating_add(1);
            state.last_failed_at = Some(now);
            if state.failed_attempts >= threshold {
                newly_locked = state.locked_until.is_none();
                state.locked_until = Some(now + window);
            }
            Some(state)
        });

        metrics::record_failed_login();
        let state = state.unwrap_or_default();

        if newly_locked {
            metrics::record_account_locked();
            warn!(
                principal = %principal,
                failed_attempts = state.failed_attempts,
                "Account locked after repeated failed logins"
            );
        } else {
            debug!(principal = %principal, failed_attempts = state.failed_attempts, "Failed login recorded");
        }

        let status = match state.locked_until {
            Some(until) => LockoutStatus::locked_for(until - now),
            None => LockoutStatus::unlocked(),
        };
        FailureRecord {
            status,
            failed_attempts: state.failed_attempts,
            newly_locked,
        }
    }

    /// Successful authentication clears the record
    pub fn record_success(&self, principal: &Principal) {
        self.reset(principal);
    }

    pub fn reset(&self, principal: &Principal) {
        if self.store.remove(principal.as_str()).is_some() {
            debug!(principal = %principal, "Lockout state reset");
        }
    }

    /// Current status; an elapsed lock is cleared as part of the read
    pub fn is_locked(&self, principal: &Principal) -> LockoutStatus {
        self.refresh(principal).0
    }

    /// Record with expiry applied, `None` once the principal is back to Normal
    pub fn current(&self, principal: &Principal) -> Option<LockoutState> {
        self.refresh(principal).1
    }

    /// Drop an expired or stale record in place and report what remains
    fn refresh(&self, principal: &Principal) -> (LockoutStatus, Option<LockoutState>) {
        let now = self.clock.now();
        let window = self.window;
        let mut status = LockoutStatus::unlocked();

        let state = self.store.modify(principal.as_str(), &mut |current| {
            let state = current?;
            match state.locked_until {
                Some(until) if now < until => {
                    status = LockoutStatus::locked_for(until - now);
                    Some(state)
                }
                Some(_) => None,
                None => {
                    let stale = state.last_failed_at.map_or(true, |last| now - last >= window);
                    if stale {
                        None
                    } else {
                        Some(state)
                    }
                }
            }
        });

        (status, state)
    }
}
