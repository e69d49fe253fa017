//! ClubGuard Security Layer
//!
//! Provides:
//! - Input validation and sanitization
//! - Login lockout tracking
//! - Sensitive-data encryption and secret hashing
//! - Role hierarchy checks (RBAC)
//! - CSRF tokens, suspicious-activity detection and audit logging

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod authz;
pub mod clock;
pub mod crypto;
pub mod csrf;
pub mod detector;
pub mod lockout;
pub mod settings;
pub mod store;
pub mod validation;

mod manager;

pub use audit::{AuditDetails, AuditLog, AuditLogEntry};
pub use authz::{Role, RoleAuthorizer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use lockout::{LockoutState, LockoutStatus};
pub use manager::SecurityManager;
pub use settings::{SecurityQuestion, SecuritySettings, SecuritySettingsUpdate};
pub use store::{MemoryStore, StateStore};
pub use validation::{InputKind, ValidationOutcome};
