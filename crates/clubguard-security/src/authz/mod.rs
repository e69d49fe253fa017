//! Authorization (role hierarchy)
//!
//! Roles form a total order. A higher role holds every permission of the
//! roles below it, so a check is a rank comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use clubguard_common::error::{AuthError, Result};

/// Club role, declared in ascending rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Child,
    Parent,
    Coach,
    Manager,
    SmmManager,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Child,
        Role::Parent,
        Role::Coach,
        Role::Manager,
        Role::SmmManager,
    ];

    /// Position in the hierarchy, starting at 1 for `Child`
    pub fn rank(self) -> u8 {
        match self {
            Role::Child => 1,
            Role::Parent => 2,
            Role::Coach => 3,
            Role::Manager => 4,
            Role::SmmManager => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Child => "child",
            Role::Parent => "parent",
            Role::Coach => "coach",
            Role::Manager => "manager",
            Role::SmmManager => "smm_manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "child" => Ok(Role::Child),
            "parent" => Ok(Role::Parent),
            "coach" => Ok(Role::Coach),
            "manager" => Ok(Role::Manager),
            "smm_manager" | "smmmanager" => Ok(Role::SmmManager),
            _ => Err(AuthError::RoleNotFound(s.to_string())),
        }
    }
}

/// Rank-based authorizer
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl RoleAuthorizer {
    pub fn new() -> Self {
        Self
    }

    /// `actual` holds at least the permissions of `required`
    pub fn has_permission(&self, actual: Role, required: Role) -> bool {
        actual.rank() >= required.rank()
    }

    /// `actual` satisfies at least one of `required`; an empty list grants nothing
    pub fn satisfies_any(&self, actual: Role, required: &[Role]) -> bool {
        required
            .iter()
            .any(|&role| self.has_permission(actual, role))
    }

    /// Error-returning form of [`RoleAuthorizer::has_permission`] for handlers
    pub fn require(&self, actual: Role, required: Role) -> Result<()> {
        if self.has_permission(actual, required) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(format!(
                "role {} does not satisfy required role {}",
                actual, required
            ))
            .into())
        }
    }
}
