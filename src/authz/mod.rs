//! Authorization module - permission gate, role stores and middleware
//!
//! This module implements per-route permission checks:
//! - Identity taken from a request header
//! - Identity -> role -> permission set lookups through a [`RoleStore`]
//! - In-memory and SQLite store backends
//! - Configurable enforcement modes (strict/advisory)

mod gate;
mod memory;
mod middleware;
mod model;
mod sqlite;
mod store;

pub use gate::{Decision, PermissionGate, Verdict, DEFAULT_IDENTITY_HEADER};
pub use memory::{Bindings, InMemoryRoleStore};
pub use middleware::enforce;
pub use model::{Identity, Permission, Role};
pub use sqlite::SqliteRoleStore;
pub use store::{RoleStore, StoreError};

use std::str::FromStr;

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthzMode {
    /// Log denials but let forbidden requests through (rollout mode)
    Advisory,
    /// Enforce 401/403 on denied requests (production mode)
    #[default]
    Strict,
}

impl FromStr for AuthzMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "advisory" => Ok(AuthzMode::Advisory),
            "strict" | "" => Ok(AuthzMode::Strict),
            other => Err(format!("unknown authz mode '{other}', expected 'strict' or 'advisory'")),
        }
    }
}

/// Well-known permission names
pub mod permissions {
    // Documents
    pub const DOC_READ: &str = "read:doc";
    pub const DOC_EDIT: &str = "edit:doc";
    pub const DOC_DELETE: &str = "delete:doc";

    // Reports
    pub const REPORTS_READ: &str = "read:reports";
}
