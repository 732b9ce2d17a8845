use std::collections::HashSet;

use async_trait::async_trait;

use super::model::{Identity, Permission, Role};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Backend(String),
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Lookup interface the permission gate reads from.
///
/// Implementations own their data; the gate never writes through this trait.
/// "Not found" is never an error: an unknown identity resolves to `None` and
/// an unbound role resolves to the empty set.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Role currently assigned to the identity, if any
    async fn resolve_role(&self, identity: &Identity) -> Result<Option<Role>, StoreError>;

    /// Permission set bound to the role, empty when the role has no bindings
    async fn permissions_for(&self, role: &Role) -> Result<HashSet<Permission>, StoreError>;

    /// Liveness probe used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
