use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::model::{Identity, Permission, Role};
use super::store::{RoleStore, StoreError};

/// Serialized form of the identity and role tables.
///
/// ```json
/// {
///   "users": { "c@x.com": "editor" },
///   "roles": { "editor": ["edit:doc", "read:doc"] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bindings {
    #[serde(default)]
    pub users: BTreeMap<Identity, Role>,
    #[serde(default)]
    pub roles: BTreeMap<Role, BTreeSet<Permission>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, identity: impl Into<Identity>, role: impl Into<Role>) -> Self {
        self.users.insert(identity.into(), role.into());
        self
    }

    pub fn with_role<P>(mut self, role: impl Into<Role>, permissions: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<Permission>,
    {
        self.roles
            .entry(role.into())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bindings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse bindings file {}", path.display()))
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Identity, Role>,
    roles: HashMap<Role, HashSet<Permission>>,
}

/// Process-local store, constructed once at startup and shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    tables: RwLock<Tables>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: Bindings) -> Self {
        let tables = Tables {
            users: bindings.users.into_iter().collect(),
            roles: bindings
                .roles
                .into_iter()
                .map(|(role, perms)| (role, perms.into_iter().collect()))
                .collect(),
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Assign (or reassign) a role, returning the role previously held.
    pub fn assign_role(&self, identity: Identity, role: Role) -> Option<Role> {
        let previous = self.tables.write().users.insert(identity.clone(), role.clone());
        tracing::info!(
            identity = %identity,
            role = %role,
            previous_role = previous.as_ref().map(Role::as_str),
            "role assigned"
        );
        previous
    }

    pub fn unassign_role(&self, identity: &Identity) -> Option<Role> {
        let previous = self.tables.write().users.remove(identity);
        if let Some(ref role) = previous {
            tracing::info!(identity = %identity, previous_role = %role, "role unassigned");
        }
        previous
    }

    /// Bind a permission to a role. Returns false if it was already bound.
    pub fn grant(&self, role: Role, permission: Permission) -> bool {
        let added = self
            .tables
            .write()
            .roles
            .entry(role.clone())
            .or_default()
            .insert(permission.clone());
        if added {
            tracing::info!(role = %role, permission = %permission, "permission granted");
        }
        added
    }

    /// Remove a permission from a role. Returns false if it was not bound.
    pub fn revoke(&self, role: &Role, permission: &Permission) -> bool {
        let mut tables = self.tables.write();
        let removed = tables
            .roles
            .get_mut(role)
            .map(|perms| perms.remove(permission))
            .unwrap_or(false);
        if tables.roles.get(role).is_some_and(HashSet::is_empty) {
            tables.roles.remove(role);
        }
        drop(tables);
        if removed {
            tracing::info!(role = %role, permission = %permission, "permission revoked");
        }
        removed
    }

    pub fn snapshot(&self) -> Bindings {
        let tables = self.tables.read();
        Bindings {
            users: tables.users.iter().map(|(i, r)| (i.clone(), r.clone())).collect(),
            roles: tables
                .roles
                .iter()
                .map(|(role, perms)| (role.clone(), perms.iter().cloned().collect()))
                .collect(),
        }
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn resolve_role(&self, identity: &Identity) -> Result<Option<Role>, StoreError> {
        Ok(self.tables.read().users.get(identity).cloned())
    }

    async fn permissions_for(&self, role: &Role) -> Result<HashSet<Permission>, StoreError> {
        Ok(self.tables.read().roles.get(role).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryRoleStore {
        InMemoryRoleStore::from_bindings(
            Bindings::new()
                .with_user("b@x.com", "viewer")
                .with_user("c@x.com", "editor")
                .with_role("editor", ["edit:doc", "read:doc"]),
        )
    }

    #[tokio::test]
    async fn resolves_roles_and_permissions() {
        let store = sample();
        let role = store.resolve_role(&Identity::from("c@x.com")).await.unwrap();
        assert_eq!(role, Some(Role::from("editor")));

        let perms = store.permissions_for(&Role::from("editor")).await.unwrap();
        assert_eq!(perms.len(), 2);
        assert!(perms.contains("edit:doc"));
    }

    #[tokio::test]
    async fn unknown_entries_are_not_errors() {
        let store = sample();
        assert_eq!(store.resolve_role(&Identity::from("a@x.com")).await.unwrap(), None);
        assert!(store.permissions_for(&Role::from("viewer")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reassignment_is_visible_to_next_lookup() {
        let store = sample();
        let previous = store.assign_role(Identity::from("b@x.com"), Role::from("editor"));
        assert_eq!(previous, Some(Role::from("viewer")));
        assert_eq!(
            store.resolve_role(&Identity::from("b@x.com")).await.unwrap(),
            Some(Role::from("editor"))
        );

        assert_eq!(store.unassign_role(&Identity::from("b@x.com")), Some(Role::from("editor")));
        assert_eq!(store.resolve_role(&Identity::from("b@x.com")).await.unwrap(), None);
    }

    #[test]
    fn grant_and_revoke_report_changes() {
        let store = sample();
        assert!(store.grant(Role::from("viewer"), Permission::from("read:doc")));
        assert!(!store.grant(Role::from("viewer"), Permission::from("read:doc")));
        assert!(store.revoke(&Role::from("viewer"), &Permission::from("read:doc")));
        assert!(!store.revoke(&Role::from("viewer"), &Permission::from("read:doc")));
        assert!(!store.snapshot().roles.contains_key("viewer"));
    }

    #[test]
    fn bindings_json_matches_snapshot() {
        let raw = r#"{
            "users": { "c@x.com": "editor" },
            "roles": { "editor": ["read:doc", "edit:doc"] }
        }"#;
        let bindings: Bindings = serde_json::from_str(raw).unwrap();
        let store = InMemoryRoleStore::from_bindings(bindings.clone());
        assert_eq!(store.snapshot(), bindings);
    }

    #[test]
    fn bindings_sections_are_optional() {
        let bindings: Bindings = serde_json::from_str("{}").unwrap();
        assert!(bindings.users.is_empty());
        assert!(bindings.roles.is_empty());
    }
}
