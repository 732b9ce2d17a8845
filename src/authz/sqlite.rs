use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::memory::Bindings;
use super::model::{Identity, Permission, Role};
use super::store::{RoleStore, StoreError};
use crate::utils::utc_now_rfc3339;

/// Database-backed store over the `identity_roles` and `role_permissions` tables.
#[derive(Debug, Clone)]
pub struct SqliteRoleStore {
    pool: SqlitePool,
}

impl SqliteRoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Assign (or reassign) a role, returning the role previously held.
    pub async fn assign_role(&self, identity: &Identity, role: &Role) -> Result<Option<Role>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> = sqlx::query_scalar("SELECT role FROM identity_roles WHERE identity = ?")
            .bind(identity.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO identity_roles (identity, role, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(identity) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
        )
        .bind(identity.as_str())
        .bind(role.as_str())
        .bind(utc_now_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            identity = %identity,
            role = %role,
            previous_role = previous.as_deref(),
            "role assigned"
        );
        Ok(previous.map(Role::from))
    }

    pub async fn unassign_role(&self, identity: &Identity) -> Result<Option<Role>, StoreError> {
        let previous: Option<String> =
            sqlx::query_scalar("DELETE FROM identity_roles WHERE identity = ? RETURNING role")
                .bind(identity.as_str())
                .fetch_optional(&self.pool)
                .await?;

        if let Some(ref role) = previous {
            tracing::info!(identity = %identity, previous_role = %role, "role unassigned");
        }
        Ok(previous.map(Role::from))
    }

    /// Bind a permission to a role. Returns false if it was already bound.
    pub async fn grant(&self, role: &Role, permission: &Permission) -> Result<bool, StoreError> {
        let result = sqlx::query("INSERT OR IGNORE INTO role_permissions (role, permission, created_at) VALUES (?, ?, ?)")
            .bind(role.as_str())
            .bind(permission.as_str())
            .bind(utc_now_rfc3339())
            .execute(&self.pool)
            .await?;

        let added = result.rows_affected() == 1;
        if added {
            tracing::info!(role = %role, permission = %permission, "permission granted");
        }
        Ok(added)
    }

    /// Remove a permission from a role. Returns false if it was not bound.
    pub async fn revoke(&self, role: &Role, permission: &Permission) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role = ? AND permission = ?")
            .bind(role.as_str())
            .bind(permission.as_str())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() == 1;
        if removed {
            tracing::info!(role = %role, permission = %permission, "permission revoked");
        }
        Ok(removed)
    }

    /// Merge a bindings document into the tables in one transaction. Existing
    /// assignments for the listed identities are overwritten.
    pub async fn import(&self, bindings: &Bindings) -> Result<(), StoreError> {
        let now = utc_now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (identity, role) in &bindings.users {
            sqlx::query(
                "INSERT INTO identity_roles (identity, role, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(identity) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
            )
            .bind(identity.as_str())
            .bind(role.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        for (role, permissions) in &bindings.roles {
            for permission in permissions {
                sqlx::query("INSERT OR IGNORE INTO role_permissions (role, permission, created_at) VALUES (?, ?, ?)")
                    .bind(role.as_str())
                    .bind(permission.as_str())
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            users = bindings.users.len(),
            roles = bindings.roles.len(),
            "bindings imported"
        );
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<Bindings, StoreError> {
        let mut bindings = Bindings::new();

        let users = sqlx::query("SELECT identity, role FROM identity_roles ORDER BY identity")
            .fetch_all(&self.pool)
            .await?;
        for row in users {
            let identity: String = row.try_get("identity")?;
            let role: String = row.try_get("role")?;
            bindings.users.insert(Identity::from(identity), Role::from(role));
        }

        let grants = sqlx::query("SELECT role, permission FROM role_permissions ORDER BY role, permission")
            .fetch_all(&self.pool)
            .await?;
        for row in grants {
            let role: String = row.try_get("role")?;
            let permission: String = row.try_get("permission")?;
            bindings
                .roles
                .entry(Role::from(role))
                .or_default()
                .insert(Permission::from(permission));
        }

        Ok(bindings)
    }
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn resolve_role(&self, identity: &Identity) -> Result<Option<Role>, StoreError> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM identity_roles WHERE identity = ?")
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(role.map(Role::from))
    }

    async fn permissions_for(&self, role: &Role) -> Result<HashSet<Permission>, StoreError> {
        let permissions: Vec<String> = sqlx::query_scalar("SELECT permission FROM role_permissions WHERE role = ?")
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(permissions.into_iter().map(Permission::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
