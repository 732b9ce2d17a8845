//! Decision audit trail.
//!
//! Every gate invocation produces one [`DecisionEvent`]. The event is written
//! to the service log immediately and published on the audit bus; with a
//! database configured, [`start_audit_listener`] appends it to `audit_log`
//! as a SHA-256 hash chain.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::authz::{Decision, Identity, Permission, Role};
use crate::utils::{chain_hash, utc_now};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub permission: Permission,
    pub decision: Decision,
    /// False when advisory mode let a denied request through
    pub enforced: bool,
    pub method: String,
    pub path: String,
}

impl DecisionEvent {
    pub fn new(
        identity: Option<Identity>,
        role: Option<Role>,
        permission: Permission,
        decision: Decision,
        enforced: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: utc_now(),
            identity,
            role,
            permission,
            decision,
            enforced,
            method: String::new(),
            path: String::new(),
        }
    }

    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = method.into();
        self.path = path.into();
        self
    }
}

pub type AuditBus = broadcast::Sender<DecisionEvent>;

pub fn init_audit_bus() -> (AuditBus, broadcast::Receiver<DecisionEvent>) {
    broadcast::channel(1024)
}

/// Log the decision and publish it on the bus.
///
/// A bus without subscribers is normal (no database configured), so send
/// failures are ignored.
pub fn record_decision(bus: &AuditBus, event: DecisionEvent) {
    let identity = event.identity.as_ref().map(Identity::as_str);
    let role = event.role.as_ref().map(Role::as_str);

    match event.decision {
        Decision::Admitted => tracing::info!(
            identity,
            role,
            permission = %event.permission,
            decision = event.decision.as_str(),
            enforced = event.enforced,
            method = %event.method,
            path = %event.path,
            "access decision"
        ),
        _ => tracing::warn!(
            identity,
            role,
            permission = %event.permission,
            decision = event.decision.as_str(),
            enforced = event.enforced,
            method = %event.method,
            path = %event.path,
            "access decision"
        ),
    }

    let _ = bus.send(event);
}

pub async fn start_audit_listener(mut rx: broadcast::Receiver<DecisionEvent>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = persist_decision(&pool, &event).await {
                    tracing::error!(event_id = %event.id, "failed to save audit record: {:#}", e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged; decisions dropped from audit_log");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("audit listener stopped");
}

/// Append one decision to `audit_log`, returning the new chain hash.
pub async fn persist_decision(pool: &SqlitePool, event: &DecisionEvent) -> anyhow::Result<String> {
    let payload = serde_json::to_string(event).context("failed to serialize decision event")?;

    let mut tx = pool.begin().await?;

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;

    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        r#"
        INSERT INTO audit_log (id, occurred_at, identity, role, permission, decision, enforced, payload, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(event.occurred_at.to_rfc3339())
    .bind(event.identity.as_ref().map(Identity::as_str))
    .bind(event.role.as_ref().map(Role::as_str))
    .bind(event.permission.as_str())
    .bind(event.decision.as_str())
    .bind(event.enforced)
    .bind(&payload)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(hash)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub checked: usize,
    /// `seq` of the first record whose hash does not match its payload
    pub broken_at: Option<i64>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.broken_at.is_none()
    }
}

pub async fn verify_chain(pool: &SqlitePool) -> Result<ChainVerification, sqlx::Error> {
    let rows = sqlx::query("SELECT seq, payload, prev_hash, hash FROM audit_log ORDER BY seq")
        .fetch_all(pool)
        .await?;

    let mut expected_prev: Option<String> = None;
    let mut checked = 0;

    for row in rows {
        let seq: i64 = row.try_get("seq")?;
        let payload: String = row.try_get("payload")?;
        let prev_hash: Option<String> = row.try_get("prev_hash")?;
        let hash: String = row.try_get("hash")?;

        if prev_hash != expected_prev || chain_hash(prev_hash.as_deref(), &payload) != hash {
            return Ok(ChainVerification {
                checked,
                broken_at: Some(seq),
            });
        }

        checked += 1;
        expected_prev = Some(hash);
    }

    Ok(ChainVerification {
        checked,
        broken_at: None,
    })
}
