use anyhow::Context;
use anyhow::Result;
use sqlx::SqlitePool;
use tempfile::tempdir;

use access_gate::authz::{Decision, Identity, Permission, Role};
use access_gate::events::{init_audit_bus, persist_decision, record_decision, start_audit_listener, verify_chain, DecisionEvent};

async fn migrated_pool(dir: &tempfile::TempDir) -> Result<SqlitePool> {
    let db_path = dir.path().join("audit.db");
    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

fn event(identity: Option<&str>, role: Option<&str>, decision: Decision) -> DecisionEvent {
    DecisionEvent::new(
        identity.map(Identity::from),
        role.map(Role::from),
        Permission::from("edit:doc"),
        decision,
        true,
    )
    .with_request("PUT", "/allapis/documents/1")
}

#[tokio::test]
async fn persisted_decisions_form_a_hash_chain() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let pool = migrated_pool(&dir).await?;

    let first = persist_decision(&pool, &event(None, None, Decision::Unauthenticated)).await?;
    let second = persist_decision(&pool, &event(Some("c@x.com"), Some("editor"), Decision::Admitted)).await?;
    assert_ne!(first, second);

    let prev: Option<String> = sqlx::query_scalar("SELECT prev_hash FROM audit_log ORDER BY seq DESC LIMIT 1")
        .fetch_one(&pool)
        .await?;
    assert_eq!(prev.as_deref(), Some(first.as_str()));

    let verification = verify_chain(&pool).await?;
    assert!(verification.is_intact());
    assert_eq!(verification.checked, 2);

    Ok(())
}

#[tokio::test]
async fn tampering_breaks_the_chain() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let pool = migrated_pool(&dir).await?;

    for decision in [Decision::Forbidden, Decision::Admitted, Decision::Admitted] {
        persist_decision(&pool, &event(Some("b@x.com"), Some("viewer"), decision)).await?;
    }

    // Rewrite history: turn the denial into an admission.
    sqlx::query("UPDATE audit_log SET payload = replace(payload, '\"forbidden\"', '\"admitted\"') WHERE seq = 1")
        .execute(&pool)
        .await?;

    let verification = verify_chain(&pool).await?;
    assert_eq!(verification.broken_at, Some(1));
    assert_eq!(verification.checked, 0);

    Ok(())
}

#[tokio::test]
async fn listener_persists_published_decisions() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let pool = migrated_pool(&dir).await?;

    let (bus, rx) = init_audit_bus();
    let listener = tokio::spawn(start_audit_listener(rx, pool.clone()));

    record_decision(&bus, event(None, None, Decision::Unauthenticated));
    record_decision(&bus, event(Some("c@x.com"), Some("editor"), Decision::Admitted));

    // Closing the bus lets the listener drain and exit.
    drop(bus);
    listener.await?;

    let rows: Vec<(Option<String>, Option<String>, String)> =
        sqlx::query_as("SELECT identity, role, decision FROM audit_log ORDER BY seq")
            .fetch_all(&pool)
            .await?;
    assert_eq!(
        rows,
        vec![
            (None, None, "unauthenticated".to_string()),
            (Some("c@x.com".to_string()), Some("editor".to_string()), "admitted".to_string()),
        ]
    );
    assert!(verify_chain(&pool).await?.is_intact());

    Ok(())
}

#[tokio::test]
async fn stored_payload_decodes_to_the_original_event() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let pool = migrated_pool(&dir).await?;

    let original = event(Some("josé@x.com"), Some("editor"), Decision::Forbidden);
    persist_decision(&pool, &original).await?;

    let payload: String = sqlx::query_scalar("SELECT payload FROM audit_log WHERE seq = 1")
        .fetch_one(&pool)
        .await?;
    let decoded: DecisionEvent = serde_json::from_str(&payload)?;
    assert_eq!(decoded, original);
    assert_eq!(decoded.path, "/allapis/documents/1");

    Ok(())
}
