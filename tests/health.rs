use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt; // for `oneshot`

use access_gate::authz::{InMemoryRoleStore, SqliteRoleStore};
use access_gate::config::AppConfig;
use access_gate::events::init_audit_bus;
use access_gate::{create_app, AppState};

async fn health_body(app: axum::Router) -> Result<Value> {
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())?;

    let resp: Response = app.oneshot(req).await?;
    let status = resp.status();
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");

    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    Ok(serde_json::from_slice(&body_bytes)?)
}

#[tokio::test]
async fn health_endpoint_reports_memory_store_ok() -> Result<()> {
    let (audit, _rx) = init_audit_bus();
    let app = create_app(AppState::new(Arc::new(InMemoryRoleStore::new()), audit, AppConfig::default()))?;

    let v = health_body(app).await?;
    assert_eq!(v.get("status").and_then(|s| s.as_str()), Some("ok"));
    let store_ok = v.get("store_ok").and_then(|b| b.as_bool()).unwrap_or(false);
    assert!(store_ok, "expected store_ok: true, got: {}", v);

    Ok(())
}

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    // create temp dir and sqlite db
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    // run migrations
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let (audit, _rx) = init_audit_bus();
    let app = create_app(AppState::new(Arc::new(SqliteRoleStore::new(pool)), audit, AppConfig::default()))?;

    let v = health_body(app).await?;
    let store_ok = v.get("store_ok").and_then(|b| b.as_bool()).unwrap_or(false);
    assert!(store_ok, "expected store_ok: true, got: {}", v);
    assert!(v.get("store_error").map(Value::is_null).unwrap_or(false));

    Ok(())
}

#[tokio::test]
async fn health_endpoint_hides_store_failure_details() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("closed.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    pool.close().await;

    let (audit, _rx) = init_audit_bus();
    let app = create_app(AppState::new(Arc::new(SqliteRoleStore::new(pool)), audit, AppConfig::default()))?;

    let v = health_body(app).await?;
    assert_eq!(v.get("store_ok").and_then(|b| b.as_bool()), Some(false));
    assert_eq!(v.get("store_error").and_then(|s| s.as_str()), Some("access store unavailable"));
    assert!(!v.to_string().contains("pool"), "store detail leaked: {}", v);

    Ok(())
}
