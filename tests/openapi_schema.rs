use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use access_gate::authz::InMemoryRoleStore;
use access_gate::config::AppConfig;
use access_gate::events::init_audit_bus;
use access_gate::{create_app, AppState};

#[test]
fn openapi_lists_protected_routes_under_mount_path() -> anyhow::Result<()> {
    let config = AppConfig::from_lookup(|key| (key == "MOUNT_PATH").then(|| "/gated".to_string()))?;
    let doc = access_gate::docs::build_openapi(&config)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v
        .get("paths")
        .and_then(Value::as_object)
        .expect("paths must exist");

    for p in ["/health", "/gated/documents", "/gated/documents/{id}", "/gated/reports"] {
        assert!(paths.contains_key(p), "OpenAPI missing path '{}'", p);
    }
    assert!(!paths.keys().any(|p| p.starts_with("/allapis")));

    let scheme = &v["components"]["securitySchemes"]["identityHeader"];
    assert_eq!(scheme["in"], "header");
    assert_eq!(scheme["name"], "x-user-email");

    let error_props = v
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.get("ErrorResponse"))
        .and_then(|e| e.get("properties"))
        .and_then(Value::as_object)
        .expect("components.schemas.ErrorResponse.properties must exist");
    assert!(error_props.contains_key("error"));

    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> anyhow::Result<()> {
    let (audit, _rx) = init_audit_bus();
    let app = create_app(AppState::new(Arc::new(InMemoryRoleStore::new()), audit, AppConfig::default()))?;

    let req = Request::builder()
        .method("GET")
        .uri("/api-docs/openapi.json")
        .body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let v: Value = serde_json::from_slice(&body_bytes)?;
    assert!(v["paths"].get("/allapis/documents").is_some());

    Ok(())
}
