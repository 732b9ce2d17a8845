use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{enforce, permissions, Permission, PermissionGate, RoleStore};
use crate::config::AppConfig;
use crate::docs;
use crate::errors::AppError;
use crate::events::AuditBus;
use crate::routes::{documents, health, reports};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RoleStore>,
    pub audit: AuditBus,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn RoleStore>, audit: AuditBus, config: AppConfig) -> Self {
        Self {
            store,
            audit,
            config: Arc::new(config),
        }
    }

    /// Gate for one protected route, sharing this state's store and audit bus.
    pub fn gate(&self, required: impl Into<Permission>) -> PermissionGate {
        PermissionGate::new(required, Arc::clone(&self.store), self.audit.clone())
            .with_identity_header(self.config.identity_header.clone())
            .with_mode(self.config.authz_mode)
    }
}

pub fn create_app(state: AppState) -> Result<Router, AppError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let require = |permission: &str| from_fn_with_state(state.gate(permission), enforce);

    // Every protected route carries exactly one required permission.
    let protected_routes = Router::new()
        .route(
            "/documents",
            get(documents::list_documents).route_layer(require(permissions::DOC_READ)),
        )
        .route(
            "/documents/:id",
            put(documents::update_document)
                .route_layer(require(permissions::DOC_EDIT))
                .merge(delete(documents::delete_document).route_layer(require(permissions::DOC_DELETE))),
        )
        .route(
            "/reports",
            get(reports::list_reports).route_layer(require(permissions::REPORTS_READ)),
        );

    let openapi = Arc::new(docs::build_openapi(&state.config)?);
    let docs_route = get(move || {
        let openapi = Arc::clone(&openapi);
        async move { Json(openapi.as_ref().clone()) }
    });

    let mount_path = state.config.mount_path.clone();
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", docs_route)
        .nest(&mount_path, protected_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
