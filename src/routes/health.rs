use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

const STORE_UNAVAILABLE: &str = "access store unavailable";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_ok: bool,
    pub store_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // Lightweight store check
    match state.store.ping().await {
        Ok(()) => Json(HealthResponse { status: "ok", store_ok: true, store_error: None }),
        Err(e) => {
            tracing::warn!("access store ping failed: {}", e);
            Json(HealthResponse {
                status: "ok",
                store_ok: false,
                store_error: Some(STORE_UNAVAILABLE.to_string()),
            })
        }
    }
}
