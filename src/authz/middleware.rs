//! Axum glue for [`PermissionGate`].

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::gate::PermissionGate;
use crate::errors::AppError;

/// Middleware that admits or rejects a request with the gate's permission.
///
/// Install per route so each route carries its own required permission:
///
/// ```ignore
/// use axum::middleware::from_fn_with_state;
///
/// Router::new().route(
///     "/documents",
///     get(list_documents).route_layer(from_fn_with_state(gate, enforce)),
/// )
/// ```
///
/// On admission the request is passed on exactly as it arrived.
pub async fn enforce(
    State(gate): State<PermissionGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    gate.handle(&parts).await?;
    Ok(next.run(Request::from_parts(parts, body)).await)
}
