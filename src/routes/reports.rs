use axum::Json;

use super::ActionResponse;
use crate::authz::permissions;

#[utoipa::path(
    get,
    path = "/allapis/reports",
    tag = "Reports",
    responses(
        (status = 200, description = "Caller may read reports", body = ActionResponse),
        (status = 401, description = "No identity, or identity without a role", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role lacks read:reports", body = crate::errors::ErrorResponse)
    ),
    security(("identityHeader" = []))
)]
pub async fn list_reports() -> Json<ActionResponse> {
    Json(ActionResponse::ok("reports", permissions::REPORTS_READ))
}
