use axum::extract::Path;
use axum::Json;

use super::ActionResponse;
use crate::authz::permissions;

#[utoipa::path(
    get,
    path = "/allapis/documents",
    tag = "Documents",
    responses(
        (status = 200, description = "Caller may read documents", body = ActionResponse),
        (status = 401, description = "No identity, or identity without a role", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role lacks read:doc", body = crate::errors::ErrorResponse)
    ),
    security(("identityHeader" = []))
)]
pub async fn list_documents() -> Json<ActionResponse> {
    Json(ActionResponse::ok("documents", permissions::DOC_READ))
}

#[utoipa::path(
    put,
    path = "/allapis/documents/{id}",
    tag = "Documents",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Caller may edit the document", body = ActionResponse),
        (status = 401, description = "No identity, or identity without a role", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role lacks edit:doc", body = crate::errors::ErrorResponse)
    ),
    security(("identityHeader" = []))
)]
pub async fn update_document(Path(id): Path<String>) -> Json<ActionResponse> {
    Json(ActionResponse::ok("documents", permissions::DOC_EDIT).with_id(id))
}

#[utoipa::path(
    delete,
    path = "/allapis/documents/{id}",
    tag = "Documents",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Caller may delete the document", body = ActionResponse),
        (status = 401, description = "No identity, or identity without a role", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role lacks delete:doc", body = crate::errors::ErrorResponse)
    ),
    security(("identityHeader" = []))
)]
pub async fn delete_document(Path(id): Path<String>) -> Json<ActionResponse> {
    Json(ActionResponse::ok("documents", permissions::DOC_DELETE).with_id(id))
}
