pub mod documents;
pub mod health;
pub mod reports;

use serde::Serialize;
use utoipa::ToSchema;

/// Acknowledgement returned by protected routes once the gate has admitted
/// the request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    #[schema(example = "documents")]
    pub resource: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[schema(example = "read:doc")]
    pub action: &'static str,
    pub status: &'static str,
}

impl ActionResponse {
    pub fn ok(resource: &'static str, action: &'static str) -> Self {
        Self {
            resource,
            id: None,
            action,
            status: "ok",
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
