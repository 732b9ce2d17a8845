use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::authz::StoreError;

pub const UNAUTHENTICATED_MESSAGE: &str = "Unauthorized: no user context";
pub const FORBIDDEN_MESSAGE: &str = "Forbidden: insufficient permissions";
pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("access store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller. Server-side failures collapse
    /// to a generic string; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Unauthenticated(message) | AppError::Forbidden(message) => message.clone(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Forbidden: insufficient permissions")]
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let payload = ErrorResponse {
            error: self.public_message(),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
