//! HTTP-facing error type.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::coordinator::ActionError;

/// Application-level error returned by handlers and extractors.
#[derive(Debug, Error)]
pub enum AppError {
    /// A moderation request was refused before reaching the store.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is signed in (or in demo mode) but lacks the role.
    #[error("Access Denied")]
    Forbidden,

    /// Caller has no usable session.
    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Action(ActionError::NoPendingAction) => StatusCode::CONFLICT,
            Self::Action(ActionError::MutationInFlight) => StatusCode::CONFLICT,
            Self::Action(ActionError::TargetNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Action(ActionError::TargetMismatch(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Action(ActionError::Unmounted) => StatusCode::GONE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        tracing::debug!(error = %self, %status, "request refused");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
