//! Error taxonomy shared by the console views

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// A failure surfaced to the user of the console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The path or job does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Bad byte range, bad mode, malformed form, path separator in a name.
    #[error("{0}")]
    InvalidRequest(String),

    /// The requester may not access the resource.
    #[error("{0}")]
    PermissionDenied(String),

    /// The filesystem or the Oozie server failed. `detail` is kept for the
    /// logs and never rendered.
    #[error("{message}")]
    Upstream { message: String, detail: String },

    #[error("{0}")]
    Internal(String),
}

impl ConsoleError {
    pub fn upstream(message: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Upstream {
            message: message.into(),
            detail: detail.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        if let Self::Upstream { message, detail } = &self {
            warn!("{message} ({detail})");
        }
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
