use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Outcomes of the secret lifecycle other than success.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Bad or missing input from the caller.
    #[error("{0}")]
    Validation(String),

    /// The key never existed, was already consumed, or has expired.
    #[error("not found or expired")]
    NotFound,

    /// The backing store failed. Never retried here.
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(#[from] anyhow::Error),
}

impl SecretError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Result type alias for lifecycle operations.
pub type SecretResult<T> = Result<T, SecretError>;

impl IntoResponse for SecretError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::StoreUnavailable(e) => {
                tracing::error!(error = %format!("{e:#}"), "store unavailable");
                "store unavailable".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
