//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON `{"error": ...}`
//! body with a matching status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned, so SQL, file paths or upstream payloads never reach clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller referenced a resource that does not exist or is not theirs.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An upstream provider failed.
    #[error("upstream error: {0}")]
    BadGateway(String),

    /// A feature whose upstream is not configured was requested.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<bubble_core::Error> for ServerError {
    fn from(e: bubble_core::Error) -> Self {
        use bubble_core::Error as E;
        match e {
            E::NotFound(m) => ServerError::NotFound(m),
            E::InvalidInput(m) => ServerError::BadRequest(m),
            E::Upstream { status, message } => {
                warn!(status, message = %message, "upstream provider error");
                ServerError::BadGateway(format!("upstream returned {status}"))
            }
            E::Http(e) => {
                warn!(error = %e, "upstream request failed");
                ServerError::BadGateway("upstream unreachable".into())
            }
            E::Config(m) => ServerError::Unavailable(m),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
            ServerError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}
