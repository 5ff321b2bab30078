//! # API Errors
//!
//! [`ApiError`] is what every handler returns on failure. Its [`IntoResponse`] impl picks
//! the HTTP status from the store's [`ErrorKind`] and renders a JSON body:
//!
//! ```json
//! { "code": "not_found", "message": "order not found: order:42" }
//! ```
//!
//! | Kind | Status |
//! |------|--------|
//! | `not_found` | 404 |
//! | `duplicate_key` | 409 |
//! | `encoding_error`, `decoding_error` | 500 |
//! | `backend_unavailable` | 503 |
//! | `invalid_transition` | 400 |
//!
//! Server-side failures are logged with their full cause chain before the response is
//! built. Client errors are not logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use order_store::{BackendError, ErrorKind, StoreError};
use serde::Serialize;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::error;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The requested status change is not allowed from the order's current state.
    #[error("invalid status transition: {0}")]
    InvalidTransition(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::DuplicateKey => StatusCode::CONFLICT,
                ErrorKind::Encoding | ErrorKind::Decoding => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> String {
        match self {
            ApiError::Store(err) => err.kind().to_string(),
            ApiError::InvalidTransition(_) => "invalid_transition".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = %self.code(), error = %error_chain(&self), "Request failed");
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Errors that stop the service from starting or serving.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create backend: {0}")]
    Backend(#[from] BackendError),

    #[error("backend unreachable, refusing to serve")]
    Unreachable(#[source] StoreError),

    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
