//! HTTP-facing error type.
//!
//! Every failure that reaches a handler is folded into [`AppError`], which
//! renders as `{"error": "<message>"}` with the matching status code. The
//! lower layers keep their own error enums and convert through `From`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, warn};
use serde_json::json;

use crate::gate::{GateError, Rejection};
use crate::ledger::LedgerError;
use crate::render::RenderError;
use crate::storage::StorageError;
use crate::tabular::TabularError;

/// Error kinds surfaced to clients
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed request field
    #[error("{0}")]
    Validation(String),
    /// Token does not own the file, or the file is unknown
    #[error("{0}")]
    Unauthorized(String),
    /// Ledger lists the file but its blob is gone
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid request method")]
    MethodNotAllowed,
    /// Anything else: I/O, ledger corruption, CSV parsing, rendering
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            warn!("Request rejected with {}: {}", status, self);
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NotFoundOrUnauthorized => AppError::Unauthorized(rejection.to_string()),
            Rejection::FileMissing => AppError::NotFound(rejection.to_string()),
        }
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Rejected(rejection) => rejection.into(),
            GateError::Ledger(e) => e.into(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TabularError> for AppError {
    fn from(err: TabularError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::UnknownPlotType(_) | RenderError::InvalidColumn(_) => AppError::Validation(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}
