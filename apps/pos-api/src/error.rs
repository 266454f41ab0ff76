//! Error types for the POS API.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Source                          ErrorKind            HTTP             │
//! │  ─────────────────────────────   ──────────────────   ────             │
//! │  JSON decode, ValidationError    BadPayload           400              │
//! │  TokenError (missing/expired/…)  Unauthorized         401              │
//! │  TokenError::NotAdmin            Forbidden            403              │
//! │  DbError::NotFound               NotFound             400              │
//! │  DbError::UniqueViolation        Conflict             400              │
//! │  CoreError::NegativeStock        Conflict             400              │
//! │  CoreError::InsufficientStock    InsufficientStock    400              │
//! │  anything else                   Internal             500              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An [`ApiError`] renders as an [`Envelope`]; the error-log middleware in
//! `middleware.rs` then writes the support log and fills in its file name.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::audit::AuditError;
use crate::auth::TokenError;
use crate::envelope::Envelope;
use crate::pdf::RenderError;
use pharma_core::{CoreError, Id, ValidationError};
use pharma_db::DbError;

/// Error kinds surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadPayload,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InsufficientStock,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::BadPayload
            | ErrorKind::NotFound
            | ErrorKind::Conflict
            | ErrorKind::InsufficientStock => StatusCode::BAD_REQUEST,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadPayload => "BadPayload",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InsufficientStock => "InsufficientStock",
            ErrorKind::Internal => "Internal",
        }
    }
}

/// An error on its way to the client.
///
/// `message` is safe to display; `detail` is what goes into the error log.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
    /// Caller, once the gate has resolved one.
    pub actor: Option<Id>,
    /// Request payload or other context for the error log.
    pub aux: Option<Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError {
            kind,
            detail: message.clone(),
            message,
            actor: None,
            aux: None,
        }
    }

    pub fn bad_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadPayload, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Internal errors show a generic message; the cause goes to the log.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        ApiError {
            kind: ErrorKind::Internal,
            message: "Internal server error, please contact administrator".to_string(),
            detail: detail.to_string(),
            actor: None,
            aux: None,
        }
    }

    pub fn by(mut self, actor: Id) -> Self {
        self.actor.get_or_insert(actor);
        self
    }

    pub fn with_aux(mut self, aux: Value) -> Self {
        self.aux.get_or_insert(aux);
        self
    }

    pub fn envelope(&self) -> Envelope {
        Envelope::failure(self.kind.status(), self.kind.as_str(), &self.message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.envelope().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_payload(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::bad_payload(err.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::bad_payload(err.body_text())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let kind = match &err {
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::NegativeStock { .. } => ErrorKind::Conflict,
            CoreError::UnknownUnit { .. }
            | CoreError::TooManyItems { .. }
            | CoreError::Validation(_) => ErrorKind::BadPayload,
        };
        ApiError::new(kind, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ApiError::conflict(err.to_string())
            }
            DbError::CheckViolation { .. } => ApiError::bad_payload(err.to_string()),
            _ => ApiError::internal(err),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotAdmin => ApiError::new(ErrorKind::Forbidden, err.to_string()),
            TokenError::Signing(_) => ApiError::internal(err),
            _ => ApiError::unauthorized(err.to_string()),
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        ApiError::internal(err)
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::internal(err)
    }
}

/// Result type for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;
