//! The uniform response body.
//!
//! ```text
//! { "success": bool, "message": str, "code": int,
//!   "log": str?, "logData": str?, "error": str?, "result": any? }
//! ```
//!
//! Every handler answers with an [`Envelope`]; errors are turned into one by
//! [`ApiError`](crate::error::ApiError).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Envelope {
    /// 200 with a result.
    pub fn ok(message: impl Into<String>, result: impl Serialize) -> Self {
        Self::success(StatusCode::OK, message, result)
    }

    /// 201 with a result.
    pub fn created(message: impl Into<String>, result: impl Serialize) -> Self {
        Self::success(StatusCode::CREATED, message, result)
    }

    pub fn success(status: StatusCode, message: impl Into<String>, result: impl Serialize) -> Self {
        let result = serde_json::to_value(result).ok().filter(|v| !v.is_null());
        Envelope {
            success: true,
            message: message.into(),
            code: status.as_u16(),
            log: None,
            log_data: None,
            error: None,
            result,
        }
    }

    /// 207: the database write stands, the artifact step failed.
    pub fn partial(message: impl Into<String>, error: impl Into<String>, result: impl Serialize) -> Self {
        Envelope {
            error: Some(error.into()),
            ..Self::success(StatusCode::MULTI_STATUS, message, result)
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, error: impl Into<String>) -> Self {
        Envelope {
            success: false,
            message: message.into(),
            code: status.as_u16(),
            log: None,
            log_data: None,
            error: Some(error.into()),
            result: None,
        }
    }

    /// Attaches an audit or error log reference.
    pub fn with_log(mut self, log: Option<String>, log_data: Option<String>) -> Self {
        self.log = log;
        self.log_data = log_data;
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
