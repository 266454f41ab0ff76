//! Error-log middleware.
//!
//! ```text
//! request ──► buffer body (kept as aux) ──► handler ──► response
//!                                                          │
//!                                      ApiError in extensions?
//!                                                          │ yes
//!                                                          ▼
//!                 audit.record_error(route, actor, aux, detail)
//!                                                          │
//!                                                          ▼
//!                     envelope with log = <file>, logData = log/error/<day>/<file>
//! ```
//!
//! Handlers and extractors only build an [`ApiError`]; writing the support
//! log and naming it in the envelope happens here, once.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{error, warn};

use crate::audit::error_log_data;
use crate::error::{ApiError, ErrorKind};
use crate::gate;
use crate::AppState;

/// Largest request body buffered for the error log.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub async fn error_log(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let route = format!("{} {}", request.method(), request.uri().path());
    let headers = request.headers().clone();

    let (parts, body) = request.into_parts();
    let (response, payload) = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => {
            let payload = serde_json::from_slice::<Value>(&bytes).ok();
            let request = Request::from_parts(parts, Body::from(bytes));
            (next.run(request).await, payload)
        }
        Err(e) => (
            ApiError::bad_payload(format!("Request body could not be read: {e}")).into_response(),
            None,
        ),
    };

    let Some(err) = response.extensions().get::<ApiError>().cloned() else {
        return response;
    };

    let actor = err.actor.or_else(|| gate::claimed_user(&state, &headers));
    let aux = err.aux.clone().or(payload);

    if err.kind == ErrorKind::Internal {
        error!(route = %route, actor = ?actor, error = %err, "Request failed");
    } else {
        warn!(route = %route, actor = ?actor, error = %err, "Request rejected");
    }

    let file = state
        .audit
        .record_error(&route, actor, aux.as_ref(), &err.detail)
        .await;
    let log_data = file.as_deref().and_then(error_log_data);

    let (mut parts, _) = response.into_parts();
    let envelope = err.envelope().with_log(file, log_data);
    let body = envelope.into_response().into_body();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, body)
}

/// Answers any `OPTIONS` request with 200; preflights never reach here
/// because the CORS layer answers them first.
pub async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}
