//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CorsLayer (any origin)                                                 │
//! │   └─ TraceLayer                                                         │
//! │       └─ error_log middleware                                           │
//! │           └─ answer_options                                             │
//! │               ├─ /login /logout /user/...          user.rs              │
//! │               ├─ /customer /doctor /patient ...    catalog.rs           │
//! │               ├─ /company-profile                  catalog.rs           │
//! │               ├─ /invoice /invoice/purchase                             │
//! │               │  /invoice/purchase-order /production  document.rs       │
//! │               ├─ /health                                                │
//! │               └─ /static/...                       ServeDir             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod document;
pub mod payload;
pub mod user;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::audit::AuditKind;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::middleware::{answer_options, error_log};
use crate::services::health_service;
use crate::AppState;
use pharma_core::{Customer, Doctor, Patient, PaymentMethod, Supplier, Unit};
use pharma_db::{Productions, PurchaseInvoices, PurchaseOrders};

/// Builds the full application router.
///
/// ## Usage
/// ```rust,ignore
/// let app = build_router(Arc::new(AppState::connect(config).await?));
/// axum::serve(listener, app).await?;
/// ```
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(user::router())
        .nest("/customer", catalog::router::<Customer>())
        .nest("/doctor", catalog::router::<Doctor>())
        .nest("/patient", catalog::router::<Patient>())
        .nest("/supplier", catalog::router::<Supplier>())
        .nest("/unit", catalog::router::<Unit>())
        .nest("/payment-method", catalog::router::<PaymentMethod>())
        .nest("/medicine", catalog::medicine_router())
        .nest("/company-profile", catalog::company_router())
        .nest("/invoice/purchase-order", document::router::<PurchaseOrders>())
        .nest("/invoice/purchase", document::router::<PurchaseInvoices>())
        .nest("/invoice", document::invoice_router())
        .nest("/production", document::router::<Productions>())
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback(unknown_route)
        .layer(from_fn(answer_options))
        .layer(from_fn_with_state(state.clone(), error_log))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fills in `log`/`logData` for an audit event file.
pub(crate) fn logged(envelope: Envelope, kind: AuditKind, entity: &str, file: Option<String>) -> Envelope {
    let log_data = file.as_deref().map(|f| kind.log_data(entity, f));
    envelope.with_log(file, log_data)
}

async fn health(State(state): State<Arc<AppState>>) -> Envelope {
    let report = health_service::check(&state).await;
    if report.is_serving() {
        Envelope::ok("Healthy", report)
    } else {
        let message = report.message.clone();
        Envelope {
            result: serde_json::to_value(&report).ok(),
            ..Envelope::failure(StatusCode::SERVICE_UNAVAILABLE, "Unhealthy", message)
        }
    }
}

async fn unknown_route() -> ApiError {
    ApiError::not_found("Route not found")
}
