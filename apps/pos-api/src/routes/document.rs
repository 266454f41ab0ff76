//! Document routes, one nested router per kind.
//!
//! ```text
//! POST   /            create            GET  /              next number
//! PATCH  /            {id, newData, force?}
//! DELETE /            {id, force?}      (administrators)
//! POST   /detail      {id}              POST /print         {id}
//! POST   /list        {startDate, endDate}
//! POST   /list/{filter}/{val}           filter: all | id | number | user | <counterparty>
//!
//! sales invoices only:
//! POST   /print-receipt {id}            till receipt, issued once
//! ```

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::audit::AuditKind;
use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::gate::{AdminCaller, Caller};
use crate::routes::logged;
use crate::routes::payload::{DeletePayload, IdPayload, ModifyPayload};
use crate::services::document_service::{DocumentEngine, Saved};
use crate::AppState;
use pharma_core::{DateRange, DocumentModel, ListFilter};
use pharma_db::{DocumentRepository, Invoices};

pub fn router<R: DocumentRepository>() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(create::<R>)
                .get(next_number::<R>)
                .patch(modify::<R>)
                .delete(delete::<R>),
        )
        .route("/detail", post(detail::<R>))
        .route("/print", post(print::<R>))
        .route("/list", post(list::<R>))
        .route("/list/{filter}/{val}", post(list_filtered::<R>))
}

/// Sales invoices: the shared routes plus the till receipt.
pub fn invoice_router() -> Router<Arc<AppState>> {
    router::<Invoices>().route("/print-receipt", post(print_receipt))
}

fn label<R: DocumentRepository>() -> &'static str {
    R::TABLE.kind.label()
}

/// 201/200, or 207 when the artifact step failed.
fn saved<R: DocumentRepository>(saved: Saved<R::Detail>, message: String, created: bool) -> Envelope {
    let envelope = match saved.artifact_error {
        Some(err) => Envelope::partial(message, err, &saved.document),
        None if created => Envelope::created(message, &saved.document),
        None => Envelope::ok(message, &saved.document),
    };
    logged(envelope, AuditKind::Modify, R::TABLE.kind.as_str(), saved.log)
}

async fn create<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<R::Draft>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(draft) = payload?;
    let result = DocumentEngine::<R>::new(&state).create(&caller, draft).await?;
    let message = format!("{} {} created", label::<R>(), result.document.number());
    Ok(saved::<R>(result, message, true))
}

async fn next_number<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> ApiResult<Envelope> {
    let number = DocumentEngine::<R>::new(&state).next_number().await?;
    Ok(Envelope::ok("Next number", json!({ "nextNumber": number })))
}

async fn modify<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<ModifyPayload<R::Draft>>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let id = payload.require_id()?;
    let result = DocumentEngine::<R>::new(&state)
        .modify(&caller, id, payload.new_data, payload.force)
        .await?;
    let message = format!("{} {} modified", label::<R>(), result.document.number());
    Ok(saved::<R>(result, message, false))
}

async fn delete<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    payload: Result<Json<DeletePayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let deleted = DocumentEngine::<R>::new(&state)
        .delete(&caller, payload.id, payload.force)
        .await?;

    let envelope = Envelope::ok(
        format!("{} {} deleted", label::<R>(), deleted.number),
        json!({ "id": deleted.id, "number": deleted.number }),
    );
    Ok(logged(envelope, AuditKind::Delete, R::TABLE.kind.as_str(), deleted.log))
}

async fn detail<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    payload: Result<Json<IdPayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let document = DocumentEngine::<R>::new(&state).detail(payload.id).await?;
    Ok(Envelope::ok(format!("{} detail", label::<R>()), document))
}

async fn print<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    payload: Result<Json<IdPayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let url = DocumentEngine::<R>::new(&state).print(payload.id).await?;
    Ok(Envelope::ok(format!("{} printed", label::<R>()), json!({ "pdfUrl": url })))
}

async fn print_receipt(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<IdPayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let url = DocumentEngine::<Invoices>::new(&state)
        .print_receipt(&caller, payload.id)
        .await?;
    Ok(Envelope::ok("Invoice receipt printed", json!({ "receiptPdfUrl": url })))
}

async fn list<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    payload: Result<Json<DateRange>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(range) = payload?;
    let documents = DocumentEngine::<R>::new(&state)
        .list(&range, &ListFilter::All)
        .await?;
    Ok(Envelope::ok(format!("{} list", label::<R>()), documents))
}

async fn list_filtered<R: DocumentRepository>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Result<Json<DateRange>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Path((filter, val)) = path?;
    let Json(range) = payload?;
    let filter = ListFilter::parse(R::TABLE.kind, &filter, &val)?;
    let documents = DocumentEngine::<R>::new(&state).list(&range, &filter).await?;
    Ok(Envelope::ok(format!("{} list", label::<R>()), documents))
}
