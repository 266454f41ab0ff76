//! Catalogue routes: one generic router per [`CatalogEntity`], plus the
//! medicine history and the company profile.
//!
//! ```text
//! POST   /<entity>            create
//! GET    /<entity>/{val}      "all" | id | name search (medicine: barcode first)
//! POST   /<entity>/detail     {id}
//! PATCH  /<entity>            {id, newData}
//! DELETE /<entity>            {id}
//! POST   /medicine/history    {id, startDate, endDate}
//! ```

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::audit::AuditKind;
use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::gate::Caller;
use crate::routes::logged;
use crate::routes::payload::{HistoryPayload, IdPayload, ModifyPayload};
use crate::services::catalog_service::{Catalog, CatalogEntity, CompanyService, COMPANY_ENTITY};
use crate::AppState;
use pharma_core::{CompanyProfileInput, Medicine};

pub fn router<E: CatalogEntity>() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create::<E>).patch(modify::<E>).delete(remove::<E>))
        .route("/detail", post(detail::<E>))
        .route("/{val}", get(find::<E>))
}

pub fn medicine_router() -> Router<Arc<AppState>> {
    router::<Medicine>().route("/history", post(history))
}

pub fn company_router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/",
        post(create_company)
            .get(get_company)
            .patch(modify_company)
            .delete(delete_company),
    )
}

// =============================================================================
// Generic handlers
// =============================================================================

async fn create<E: CatalogEntity>(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<E::Input>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let created = Catalog::<E>::new(&state).create(&caller, &input).await?;
    Ok(Envelope::created(format!("{} created", E::LABEL), created))
}

async fn find<E: CatalogEntity>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Envelope> {
    let Path(val) = path?;
    let found = Catalog::<E>::new(&state).find(&val).await?;
    Ok(Envelope::ok(format!("{} list", E::LABEL), found))
}

async fn detail<E: CatalogEntity>(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    payload: Result<Json<IdPayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let entity = Catalog::<E>::new(&state).detail(payload.id).await?;
    Ok(Envelope::ok(format!("{} detail", E::LABEL), entity))
}

async fn modify<E: CatalogEntity>(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<ModifyPayload<E::Input>>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let id = payload.require_id()?;
    let (modified, log) = Catalog::<E>::new(&state)
        .modify(&caller, id, &payload.new_data)
        .await?;
    let envelope = Envelope::ok(format!("{} modified", E::LABEL), modified);
    Ok(logged(envelope, AuditKind::Modify, E::ENTITY, log))
}

async fn remove<E: CatalogEntity>(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<IdPayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let log = Catalog::<E>::new(&state).delete(&caller, payload.id).await?;
    let envelope = Envelope::ok(format!("{} deleted", E::LABEL), json!({ "id": payload.id }));
    Ok(logged(envelope, AuditKind::Delete, E::ENTITY, log))
}

async fn history(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    payload: Result<Json<HistoryPayload>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let rows = Catalog::<Medicine>::new(&state)
        .history(payload.id, &payload.range)
        .await?;
    Ok(Envelope::ok("Medicine history", rows))
}

// =============================================================================
// Company profile
// =============================================================================

async fn create_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<CompanyProfileInput>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let profile = CompanyService::new(&state).create(&caller, &input).await?;
    Ok(Envelope::created("Company profile created", profile))
}

async fn get_company(State(state): State<Arc<AppState>>, _caller: Caller) -> ApiResult<Envelope> {
    let profile = CompanyService::new(&state).get().await?;
    Ok(Envelope::ok("Company profile", profile))
}

async fn modify_company(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<ModifyPayload<CompanyProfileInput>>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let (profile, log) = CompanyService::new(&state)
        .modify(&caller, &payload.new_data)
        .await?;
    let envelope = Envelope::ok("Company profile modified", profile);
    Ok(logged(envelope, AuditKind::Modify, COMPANY_ENTITY, log))
}

async fn delete_company(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Envelope> {
    let log = CompanyService::new(&state).delete(&caller).await?;
    let envelope = Envelope::ok("Company profile deleted", ());
    Ok(logged(envelope, AuditKind::Delete, COMPANY_ENTITY, log))
}
