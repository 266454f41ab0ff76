//! Session and user routes.
//!
//! `POST /login` and `POST /user/reset-password` are public; everything
//! that changes another account takes an [`AdminCaller`].

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::json;

use crate::audit::AuditKind;
use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::gate::{AdminCaller, Caller};
use crate::routes::logged;
use crate::routes::payload::ModifyPayload;
use crate::services::auth_service::{
    AdminFlagInput, AuthService, LoginInput, ResetPasswordInput, UserDeleteInput,
};
use crate::AppState;
use pharma_core::UserInput;

const ENTITY: &str = "user";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", post(enrol).patch(modify).delete(remove))
        .route("/user/current", get(current))
        .route("/user/admin", patch(set_admin))
        .route("/user/reset-password", post(reset_password))
        .route("/user/{val}", get(find))
}

async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let result = AuthService::new(&state).login(&input).await?;
    Ok(Envelope::ok(format!("Welcome, {}", result.user.name), result))
}

async fn logout(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Envelope> {
    AuthService::new(&state).logout(&caller).await?;
    Ok(Envelope::ok("Logged out", ()))
}

async fn current(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Envelope> {
    let user = AuthService::new(&state).current(&caller).await?;
    Ok(Envelope::ok("Current user", user))
}

async fn find(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Envelope> {
    let Path(val) = path?;
    let users = AuthService::new(&state).find(&val).await?;
    Ok(Envelope::ok("User list", users))
}

async fn enrol(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    payload: Result<Json<UserInput>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let user = AuthService::new(&state).enrol(&caller, &input).await?;
    Ok(Envelope::created(format!("User {} created", user.name), user))
}

async fn modify(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    payload: Result<Json<ModifyPayload<UserInput>>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(payload) = payload?;
    let id = payload.require_id()?;
    let (user, log) = AuthService::new(&state)
        .modify(&caller, id, &payload.new_data)
        .await?;
    let envelope = Envelope::ok(format!("User {} modified", user.name), user);
    Ok(logged(envelope, AuditKind::Modify, ENTITY, log))
}

async fn set_admin(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    payload: Result<Json<AdminFlagInput>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let (user, log) = AuthService::new(&state).set_admin(&caller, &input).await?;
    let envelope = Envelope::ok(format!("{} admin: {}", user.name, user.admin), user);
    Ok(logged(envelope, AuditKind::Modify, ENTITY, log))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    AdminCaller(caller): AdminCaller,
    payload: Result<Json<UserDeleteInput>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let log = AuthService::new(&state).delete(&caller, &input).await?;
    let envelope = Envelope::ok("User deleted", json!({ "id": input.id }));
    Ok(logged(envelope, AuditKind::Delete, ENTITY, log))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResetPasswordInput>, JsonRejection>,
) -> ApiResult<Envelope> {
    let Json(input) = payload?;
    let user = AuthService::new(&state).reset_password(&input).await?;
    Ok(Envelope::ok(format!("Password of {} reset", user.name), user))
}
