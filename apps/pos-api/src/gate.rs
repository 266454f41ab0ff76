//! Authorization gate.
//!
//! ```text
//! Authorization header ──► extract ──► verify (signature, expiry)
//!                                          │
//!                                          ▼
//!                 users row: active? token_id == jti? admin if required?
//!                                          │
//!                                          ▼
//!                                       Caller
//! ```
//!
//! Handlers take [`Caller`] or [`AdminCaller`] as an extractor; login,
//! password reset and health are the only routes without one.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use crate::auth::{extract_bearer_token, TokenError};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use pharma_core::Id;

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Id,
    pub name: String,
    /// Current flag from the users row, not the one in the token.
    pub admin: bool,
}

/// A [`Caller`] that must be an administrator.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub Caller);

/// Resolves the caller of a request.
///
/// ## Errors
/// * `Missing` / `Malformed` / `Expired` - token problems
/// * `Revoked` - user deleted, logged out or logged in elsewhere
/// * `NotAdmin` - `require_admin` and the user is not an administrator
pub async fn resolve_caller(
    state: &AppState,
    headers: &HeaderMap,
    require_admin: bool,
) -> ApiResult<Caller> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or(TokenError::Missing)?;

    let claims = state.tokens.verify(token)?;

    let credentials = {
        let mut session = state.db.read().await?;
        session.users().credentials_by_id(claims.sub).await?
    };

    let credentials = match credentials {
        Some(c) if c.token_id.as_deref() == Some(claims.jti.as_str()) => c,
        _ => {
            debug!(user_id = claims.sub, "Token no longer bound to user");
            return Err(ApiError::from(TokenError::Revoked).by(claims.sub));
        }
    };

    if require_admin && !credentials.admin {
        return Err(ApiError::from(TokenError::NotAdmin).by(credentials.id));
    }

    Ok(Caller {
        id: credentials.id,
        name: credentials.name,
        admin: credentials.admin,
    })
}

/// User id claimed by a request's token, valid signature required.
/// Used for error-log attribution only.
pub fn claimed_user(state: &AppState, headers: &HeaderMap) -> Option<Id> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)?;
    state.tokens.verify(token).ok().map(|claims| claims.sub)
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        resolve_caller(state, &parts.headers, false).await
    }
}

impl FromRequestParts<Arc<AppState>> for AdminCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        resolve_caller(state, &parts.headers, true).await.map(AdminCaller)
    }
}
