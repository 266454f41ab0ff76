//! Login, logout and user management.
//!
//! ```text
//! login ──► read: credentials(name) ──► argon2 verify ──► issue token
//!                                                             │
//!                                                             ▼
//!                                  write: hash unchanged? ──► bind_token(user, jti)
//!                                          (any older token stops verifying)
//! ```
//!
//! The hash is verified outside the write lock; document writes never queue
//! behind a login.
//!
//! Enrolment, modification, deletion and admin changes need an
//! administrator token plus that administrator's password re-entered as
//! `adminPassword`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::AuditKind;
use crate::auth::TokenError;
use crate::error::{ApiError, ApiResult};
use crate::gate::Caller;
use crate::password::{hash_password, verify_password};
use crate::AppState;
use pharma_core::validation::{require_text, validate_password, Validate, ValidationResult};
use pharma_core::{Id, Lookup, User, UserInput};
use pharma_db::{DbError, Session};

const BAD_CREDENTIALS: &str = "Invalid name or password";

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub name: String,
    pub password: String,
}

impl Validate for LoginInput {
    fn validate(&self) -> ValidationResult<()> {
        require_text("name", &self.name)?;
        require_text("password", &self.password)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: User,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Public password reset, authenticated by an administrator's credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    pub admin_name: String,
    pub admin_password: String,
    pub name: String,
    pub new_password: String,
}

impl Validate for ResetPasswordInput {
    fn validate(&self) -> ValidationResult<()> {
        require_text("adminName", &self.admin_name)?;
        require_text("adminPassword", &self.admin_password)?;
        require_text("name", &self.name)?;
        validate_password(&self.new_password)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminFlagInput {
    pub id: Id,
    pub admin: bool,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleteInput {
    pub id: Id,
    pub admin_password: String,
}

// =============================================================================
// Service
// =============================================================================

pub struct AuthService<'a> {
    state: &'a AppState,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        AuthService { state }
    }

    /// Verifies the password and binds a fresh token to the user.
    pub async fn login(&self, input: &LoginInput) -> ApiResult<LoginResult> {
        input.validate()?;

        let credentials = {
            let mut session = self.state.db.read().await?;
            session.users().credentials(&input.name).await?
        };
        let credentials = match credentials {
            Some(c) if verify_password(&input.password, &c.password_hash) => c,
            _ => {
                warn!(name = %input.name, "Login rejected");
                return Err(ApiError::unauthorized(BAD_CREDENTIALS));
            }
        };

        let mut session = self.state.db.begin().await?;
        // Deleted or re-keyed while the hash was checked.
        match session.users().credentials_by_id(credentials.id).await? {
            Some(current) if current.password_hash == credentials.password_hash => {}
            _ => {
                warn!(name = %input.name, "Login raced a credential change");
                return Err(ApiError::unauthorized(BAD_CREDENTIALS));
            }
        }

        let (token, claims) = self.state.tokens.issue(credentials.id, credentials.admin)?;
        session.users().bind_token(credentials.id, &claims.jti).await?;
        let user = Self::user(&mut session, credentials.id).await?;
        session.commit().await?;

        info!(user_id = user.id, name = %user.name, "User logged in");
        Ok(LoginResult {
            token,
            user,
            expires_at: claims.exp,
        })
    }

    pub async fn logout(&self, caller: &Caller) -> ApiResult<()> {
        let mut session = self.state.db.begin().await?;
        session.users().clear_token(caller.id).await?;
        session.commit().await?;
        info!(user_id = caller.id, "User logged out");
        Ok(())
    }

    pub async fn current(&self, caller: &Caller) -> ApiResult<User> {
        let mut session = self.state.db.read().await?;
        Self::user(&mut session, caller.id).await
    }

    /// `all`, a numeric id or a name search.
    pub async fn find(&self, val: &str) -> ApiResult<Vec<User>> {
        let mut session = self.state.db.read().await?;
        let users = if val.eq_ignore_ascii_case("all") {
            session.users().get_all().await?
        } else {
            match Lookup::parse(val) {
                Lookup::Id(id) => vec![Self::user(&mut session, id).await?],
                Lookup::Name(name) => session.users().get_by_search_name(&name).await?,
            }
        };
        Ok(users)
    }

    /// Resets `name`'s password on the strength of an administrator's
    /// credentials. The target's token is revoked.
    pub async fn reset_password(&self, input: &ResetPasswordInput) -> ApiResult<User> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;

        let admin = session.users().credentials(&input.admin_name).await?;
        let admin = match admin {
            Some(a) if verify_password(&input.admin_password, &a.password_hash) => a,
            _ => return Err(ApiError::unauthorized(BAD_CREDENTIALS)),
        };
        if !admin.admin {
            return Err(ApiError::from(TokenError::NotAdmin).by(admin.id));
        }

        let target = session
            .users()
            .credentials(&input.name)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User {} not found", input.name.trim())))?;

        let hash = hash_password(&input.new_password)?;
        session.users().set_password(target.id, &hash, admin.id).await?;
        let user = Self::user(&mut session, target.id).await?;
        session.commit().await?;

        info!(user_id = target.id, admin = %admin.name, "Password reset");
        Ok(user)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub async fn enrol(&self, caller: &Caller, input: &UserInput) -> ApiResult<User> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;
        Self::elevate(&mut session, caller, &input.admin_password).await?;

        let hash = hash_password(&input.password)?;
        let id = session
            .users()
            .create(&input.name, &input.phone_number, &hash, input.admin, Some(caller.id))
            .await?;
        let user = Self::user(&mut session, id).await?;
        session.commit().await?;

        info!(user_id = id, name = %user.name, by = %caller.name, "User enrolled");
        Ok(user)
    }

    /// Overwrites a user; returns it with the audit file name.
    pub async fn modify(
        &self,
        caller: &Caller,
        id: Id,
        input: &UserInput,
    ) -> ApiResult<(User, Option<String>)> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;
        Self::elevate(&mut session, caller, &input.admin_password).await?;

        let previous = Self::user(&mut session, id).await?;
        let hash = hash_password(&input.password)?;
        session
            .users()
            .modify(id, &input.name, &input.phone_number, &hash, input.admin, caller.id)
            .await?;
        let user = Self::user(&mut session, id).await?;
        session.commit().await?;

        let log = self
            .state
            .audit
            .record(AuditKind::Modify, "user", &caller.name, id, &previous)
            .await;
        Ok((user, log))
    }

    pub async fn set_admin(
        &self,
        caller: &Caller,
        input: &AdminFlagInput,
    ) -> ApiResult<(User, Option<String>)> {
        let mut session = self.state.db.begin().await?;
        Self::elevate(&mut session, caller, &input.admin_password).await?;

        let previous = Self::user(&mut session, input.id).await?;
        session.users().set_admin(input.id, input.admin, caller.id).await?;
        let user = Self::user(&mut session, input.id).await?;
        session.commit().await?;

        info!(user_id = input.id, admin = input.admin, by = %caller.name, "Admin flag changed");
        let log = self
            .state
            .audit
            .record(AuditKind::Modify, "user", &caller.name, input.id, &previous)
            .await;
        Ok((user, log))
    }

    pub async fn delete(&self, caller: &Caller, input: &UserDeleteInput) -> ApiResult<Option<String>> {
        let mut session = self.state.db.begin().await?;
        Self::elevate(&mut session, caller, &input.admin_password).await?;

        let previous = Self::user(&mut session, input.id).await?;
        session.users().soft_delete(input.id, caller.id).await?;
        session.commit().await?;

        info!(user_id = input.id, by = %caller.name, "User deleted");
        Ok(self
            .state
            .audit
            .record(AuditKind::Delete, "user", &caller.name, input.id, &previous)
            .await)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Re-checks the calling administrator's own password.
    async fn elevate(session: &mut Session, caller: &Caller, admin_password: &str) -> ApiResult<()> {
        let credentials = session
            .users()
            .credentials_by_id(caller.id)
            .await?
            .ok_or_else(|| ApiError::from(TokenError::Revoked).by(caller.id))?;

        if !credentials.admin {
            return Err(ApiError::from(TokenError::NotAdmin).by(caller.id));
        }
        if !verify_password(admin_password, &credentials.password_hash) {
            return Err(ApiError::unauthorized("Admin password is incorrect").by(caller.id));
        }
        Ok(())
    }

    async fn user(session: &mut Session, id: Id) -> ApiResult<User> {
        Ok(session
            .users()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gate::resolve_caller;
    use crate::test_support::{cashier, state, ADMIN_PASSWORD};
    use axum::http::header::AUTHORIZATION;
    use axum::http::HeaderMap;

    fn login(name: &str, password: &str) -> LoginInput {
        LoginInput {
            name: name.into(),
            password: password.into(),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    fn user_input(name: &str, admin_password: &str) -> UserInput {
        UserInput {
            admin_password: admin_password.into(),
            name: name.into(),
            password: "secret".into(),
            phone_number: "0812".into(),
            admin: false,
        }
    }

    #[tokio::test]
    async fn test_second_login_revokes_first() {
        let app = state().await;
        let auth = AuthService::new(&app.state);

        let first = auth.login(&login("admin", ADMIN_PASSWORD)).await.unwrap();
        assert!(resolve_caller(&app.state, &bearer(&first.token), false).await.is_ok());

        let second = auth.login(&login("ADMIN", ADMIN_PASSWORD)).await.unwrap();
        let err = resolve_caller(&app.state, &bearer(&first.token), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert!(resolve_caller(&app.state, &bearer(&second.token), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_checks_password_outside_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::AppConfig::for_tests(dir.path());
        config.db_name = dir.path().join("pos.db").display().to_string();
        config.db_max_connections = 4;
        let state = crate::AppState::connect(config).await.unwrap();

        let mut session = state.db.begin().await.unwrap();
        let hash = hash_password(ADMIN_PASSWORD).unwrap();
        session.users().create("ADMIN", "", &hash, true, None).await.unwrap();
        session.commit().await.unwrap();

        let writer = state.db.begin().await.unwrap();
        let auth = AuthService::new(&state);
        let rejected = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            auth.login(&login("ADMIN", "nope")),
        )
        .await
        .expect("rejected login queued behind the writer");
        assert_eq!(rejected.unwrap_err().kind, ErrorKind::Unauthorized);

        drop(writer);
        assert!(auth.login(&login("ADMIN", ADMIN_PASSWORD)).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let app = state().await;
        let err = AuthService::new(&app.state)
            .login(&login("ADMIN", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.message, BAD_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_logout_revokes() {
        let app = state().await;
        let auth = AuthService::new(&app.state);
        let result = auth.login(&login("ADMIN", ADMIN_PASSWORD)).await.unwrap();

        auth.logout(&app.admin).await.unwrap();
        assert!(resolve_caller(&app.state, &bearer(&result.token), false).await.is_err());
    }

    #[tokio::test]
    async fn test_enrol_needs_admin_password() {
        let app = state().await;
        let auth = AuthService::new(&app.state);

        let err = auth
            .enrol(&app.admin, &user_input("Sari", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);

        let user = auth
            .enrol(&app.admin, &user_input("  Sari  ", ADMIN_PASSWORD))
            .await
            .unwrap();
        assert_eq!(user.name, "Sari");
        assert!(!user.admin);

        let kasir = cashier(&app).await;
        let err = auth
            .enrol(&kasir, &user_input("Dewi", "cashier-pass"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_reset_password_revokes_token() {
        let app = state().await;
        cashier(&app).await;
        let auth = AuthService::new(&app.state);
        let old = auth.login(&login("kasir", "cashier-pass")).await.unwrap();

        auth.reset_password(&ResetPasswordInput {
            admin_name: "ADMIN".into(),
            admin_password: ADMIN_PASSWORD.into(),
            name: "KASIR".into(),
            new_password: "fresh-pass".into(),
        })
        .await
        .unwrap();

        assert!(resolve_caller(&app.state, &bearer(&old.token), false).await.is_err());
        assert!(auth.login(&login("KASIR", "cashier-pass")).await.is_err());
        assert!(auth.login(&login("KASIR", "fresh-pass")).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_writes_audit() {
        let app = state().await;
        let kasir = cashier(&app).await;
        let auth = AuthService::new(&app.state);

        let log = auth
            .delete(
                &app.admin,
                &UserDeleteInput {
                    id: kasir.id,
                    admin_password: ADMIN_PASSWORD.into(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(app.dir.path().join("log/delete/user").join(log).exists());
        assert_eq!(
            auth.find(&kasir.id.to_string()).await.unwrap_err().kind,
            ErrorKind::NotFound
        );
    }
}
