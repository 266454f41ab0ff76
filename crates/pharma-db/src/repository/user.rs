//! # User Repository
//!
//! Accounts, password hashes and the bound token id.
//!
//! ## Single Session
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Live Token Per User                              │
//! │                                                                         │
//! │  login #1 ──► bind_token(id, T1)   users.token_id = T1                 │
//! │  login #2 ──► bind_token(id, T2)   users.token_id = T2                 │
//! │                                                                         │
//! │  request with T1 ──► credentials_by_id(id).token_id == T2 ≠ T1 ──► 401 │
//! │  logout          ──► clear_token(id)  users.token_id = NULL            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::name_search;
use pharma_core::search::{normalize_name, search_pattern};
use pharma_core::{Id, User};

const SELECT_USER: &str = r#"
    SELECT u.id, u.name, u.phone_number, u.admin, u.last_logged_in,
           u.created_at, u.last_modified, mu.name AS last_modified_by_user_name
    FROM users u
    LEFT JOIN users mu ON mu.id = u.last_modified_by_user_id
"#;

/// What authentication needs about a user. Never serialised.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: Id,
    pub name: String,
    pub admin: bool,
    pub password_hash: String,
    pub token_id: Option<String>,
}

/// Repository for user accounts.
pub struct UserRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UserRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        UserRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: Id) -> DbResult<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE u.id = ? AND u.deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(user)
    }

    /// Exact, case-insensitive name match.
    pub async fn get_by_name(&mut self, name: &str) -> DbResult<Option<User>> {
        let sql = format!("{SELECT_USER} WHERE lower(u.name) = lower(?) AND u.deleted_at IS NULL");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(normalize_name(name))
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(user)
    }

    pub async fn get_by_search_name(&mut self, name: &str) -> DbResult<Vec<User>> {
        let name = normalize_name(name);
        let sql = format!(
            "{SELECT_USER} WHERE u.deleted_at IS NULL AND {}",
            name_search("u.name")
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(&name)
            .bind(search_pattern(&name))
            .bind(&name)
            .fetch_all(&mut *self.conn)
            .await?;
        debug!(query = %name, count = users.len(), "User search");
        Ok(users)
    }

    pub async fn get_all(&mut self) -> DbResult<Vec<User>> {
        let sql = format!("{SELECT_USER} WHERE u.deleted_at IS NULL ORDER BY u.name");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(users)
    }

    /// Inserts a user and returns its id.
    ///
    /// ## Arguments
    /// * `password_hash` - PHC string produced by the password hasher
    /// * `actor` - enrolling administrator; `None` for the seeded first admin
    pub async fn create(
        &mut self,
        name: &str,
        phone_number: &str,
        password_hash: &str,
        admin: bool,
        actor: Option<Id>,
    ) -> DbResult<Id> {
        let name = normalize_name(name);
        let now = Utc::now();

        debug!(name = %name, admin = admin, "Creating user");

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, password_hash, phone_number, admin,
                               created_at, last_modified, last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(password_hash)
        .bind(phone_number)
        .bind(admin)
        .bind(now)
        .bind(now)
        .bind(actor)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(name.clone()))?;

        Ok(id)
    }

    /// Overwrites name, phone number, admin flag and password hash.
    pub async fn modify(
        &mut self,
        id: Id,
        name: &str,
        phone_number: &str,
        password_hash: &str,
        admin: bool,
        actor: Id,
    ) -> DbResult<()> {
        let name = normalize_name(name);
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = ?, phone_number = ?, password_hash = ?, admin = ?,
                last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&name)
        .bind(phone_number)
        .bind(password_hash)
        .bind(admin)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(name.clone()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Soft-deletes a user and drops its bound token.
    pub async fn soft_delete(&mut self, id: Id, actor: Id) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = ?, deleted_by_user_id = ?, token_id = NULL,
                last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        debug!(id = id, "User soft-deleted");
        Ok(())
    }

    pub async fn set_admin(&mut self, id: Id, admin: bool, actor: Id) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET admin = ?, last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(admin)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Replaces the password hash and revokes the bound token.
    pub async fn set_password(&mut self, id: Id, password_hash: &str, actor: Id) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, token_id = NULL,
                last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Credentials of an active user by case-insensitive name.
    pub async fn credentials(&mut self, name: &str) -> DbResult<Option<Credentials>> {
        let creds = sqlx::query_as::<_, Credentials>(
            r#"
            SELECT id, name, admin, password_hash, token_id
            FROM users
            WHERE lower(name) = lower(?) AND deleted_at IS NULL
            "#,
        )
        .bind(normalize_name(name))
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(creds)
    }

    pub async fn credentials_by_id(&mut self, id: Id) -> DbResult<Option<Credentials>> {
        let creds = sqlx::query_as::<_, Credentials>(
            r#"
            SELECT id, name, admin, password_hash, token_id
            FROM users
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(creds)
    }

    /// Binds a freshly issued token id; any previous token stops verifying.
    pub async fn bind_token(&mut self, id: Id, token_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET token_id = ?, last_logged_in = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(token_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn clear_token(&mut self, id: Id) -> DbResult<()> {
        sqlx::query("UPDATE users SET token_id = NULL WHERE id = ?")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support::database;
    use crate::DbError;

    #[tokio::test]
    async fn test_name_lookup_is_case_insensitive() {
        let (db, _) = database().await;
        let mut session = db.read().await.unwrap();

        let user = session.users().get_by_name("admin").await.unwrap().unwrap();
        assert_eq!(user.name, "ADMIN");
        assert!(user.admin);

        let found = session.users().get_by_search_name("a d m").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();

        let err = session
            .users()
            .create("Admin", "", "hash", false, Some(admin))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "Admin"));
    }

    #[tokio::test]
    async fn test_token_binding() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();

        session.users().bind_token(admin, "t1").await.unwrap();
        session.users().bind_token(admin, "t2").await.unwrap();
        let creds = session.users().credentials_by_id(admin).await.unwrap().unwrap();
        assert_eq!(creds.token_id.as_deref(), Some("t2"));

        session.users().set_password(admin, "new-hash", admin).await.unwrap();
        let creds = session.users().credentials("ADMIN").await.unwrap().unwrap();
        assert!(creds.token_id.is_none());
        assert_eq!(creds.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_soft_deleted_user_is_invisible() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();

        let kasir = session
            .users()
            .create("kasir", "0812", "hash", false, Some(admin))
            .await
            .unwrap();
        session.users().soft_delete(kasir, admin).await.unwrap();

        assert!(session.users().get_by_id(kasir).await.unwrap().is_none());
        assert!(session.users().credentials("kasir").await.unwrap().is_none());
        assert_eq!(session.users().get_all().await.unwrap().len(), 1);

        // The name is free again.
        session
            .users()
            .create("kasir", "", "hash", false, Some(admin))
            .await
            .unwrap();
    }
}
