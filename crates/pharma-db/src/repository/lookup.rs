//! # Lookup Repository
//!
//! Units of measure and payment methods: upper-cased unique names, created
//! on first reference, hard-deleted.

use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::FromRow;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::name_search;
use pharma_core::search::{normalize_upper, search_pattern};
use pharma_core::{Id, PaymentMethod, Unit};

/// A `(id, name)` table.
pub trait LookupTable: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: &'static str;
    const ENTITY: &'static str;
}

impl LookupTable for Unit {
    const TABLE: &'static str = "units";
    const ENTITY: &'static str = "Unit";
}

impl LookupTable for PaymentMethod {
    const TABLE: &'static str = "payment_methods";
    const ENTITY: &'static str = "Payment method";
}

/// Repository over one lookup table.
///
/// ## Usage
/// ```rust,ignore
/// let unit = session.units().upsert("box").await?;   // Unit { id, name: "BOX" }
/// let cash = session.payment_methods().get_by_name("cash").await?;
/// ```
pub struct LookupRepository<'c, T: LookupTable> {
    conn: &'c mut SqliteConnection,
    _table: PhantomData<T>,
}

impl<'c, T: LookupTable> LookupRepository<'c, T> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LookupRepository {
            conn,
            _table: PhantomData,
        }
    }

    pub async fn get_by_id(&mut self, id: Id) -> DbResult<Option<T>> {
        let sql = format!("SELECT id, name FROM {} WHERE id = ?", T::TABLE);
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_name(&mut self, name: &str) -> DbResult<Option<T>> {
        let sql = format!("SELECT id, name FROM {} WHERE name = ?", T::TABLE);
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(normalize_upper(name))
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_search_name(&mut self, name: &str) -> DbResult<Vec<T>> {
        let name = normalize_upper(name);
        let sql = format!(
            "SELECT id, name FROM {} WHERE {}",
            T::TABLE,
            name_search("name")
        );
        let rows = sqlx::query_as::<_, T>(&sql)
            .bind(&name)
            .bind(search_pattern(&name))
            .bind(&name)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn get_all(&mut self) -> DbResult<Vec<T>> {
        let sql = format!("SELECT id, name FROM {} ORDER BY name", T::TABLE);
        let rows = sqlx::query_as::<_, T>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    /// Inserts a new name; a duplicate is a `UniqueViolation`.
    pub async fn create(&mut self, name: &str) -> DbResult<T> {
        let name = normalize_upper(name);
        let sql = format!("INSERT INTO {} (name) VALUES (?) RETURNING id, name", T::TABLE);
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(&name)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| DbError::from(e).with_value(name.clone()))?;
        Ok(row)
    }

    /// Returns the row for `name`, creating it on first reference.
    ///
    /// ## Returns
    /// * `Ok(T)` - existing or newly created row, name upper-cased
    pub async fn upsert(&mut self, name: &str) -> DbResult<T> {
        let name = normalize_upper(name);
        let sql = format!(
            "INSERT INTO {} (name) VALUES (?) \
             ON CONFLICT(name) DO UPDATE SET name = excluded.name \
             RETURNING id, name",
            T::TABLE
        );
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(&name)
            .fetch_one(&mut *self.conn)
            .await?;
        debug!(table = T::TABLE, name = %name, "Lookup upserted");
        Ok(row)
    }

    pub async fn modify(&mut self, id: Id, name: &str) -> DbResult<T> {
        let name = normalize_upper(name);
        let sql = format!("UPDATE {} SET name = ? WHERE id = ? RETURNING id, name", T::TABLE);
        sqlx::query_as::<_, T>(&sql)
            .bind(&name)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| DbError::from(e).with_value(name.clone()))?
            .ok_or_else(|| DbError::not_found(T::ENTITY, id))
    }

    /// Hard delete. Fails with `ForeignKeyViolation` while still referenced.
    pub async fn delete(&mut self, id: Id) -> DbResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(T::ENTITY, id));
        }
        debug!(table = T::TABLE, id = id, "Lookup deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
