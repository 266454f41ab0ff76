//! # Party Repositories
//!
//! Customers, doctors, patients and suppliers. All four are soft-deleted and
//! looked up case-insensitively by name.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::FromRow;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::name_search;
use pharma_core::search::{normalize_name, search_pattern};
use pharma_core::{Customer, Doctor, Id, NamedInput, Patient, PatientInput, Supplier, SupplierInput};

/// Soft-deletes a row of `table`, failing with `NotFound` when it is absent
/// or already deleted.
async fn soft_delete_row(
    conn: &mut SqliteConnection,
    table: &str,
    entity: &str,
    id: Id,
    actor: Id,
) -> DbResult<()> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE {table} SET deleted_at = ?, deleted_by_user_id = ?, \
         last_modified = ?, last_modified_by_user_id = ? \
         WHERE id = ? AND deleted_at IS NULL"
    );
    let result = sqlx::query(&sql)
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(entity, id));
    }
    debug!(table = table, id = id, "Soft-deleted");
    Ok(())
}

// =============================================================================
// Customer / Doctor
// =============================================================================

/// A party identified by its name alone.
pub trait NamedParty: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    const TABLE: &'static str;
    const ENTITY: &'static str;
}

impl NamedParty for Customer {
    const TABLE: &'static str = "customers";
    const ENTITY: &'static str = "Customer";
}

impl NamedParty for Doctor {
    const TABLE: &'static str = "doctors";
    const ENTITY: &'static str = "Doctor";
}

pub struct NamedPartyRepository<'c, T: NamedParty> {
    conn: &'c mut SqliteConnection,
    _party: PhantomData<T>,
}

impl<'c, T: NamedParty> NamedPartyRepository<'c, T> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        NamedPartyRepository {
            conn,
            _party: PhantomData,
        }
    }

    fn select() -> String {
        format!(
            "SELECT t.id, t.name, t.created_at, t.last_modified, \
             mu.name AS last_modified_by_user_name \
             FROM {} t LEFT JOIN users mu ON mu.id = t.last_modified_by_user_id",
            T::TABLE
        )
    }

    pub async fn get_by_id(&mut self, id: Id) -> DbResult<Option<T>> {
        let sql = format!("{} WHERE t.id = ? AND t.deleted_at IS NULL", Self::select());
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_name(&mut self, name: &str) -> DbResult<Option<T>> {
        let sql = format!(
            "{} WHERE lower(t.name) = lower(?) AND t.deleted_at IS NULL",
            Self::select()
        );
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(normalize_name(name))
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_search_name(&mut self, name: &str) -> DbResult<Vec<T>> {
        let name = normalize_name(name);
        let sql = format!(
            "{} WHERE t.deleted_at IS NULL AND {}",
            Self::select(),
            name_search("t.name")
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
        let sql = format!("{} WHERE t.deleted_at IS NULL ORDER BY t.name", Self::select());
        let rows = sqlx::query_as::<_, T>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn create(&mut self, input: &NamedInput, actor: Id) -> DbResult<Id> {
        let name = input.normalized();
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {} (name, created_at, last_modified, last_modified_by_user_id) \
             VALUES (?, ?, ?, ?) RETURNING id",
            T::TABLE
        );
        let id: Id = sqlx::query_scalar(&sql)
            .bind(&name)
            .bind(now)
            .bind(now)
            .bind(actor)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| DbError::from(e).with_value(name.clone()))?;

        debug!(table = T::TABLE, id = id, name = %name, "Party created");
        Ok(id)
    }

    pub async fn modify(&mut self, id: Id, input: &NamedInput, actor: Id) -> DbResult<()> {
        let name = input.normalized();
        let sql = format!(
            "UPDATE {} SET name = ?, last_modified = ?, last_modified_by_user_id = ? \
             WHERE id = ? AND deleted_at IS NULL",
            T::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(&name)
            .bind(Utc::now())
            .bind(actor)
            .bind(id)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DbError::from(e).with_value(name.clone()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(T::ENTITY, id));
        }
        Ok(())
    }

    pub async fn soft_delete(&mut self, id: Id, actor: Id) -> DbResult<()> {
        soft_delete_row(&mut *self.conn, T::TABLE, T::ENTITY, id, actor).await
    }
}

// =============================================================================
// Patient
// =============================================================================

const SELECT_PATIENT: &str = r#"
    SELECT p.id, p.name, p.age, p.created_at, p.last_modified,
           mu.name AS last_modified_by_user_name
    FROM patients p
    LEFT JOIN users mu ON mu.id = p.last_modified_by_user_id
"#;

/// Patients, unique by (name, age).
pub struct PatientRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PatientRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PatientRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: Id) -> DbResult<Option<Patient>> {
        let sql = format!("{SELECT_PATIENT} WHERE p.id = ? AND p.deleted_at IS NULL");
        let row = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_name_and_age(&mut self, name: &str, age: i64) -> DbResult<Option<Patient>> {
        let sql = format!(
            "{SELECT_PATIENT} WHERE lower(p.name) = lower(?) AND p.age = ? AND p.deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, Patient>(&sql)
            .bind(normalize_name(name))
            .bind(age)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_search_name(&mut self, name: &str) -> DbResult<Vec<Patient>> {
        let name = normalize_name(name);
        let sql = format!(
            "{SELECT_PATIENT} WHERE p.deleted_at IS NULL AND {}",
            name_search("p.name")
        );
        let rows = sqlx::query_as::<_, Patient>(&sql)
            .bind(&name)
            .bind(search_pattern(&name))
            .bind(&name)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn get_all(&mut self) -> DbResult<Vec<Patient>> {
        let sql = format!("{SELECT_PATIENT} WHERE p.deleted_at IS NULL ORDER BY p.name, p.age");
        let rows = sqlx::query_as::<_, Patient>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn create(&mut self, input: &PatientInput, actor: Id) -> DbResult<Id> {
        let name = normalize_name(&input.name);
        let now = Utc::now();
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO patients (name, age, created_at, last_modified, last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(input.age)
        .bind(now)
        .bind(now)
        .bind(actor)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(format!("{name} ({})", input.age)))?;

        debug!(id = id, name = %name, "Patient created");
        Ok(id)
    }

    pub async fn modify(&mut self, id: Id, input: &PatientInput, actor: Id) -> DbResult<()> {
        let name = normalize_name(&input.name);
        let result = sqlx::query(
            r#"
            UPDATE patients
            SET name = ?, age = ?, last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&name)
        .bind(input.age)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(format!("{name} ({})", input.age)))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Patient", id));
        }
        Ok(())
    }

    pub async fn soft_delete(&mut self, id: Id, actor: Id) -> DbResult<()> {
        soft_delete_row(&mut *self.conn, "patients", "Patient", id, actor).await
    }
}

// =============================================================================
// Supplier
// =============================================================================

const SELECT_SUPPLIER: &str = r#"
    SELECT s.id, s.name, s.address, s.company_phone_number, s.contact_person_name,
           s.contact_person_number, s.terms, s.vendor_is_taxable,
           s.created_at, s.last_modified, mu.name AS last_modified_by_user_name
    FROM suppliers s
    LEFT JOIN users mu ON mu.id = s.last_modified_by_user_id
"#;

pub struct SupplierRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SupplierRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SupplierRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: Id) -> DbResult<Option<Supplier>> {
        let sql = format!("{SELECT_SUPPLIER} WHERE s.id = ? AND s.deleted_at IS NULL");
        let row = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_name(&mut self, name: &str) -> DbResult<Option<Supplier>> {
        let sql =
            format!("{SELECT_SUPPLIER} WHERE lower(s.name) = lower(?) AND s.deleted_at IS NULL");
        let row = sqlx::query_as::<_, Supplier>(&sql)
            .bind(normalize_name(name))
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row)
    }

    pub async fn get_by_search_name(&mut self, name: &str) -> DbResult<Vec<Supplier>> {
        let name = normalize_name(name);
        let sql = format!(
            "{SELECT_SUPPLIER} WHERE s.deleted_at IS NULL AND {}",
            name_search("s.name")
        );
        let rows = sqlx::query_as::<_, Supplier>(&sql)
            .bind(&name)
            .bind(search_pattern(&name))
            .bind(&name)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn get_all(&mut self) -> DbResult<Vec<Supplier>> {
        let sql = format!("{SELECT_SUPPLIER} WHERE s.deleted_at IS NULL ORDER BY s.name");
        let rows = sqlx::query_as::<_, Supplier>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }

    pub async fn create(&mut self, input: &SupplierInput, actor: Id) -> DbResult<Id> {
        let name = normalize_name(&input.name);
        let now = Utc::now();
        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO suppliers (name, address, company_phone_number, contact_person_name,
                                   contact_person_number, terms, vendor_is_taxable,
                                   created_at, last_modified, last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(&input.address)
        .bind(&input.company_phone_number)
        .bind(&input.contact_person_name)
        .bind(&input.contact_person_number)
        .bind(&input.terms)
        .bind(input.vendor_is_taxable)
        .bind(now)
        .bind(now)
        .bind(actor)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(name.clone()))?;

        debug!(id = id, name = %name, "Supplier created");
        Ok(id)
    }

    pub async fn modify(&mut self, id: Id, input: &SupplierInput, actor: Id) -> DbResult<()> {
        let name = normalize_name(&input.name);
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = ?, address = ?, company_phone_number = ?, contact_person_name = ?,
                contact_person_number = ?, terms = ?, vendor_is_taxable = ?,
                last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&name)
        .bind(&input.address)
        .bind(&input.company_phone_number)
        .bind(&input.contact_person_name)
        .bind(&input.contact_person_number)
        .bind(&input.terms)
        .bind(input.vendor_is_taxable)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(name.clone()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }

    pub async fn soft_delete(&mut self, id: Id, actor: Id) -> DbResult<()> {
        soft_delete_row(&mut *self.conn, "suppliers", "Supplier", id, actor).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
