//! # Document Repositories
//!
//! Shared storage protocol of the four document kinds.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Trait, Four Tables                               │
//! │                                                                         │
//! │  DocumentRepository                                                    │
//! │  ├── per kind:  insert_header / update_header / insert_item            │
//! │  │              attach_items / after_stock                             │
//! │  └── shared:    next_number / find_active / load / list                │
//! │                 referenced_medicine / soft_delete / absolute_delete    │
//! │                 delete_items                                           │
//! │                 update_artifact_url                                    │
//! │                                                                         │
//! │  Invoices          invoices            + invoice_items                 │
//! │  PurchaseInvoices  purchase_invoices   + purchase_invoice_items        │
//! │  PurchaseOrders    purchase_orders     + purchase_order_items          │
//! │  Productions       productions         + production_items              │
//! │                                                                         │
//! │  Header aliased `h`, items aliased `i` in every select.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All functions take the session's connection; the engine in pos-api owns
//! the transaction.

mod invoice;
mod production;
mod purchase_invoice;
mod purchase_order;

pub use invoice::Invoices;
pub use production::Productions;
pub use purchase_invoice::PurchaseInvoices;
pub use purchase_order::PurchaseOrders;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::FromRow;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharma_core::search::{normalize_name, search_pattern};
use pharma_core::{
    DateRange, DocumentDraft, DocumentKind, DocumentModel, Id, ListFilter, Lookup,
};

/// Table names and select statements of one document kind.
#[derive(Debug, Clone, Copy)]
pub struct DocumentTable {
    pub kind: DocumentKind,
    pub header: &'static str,
    pub items: &'static str,
    /// Column of the items table pointing at the header.
    pub item_fk: &'static str,
    /// Business-date column of the header.
    pub date_column: &'static str,
    pub counterparty_column: &'static str,
    pub counterparty_table: &'static str,
    /// Header select with joins, no WHERE clause.
    pub select_header: &'static str,
    /// Item select with joins, no WHERE clause.
    pub select_items: &'static str,
}

/// Storage of one document kind.
///
/// ## Usage
/// ```rust,ignore
/// let mut session = db.begin().await?;
/// let number = Invoices::next_number(session.conn()).await?;
/// let id = Invoices::insert_header(session.conn(), &draft, actor).await?;
/// ```
#[async_trait]
pub trait DocumentRepository: Send + Sync + 'static {
    type Draft: DocumentDraft + Serialize + DeserializeOwned + Clone + Send + Sync;
    type Detail: DocumentModel
        + for<'r> FromRow<'r, SqliteRow>
        + Serialize
        + Clone
        + Send
        + Sync
        + Unpin;
    type Item: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;

    const TABLE: DocumentTable;

    // =========================================================================
    // Per kind
    // =========================================================================

    /// Resolves the header's references and inserts it.
    async fn insert_header(
        conn: &mut SqliteConnection,
        draft: &Self::Draft,
        actor: Id,
    ) -> DbResult<Id>;

    /// Overwrites an active header in place.
    async fn update_header(
        conn: &mut SqliteConnection,
        id: Id,
        draft: &Self::Draft,
        actor: Id,
    ) -> DbResult<()>;

    async fn insert_item(
        conn: &mut SqliteConnection,
        header_id: Id,
        line: &<Self::Draft as DocumentDraft>::Line,
        medicine_id: Id,
        unit_id: Id,
    ) -> DbResult<()>;

    fn attach_items(detail: &mut Self::Detail, items: Vec<Self::Item>);

    /// Effects on other documents, applied with `sign = 1.0` once the stock
    /// moves are in and with `sign = -1.0` before they are reversed.
    async fn after_stock(
        _conn: &mut SqliteConnection,
        _detail: &Self::Detail,
        _sign: f64,
    ) -> DbResult<()> {
        Ok(())
    }

    // =========================================================================
    // Shared
    // =========================================================================

    /// Suggested number for a new document.
    ///
    /// ## Rules
    /// - `count + 1` while the active numbers are dense
    /// - `max + 1` once deletions have left gaps: `count + 1` could then be a
    ///   number that is still active, so the plain count is deliberately not
    ///   used
    async fn next_number(conn: &mut SqliteConnection) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*), COALESCE(MAX(number), 0) FROM {} WHERE deleted_at IS NULL",
            Self::TABLE.header
        );
        let (count, max): (i64, i64) = sqlx::query_as(&sql).fetch_one(&mut *conn).await?;
        let next = if count < max { max + 1 } else { count + 1 };
        debug!(kind = %Self::TABLE.kind, count = count, max = max, next = next, "Next number");
        Ok(next)
    }

    /// Id of the active document carrying `number`.
    async fn find_active(conn: &mut SqliteConnection, number: i64) -> DbResult<Option<Id>> {
        let sql = format!(
            "SELECT id FROM {} WHERE number = ? AND deleted_at IS NULL",
            Self::TABLE.header
        );
        let id = sqlx::query_scalar(&sql)
            .bind(number)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    async fn load_items(conn: &mut SqliteConnection, header_id: Id) -> DbResult<Vec<Self::Item>> {
        let t = Self::TABLE;
        let sql = format!("{} WHERE i.{} = ? ORDER BY i.id", t.select_items, t.item_fk);
        let items = sqlx::query_as::<_, Self::Item>(&sql)
            .bind(header_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    /// An active document with its items.
    async fn load(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self::Detail>> {
        let sql = format!(
            "{} WHERE h.id = ? AND h.deleted_at IS NULL",
            Self::TABLE.select_header
        );
        let header = sqlx::query_as::<_, Self::Detail>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match header {
            Some(mut detail) => {
                let items = Self::load_items(&mut *conn, id).await?;
                Self::attach_items(&mut detail, items);
                Ok(Some(detail))
            }
            None => Ok(None),
        }
    }

    async fn get_by_number(
        conn: &mut SqliteConnection,
        number: i64,
    ) -> DbResult<Option<Self::Detail>> {
        match Self::find_active(&mut *conn, number).await? {
            Some(id) => Self::load(&mut *conn, id).await,
            None => Ok(None),
        }
    }

    /// Active documents in a business-date range, newest first.
    ///
    /// ## Arguments
    /// * `range` - inclusive `[start, end]` business dates
    /// * `filter` - id, number, user or counterparty (id or name search)
    async fn list(
        conn: &mut SqliteConnection,
        range: &DateRange,
        filter: &ListFilter,
    ) -> DbResult<Vec<Self::Detail>> {
        let t = Self::TABLE;
        let name_match = "(lower(name) = lower(?) OR name LIKE ? ESCAPE '\\')";

        let clause = match filter {
            ListFilter::All => String::new(),
            ListFilter::Id(_) => " AND h.id = ?".to_string(),
            ListFilter::Number(_) => " AND h.number = ?".to_string(),
            ListFilter::User(Lookup::Id(_)) => " AND h.user_id = ?".to_string(),
            ListFilter::User(Lookup::Name(_)) => {
                format!(" AND h.user_id IN (SELECT id FROM users WHERE {name_match})")
            }
            ListFilter::Counterparty(Lookup::Id(_)) => {
                format!(" AND h.{} = ?", t.counterparty_column)
            }
            ListFilter::Counterparty(Lookup::Name(_)) => format!(
                " AND h.{} IN (SELECT id FROM {} WHERE {name_match})",
                t.counterparty_column, t.counterparty_table
            ),
        };

        let sql = format!(
            "{} WHERE h.deleted_at IS NULL AND h.{date} BETWEEN ? AND ?{clause} \
             ORDER BY h.{date} DESC, h.number DESC",
            t.select_header,
            date = t.date_column,
        );

        let mut query = sqlx::query_as::<_, Self::Detail>(&sql)
            .bind(range.start_date)
            .bind(range.end_date);
        query = match filter {
            ListFilter::All => query,
            ListFilter::Id(v) | ListFilter::Number(v) => query.bind(*v),
            ListFilter::User(Lookup::Id(v)) | ListFilter::Counterparty(Lookup::Id(v)) => {
                query.bind(*v)
            }
            ListFilter::User(Lookup::Name(name)) | ListFilter::Counterparty(Lookup::Name(name)) => {
                let name = normalize_name(name);
                let pattern = search_pattern(&name);
                query.bind(name).bind(pattern)
            }
        };

        let headers = query.fetch_all(&mut *conn).await?;

        let mut documents = Vec::with_capacity(headers.len());
        for mut detail in headers {
            let items = Self::load_items(&mut *conn, detail.id()).await?;
            Self::attach_items(&mut detail, items);
            documents.push(detail);
        }

        debug!(kind = %t.kind, count = documents.len(), "Documents listed");
        Ok(documents)
    }

    /// Marks the header deleted and removes its items.
    async fn soft_delete(conn: &mut SqliteConnection, id: Id, actor: Id) -> DbResult<()> {
        let t = Self::TABLE;
        let now = Utc::now();
        let sql = format!(
            "UPDATE {} SET deleted_at = ?, deleted_by_user_id = ?, \
             last_modified = ?, last_modified_by_user_id = ? \
             WHERE id = ? AND deleted_at IS NULL",
            t.header
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
            return Err(DbError::not_found(t.kind.label(), id));
        }
        Self::delete_items(&mut *conn, id).await?;
        Ok(())
    }

    /// Medicine with `barcode` on one of the document's items, soft-deleted
    /// or not.
    async fn referenced_medicine(
        conn: &mut SqliteConnection,
        header_id: Id,
        barcode: &str,
    ) -> DbResult<Option<Id>> {
        let t = Self::TABLE;
        let sql = format!(
            "SELECT m.id FROM {} i JOIN medicines m ON m.id = i.medicine_id \
             WHERE i.{} = ? AND m.barcode = ? LIMIT 1",
            t.items, t.item_fk
        );
        let id = sqlx::query_scalar(&sql)
            .bind(header_id)
            .bind(barcode.trim())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    /// Removes the header row outright; items follow by cascade.
    async fn absolute_delete(conn: &mut SqliteConnection, id: Id) -> DbResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", Self::TABLE.header);
        sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        debug!(kind = %Self::TABLE.kind, id = id, "Document removed");
        Ok(())
    }

    async fn delete_items(conn: &mut SqliteConnection, header_id: Id) -> DbResult<u64> {
        let t = Self::TABLE;
        let sql = format!("DELETE FROM {} WHERE {} = ?", t.items, t.item_fk);
        let result = sqlx::query(&sql)
            .bind(header_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Stores the artifact path (relative to the static root).
    async fn update_artifact_url(
        conn: &mut SqliteConnection,
        id: Id,
        path: Option<&str>,
    ) -> DbResult<()> {
        let sql = format!("UPDATE {} SET pdf_url = ? WHERE id = ?", Self::TABLE.header);
        let result = sqlx::query(&sql)
            .bind(path)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Self::TABLE.kind.label(), id));
        }
        Ok(())
    }
}

/// Fails with `NotFound` unless an active row `id` exists in `table`.
pub(crate) async fn require_active(
    conn: &mut SqliteConnection,
    table: &str,
    entity: &str,
    id: Id,
) -> DbResult<()> {
    let sql = format!("SELECT id FROM {table} WHERE id = ? AND deleted_at IS NULL");
    let found: Option<Id> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    found.map(|_| ()).ok_or_else(|| DbError::not_found(entity, id))
}

/// Maps a unique violation on `number` to a readable duplicate error.
pub(crate) fn number_conflict(kind: DocumentKind, number: i64) -> impl FnOnce(sqlx::Error) -> DbError {
    move |e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => {
            DbError::duplicate(format!("{} number", kind.label()), number.to_string())
        }
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::repository::test_support::medicine_input;
    use crate::Database;
    use pharma_core::NamedInput;

    /// Seeds a customer, a supplier and medicine BC1 (qty 100, TAB + BOX×10).
    pub async fn seed(db: &Database, admin: Id) -> (Id, Id, Id) {
        let mut session = db.begin().await.unwrap();
        let customer = session
            .customers()
            .create(&NamedInput { name: "Budi".into() }, admin)
            .await
            .unwrap();
        let supplier = session
            .suppliers()
            .create(
                &pharma_core::SupplierInput {
                    name: "PT Sehat".into(),
                    address: "Jl. Merdeka 1".into(),
                    company_phone_number: "021".into(),
                    contact_person_name: String::new(),
                    contact_person_number: String::new(),
                    terms: "COD".into(),
                    vendor_is_taxable: false,
                },
                admin,
            )
            .await
            .unwrap();
        let medicine = session
            .medicines()
            .create(&medicine_input("BC1", 100.0), admin)
            .await
            .unwrap();
        session.commit().await.unwrap();
        (customer, supplier, medicine)
    }

    /// Stores header + items the way the engine does, without stock effects.
    pub async fn store<R: DocumentRepository>(
        conn: &mut SqliteConnection,
        draft: &R::Draft,
        actor: Id,
    ) -> Id {
        use pharma_core::DraftLine;

        let id = R::insert_header(conn, draft, actor).await.unwrap();
        for line in draft.lines() {
            let med = crate::MedicineRepository::new(&mut *conn)
                .get_by_barcode(line.barcode())
                .await
                .unwrap()
                .unwrap();
            let unit = crate::LookupRepository::<pharma_core::Unit>::new(&mut *conn)
                .upsert(line.unit())
                .await
                .unwrap();
            R::insert_item(conn, id, line, med.id, unit.id).await.unwrap();
        }
        id
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
