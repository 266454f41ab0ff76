//! # Medicine Repository
//!
//! Catalogue rows, the on-hand quantity and the movement history.
//!
//! ## Stock Column
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    medicines.qty (first unit)                           │
//! │                                                                         │
//! │  register (opening qty) ──► history row "opening" IN                   │
//! │                                                                         │
//! │  document line ──► StockProfile::apply ──► adjust_stock(id, ±delta)    │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  UPDATE medicines SET qty = qty + ? WHERE … AND (force OR qty+?≥0)     │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                   record_history(document, ±qty)       │
//! │                                                                         │
//! │  document undo ──► document_moves ──► StockProfile::undo (recorded qty) │
//! │                                   ──► delete_history(document)          │
//! │                                                                         │
//! │  modify never writes qty: every change of on-hand has a history row.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::lookup::LookupRepository;
use crate::repository::name_search;
use pharma_core::search::{normalize_upper, search_pattern};
use pharma_core::{
    DateRange, Direction, Id, Medicine, MedicineHistory, MedicineInput, StockProfile, Unit,
    QTY_EPSILON,
};

/// History kind of the quantity a medicine is registered with.
pub const OPENING_BALANCE: &str = "opening";

const SELECT_MEDICINE: &str = r#"
    SELECT m.id, m.barcode, m.name, m.qty,
           m.first_unit_id, u1.name AS first_unit_name, m.first_subtotal,
           m.first_discount_percentage, m.first_discount_amount, m.first_price,
           m.second_unit_id, u2.name AS second_unit_name, m.second_unit_to_first_unit_ratio,
           m.second_subtotal, m.second_discount_percentage, m.second_discount_amount,
           m.second_price,
           m.third_unit_id, u3.name AS third_unit_name, m.third_unit_to_first_unit_ratio,
           m.third_subtotal, m.third_discount_percentage, m.third_discount_amount,
           m.third_price,
           m.description, m.created_at, m.last_modified,
           mu.name AS last_modified_by_user_name
    FROM medicines m
    JOIN units u1 ON u1.id = m.first_unit_id
    LEFT JOIN units u2 ON u2.id = m.second_unit_id
    LEFT JOIN units u3 ON u3.id = m.third_unit_id
    LEFT JOIN users mu ON mu.id = m.last_modified_by_user_id
"#;

#[derive(FromRow)]
struct ProfileRow {
    id: Id,
    barcode: String,
    qty: f64,
    first_unit_id: Id,
    second_unit_id: Option<Id>,
    second_unit_to_first_unit_ratio: f64,
    third_unit_id: Option<Id>,
    third_unit_to_first_unit_ratio: f64,
}

impl From<ProfileRow> for StockProfile {
    fn from(row: ProfileRow) -> Self {
        StockProfile {
            medicine_id: row.id,
            barcode: row.barcode,
            on_hand: row.qty,
            first_unit_id: row.first_unit_id,
            second_unit_id: row.second_unit_id,
            second_to_first: row.second_unit_to_first_unit_ratio,
            third_unit_id: row.third_unit_id,
            third_to_first: row.third_unit_to_first_unit_ratio,
        }
    }
}

/// One movement to record against a medicine.
#[derive(Debug, Clone)]
pub struct HistoryEntry<'a> {
    pub medicine_id: Id,
    pub document_kind: &'a str,
    pub document_id: Id,
    pub document_number: i64,
    pub direction: Direction,
    /// First-unit quantity, always positive.
    pub qty: f64,
    pub entered_qty: f64,
    pub unit_name: &'a str,
    pub business_date: NaiveDate,
}

/// A movement as it was recorded, in first-unit quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMove {
    pub medicine_id: Id,
    pub direction: Direction,
    pub qty: f64,
}

#[derive(FromRow)]
struct RecordedRow {
    medicine_id: Id,
    direction: String,
    qty: f64,
}

impl From<RecordedRow> for RecordedMove {
    fn from(row: RecordedRow) -> Self {
        RecordedMove {
            medicine_id: row.medicine_id,
            direction: if row.direction == Direction::In.as_str() {
                Direction::In
            } else {
                Direction::Out
            },
            qty: row.qty,
        }
    }
}

/// Resolved unit ids of a medicine payload.
struct UnitIds {
    first: Id,
    second: Option<Id>,
    third: Option<Id>,
}

/// Repository for medicines and their stock.
///
/// ## Usage
/// ```rust,ignore
/// let mut session = db.begin().await?;
/// let id = session.medicines().create(&input, actor).await?;
/// let after = session.medicines().adjust_stock(id, -30.0, false, actor).await?;
/// session.commit().await?;
/// ```
pub struct MedicineRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MedicineRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        MedicineRepository { conn }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&mut self, id: Id) -> DbResult<Option<Medicine>> {
        let sql = format!("{SELECT_MEDICINE} WHERE m.id = ? AND m.deleted_at IS NULL");
        let medicine = sqlx::query_as::<_, Medicine>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(medicine)
    }

    pub async fn get_by_barcode(&mut self, barcode: &str) -> DbResult<Option<Medicine>> {
        let sql = format!("{SELECT_MEDICINE} WHERE m.barcode = ? AND m.deleted_at IS NULL");
        let medicine = sqlx::query_as::<_, Medicine>(&sql)
            .bind(barcode.trim())
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(medicine)
    }

    /// Name search, exact name first.
    pub async fn get_by_search_name(&mut self, name: &str) -> DbResult<Vec<Medicine>> {
        let name = normalize_upper(name);
        let sql = format!(
            "{SELECT_MEDICINE} WHERE m.deleted_at IS NULL AND {}",
            name_search("m.name")
        );
        let medicines = sqlx::query_as::<_, Medicine>(&sql)
            .bind(&name)
            .bind(search_pattern(&name))
            .bind(&name)
            .fetch_all(&mut *self.conn)
            .await?;

        debug!(query = %name, count = medicines.len(), "Medicine search");
        Ok(medicines)
    }

    pub async fn get_all(&mut self) -> DbResult<Vec<Medicine>> {
        let sql = format!("{SELECT_MEDICINE} WHERE m.deleted_at IS NULL ORDER BY m.name");
        let medicines = sqlx::query_as::<_, Medicine>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(medicines)
    }

    /// Stock view of a medicine, soft-deleted ones included so that old
    /// documents can still be reversed.
    pub async fn stock_profile(&mut self, id: Id) -> DbResult<Option<StockProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, barcode, qty, first_unit_id, second_unit_id,
                   second_unit_to_first_unit_ratio, third_unit_id,
                   third_unit_to_first_unit_ratio
            FROM medicines
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(StockProfile::from))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    async fn resolve_units(&mut self, input: &MedicineInput) -> DbResult<UnitIds> {
        let mut units = LookupRepository::<Unit>::new(&mut *self.conn);
        let first = units.upsert(&input.first().unit).await?.id;
        let second = match input.second() {
            Some(slot) => Some(units.upsert(&slot.unit).await?.id),
            None => None,
        };
        let third = match input.third() {
            Some(slot) => Some(units.upsert(&slot.unit).await?.id),
            None => None,
        };
        Ok(UnitIds { first, second, third })
    }

    /// Registers a medicine, creating its units on first reference. A
    /// non-zero opening quantity is recorded in the history.
    ///
    /// ## Returns
    /// * `Ok(Id)` - new medicine id
    /// * `Err(DbError::UniqueViolation)` - barcode already active
    pub async fn create(&mut self, input: &MedicineInput, actor: Id) -> DbResult<Id> {
        let units = self.resolve_units(input).await?;
        let first = input.first();
        let second = input.second().unwrap_or_default();
        let third = input.third().unwrap_or_default();
        let barcode = input.barcode.trim().to_string();
        let now = Utc::now();

        debug!(barcode = %barcode, "Registering medicine");

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO medicines (
                barcode, name, qty,
                first_unit_id, first_subtotal, first_discount_percentage,
                first_discount_amount, first_price,
                second_unit_id, second_unit_to_first_unit_ratio, second_subtotal,
                second_discount_percentage, second_discount_amount, second_price,
                third_unit_id, third_unit_to_first_unit_ratio, third_subtotal,
                third_discount_percentage, third_discount_amount, third_price,
                description, created_at, last_modified, last_modified_by_user_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&barcode)
        .bind(input.normalized_name())
        .bind(input.qty)
        .bind(units.first)
        .bind(first.subtotal)
        .bind(first.discount_percentage)
        .bind(first.discount_amount)
        .bind(first.price)
        .bind(units.second)
        .bind(second.ratio)
        .bind(second.subtotal)
        .bind(second.discount_percentage)
        .bind(second.discount_amount)
        .bind(second.price)
        .bind(units.third)
        .bind(third.ratio)
        .bind(third.subtotal)
        .bind(third.discount_percentage)
        .bind(third.discount_amount)
        .bind(third.price)
        .bind(&input.description)
        .bind(now)
        .bind(now)
        .bind(actor)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(barcode.clone()))?;

        if input.qty > QTY_EPSILON {
            self.record_history(&HistoryEntry {
                medicine_id: id,
                document_kind: OPENING_BALANCE,
                document_id: id,
                document_number: 0,
                direction: Direction::In,
                qty: input.qty,
                entered_qty: input.qty,
                unit_name: &first.unit,
                business_date: now.date_naive(),
            })
            .await?;
        }

        Ok(id)
    }

    /// Overwrites everything except the on-hand quantity.
    pub async fn modify(&mut self, id: Id, input: &MedicineInput, actor: Id) -> DbResult<()> {
        let units = self.resolve_units(input).await?;
        let first = input.first();
        let second = input.second().unwrap_or_default();
        let third = input.third().unwrap_or_default();
        let barcode = input.barcode.trim().to_string();

        let result = sqlx::query(
            r#"
            UPDATE medicines SET
                barcode = ?, name = ?,
                first_unit_id = ?, first_subtotal = ?, first_discount_percentage = ?,
                first_discount_amount = ?, first_price = ?,
                second_unit_id = ?, second_unit_to_first_unit_ratio = ?, second_subtotal = ?,
                second_discount_percentage = ?, second_discount_amount = ?, second_price = ?,
                third_unit_id = ?, third_unit_to_first_unit_ratio = ?, third_subtotal = ?,
                third_discount_percentage = ?, third_discount_amount = ?, third_price = ?,
                description = ?, last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&barcode)
        .bind(input.normalized_name())
        .bind(units.first)
        .bind(first.subtotal)
        .bind(first.discount_percentage)
        .bind(first.discount_amount)
        .bind(first.price)
        .bind(units.second)
        .bind(second.ratio)
        .bind(second.subtotal)
        .bind(second.discount_percentage)
        .bind(second.discount_amount)
        .bind(second.price)
        .bind(units.third)
        .bind(third.ratio)
        .bind(third.subtotal)
        .bind(third.discount_percentage)
        .bind(third.discount_amount)
        .bind(third.price)
        .bind(&input.description)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| DbError::from(e).with_value(barcode.clone()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Medicine", id));
        }
        Ok(())
    }

    /// Soft delete. Documents keep referencing the row.
    pub async fn soft_delete(&mut self, id: Id, actor: Id) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE medicines
            SET deleted_at = ?, deleted_by_user_id = ?,
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
            return Err(DbError::not_found("Medicine", id));
        }
        Ok(())
    }

    /// Adds `delta` (first unit, signed) to on-hand in one statement.
    ///
    /// ## Returns
    /// * `Ok(Some(qty))` - the new on-hand quantity
    /// * `Ok(None)` - the medicine does not exist, or a decrease would leave
    ///   it negative and `allow_negative` is off. An increase is never refused.
    pub async fn adjust_stock(
        &mut self,
        id: Id,
        delta: f64,
        allow_negative: bool,
        actor: Id,
    ) -> DbResult<Option<f64>> {
        let qty: Option<f64> = sqlx::query_scalar(
            r#"
            UPDATE medicines
            SET qty = qty + ?, last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND (? OR ? >= 0 OR qty + ? >= ?)
            RETURNING qty
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .bind(allow_negative)
        .bind(delta)
        .bind(delta)
        .bind(-QTY_EPSILON)
        .fetch_optional(&mut *self.conn)
        .await?;

        debug!(medicine_id = id, delta = delta, on_hand = ?qty, "Stock adjusted");
        Ok(qty)
    }

    // =========================================================================
    // History
    // =========================================================================

    pub async fn record_history(&mut self, entry: &HistoryEntry<'_>) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO medicine_histories (medicine_id, document_kind, document_id,
                                            document_number, direction, qty, entered_qty,
                                            unit_name, business_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.medicine_id)
        .bind(entry.document_kind)
        .bind(entry.document_id)
        .bind(entry.document_number)
        .bind(entry.direction.as_str())
        .bind(entry.qty)
        .bind(entry.entered_qty)
        .bind(entry.unit_name)
        .bind(entry.business_date)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// History rows of one document in the order they were written.
    pub async fn document_moves(
        &mut self,
        document_kind: &str,
        document_id: Id,
    ) -> DbResult<Vec<RecordedMove>> {
        let rows = sqlx::query_as::<_, RecordedRow>(
            r#"
            SELECT medicine_id, direction, qty
            FROM medicine_histories
            WHERE document_kind = ? AND document_id = ?
            ORDER BY id
            "#,
        )
        .bind(document_kind)
        .bind(document_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(RecordedMove::from).collect())
    }

    /// Removes every history row of one document.
    pub async fn delete_history(&mut self, document_kind: &str, document_id: Id) -> DbResult<u64> {
        let result =
            sqlx::query("DELETE FROM medicine_histories WHERE document_kind = ? AND document_id = ?")
                .bind(document_kind)
                .bind(document_id)
                .execute(&mut *self.conn)
                .await?;
        Ok(result.rows_affected())
    }

    /// Movements of one medicine within a business-date range, newest first.
    pub async fn history(&mut self, id: Id, range: &DateRange) -> DbResult<Vec<MedicineHistory>> {
        let rows = sqlx::query_as::<_, MedicineHistory>(
            r#"
            SELECT id, medicine_id, document_kind, document_id, document_number, direction,
                   qty, entered_qty, unit_name, business_date, created_at
            FROM medicine_histories
            WHERE medicine_id = ? AND business_date BETWEEN ? AND ?
            ORDER BY business_date DESC, id DESC
            "#,
        )
        .bind(id)
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    /// Σ IN − Σ OUT over the whole history of a medicine.
    pub async fn history_balance(&mut self, id: Id) -> DbResult<f64> {
        let balance: f64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE direction WHEN 'IN' THEN qty ELSE -qty END), 0.0)
            FROM medicine_histories
            WHERE medicine_id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(balance)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, medicine_input as input};

    #[tokio::test]
    async fn test_create_resolves_units() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();

        let id = session.medicines().create(&input("BC1", 100.0), admin).await.unwrap();
        let med = session.medicines().get_by_barcode("BC1").await.unwrap().unwrap();
        assert_eq!(med.id, id);
        assert_eq!(med.name, "ACET");
        assert_eq!(med.first_unit_name, "TAB");
        assert_eq!(med.second_unit_name.as_deref(), Some("BOX"));
        assert!(med.third_unit_id.is_none());
        assert_eq!(med.qty, 100.0);

        assert_eq!(session.medicines().history_balance(id).await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_adjust_stock_guards_negative() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();
        let id = session.medicines().create(&input("BC1", 10.0), admin).await.unwrap();

        let mut meds = session.medicines();
        assert_eq!(meds.adjust_stock(id, -4.0, false, admin).await.unwrap(), Some(6.0));
        assert_eq!(meds.adjust_stock(id, -7.0, false, admin).await.unwrap(), None);
        assert_eq!(meds.adjust_stock(id, -7.0, true, admin).await.unwrap(), Some(-1.0));
        // Adding to a negative balance is allowed even while it stays negative.
        assert_eq!(meds.adjust_stock(id, 0.5, false, admin).await.unwrap(), Some(-0.5));
        assert_eq!(meds.adjust_stock(404, 1.0, false, admin).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_modify_keeps_stock() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();
        let id = session.medicines().create(&input("BC1", 10.0), admin).await.unwrap();

        let mut changed = input("BC1-NEW", 999.0);
        changed.third_unit = "crt".into();
        changed.third_unit_to_first_unit_ratio = 100.0;
        session.medicines().modify(id, &changed, admin).await.unwrap();

        let med = session.medicines().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(med.barcode, "BC1-NEW");
        assert_eq!(med.qty, 10.0);
        assert_eq!(med.third_unit_name.as_deref(), Some("CRT"));

        let profile = session.medicines().stock_profile(id).await.unwrap().unwrap();
        assert_eq!(profile.third_to_first, 100.0);
    }

    #[tokio::test]
    async fn test_soft_deleted_medicine_is_invisible_but_reversible() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();
        let id = session.medicines().create(&input("BC1", 10.0), admin).await.unwrap();

        session.medicines().soft_delete(id, admin).await.unwrap();
        assert!(session.medicines().get_by_id(id).await.unwrap().is_none());
        assert!(session.medicines().get_by_search_name("acet").await.unwrap().is_empty());
        assert!(session.medicines().stock_profile(id).await.unwrap().is_some());

        // The barcode is free for a new registration.
        session.medicines().create(&input("BC1", 0.0), admin).await.unwrap();
    }

    #[tokio::test]
    async fn test_history_range_and_delete() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();
        let id = session.medicines().create(&input("BC1", 0.0), admin).await.unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

        for (doc, d) in [(1, 1), (2, 15)] {
            session
                .medicines()
                .record_history(&HistoryEntry {
                    medicine_id: id,
                    document_kind: "invoice",
                    document_id: doc,
                    document_number: doc,
                    direction: Direction::Out,
                    qty: 3.0,
                    entered_qty: 3.0,
                    unit_name: "TAB",
                    business_date: day(d),
                })
                .await
                .unwrap();
        }

        let range = DateRange { start_date: day(1), end_date: day(10) };
        let rows = session.medicines().history(id, &range).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].direction, "OUT");

        let moves = session.medicines().document_moves("invoice", 2).await.unwrap();
        assert_eq!(
            moves,
            vec![RecordedMove { medicine_id: id, direction: Direction::Out, qty: 3.0 }]
        );

        assert_eq!(session.medicines().delete_history("invoice", 2).await.unwrap(), 1);
        assert_eq!(session.medicines().history_balance(id).await.unwrap(), -3.0);
    }
}
