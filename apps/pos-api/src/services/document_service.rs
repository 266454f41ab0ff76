//! # Document Engine
//!
//! One lifecycle for the four document kinds, generic over
//! [`DocumentRepository`].
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate ──► BEGIN ──► number taken? ──► insert header                 │
//! │                              │ yes             │                        │
//! │                              ▼                 ▼                        │
//! │                          Conflict      read back by number ── miss ──►  │
//! │                                                │       absolute_delete  │
//! │                                                ▼        + Conflict      │
//! │                         items: medicine by barcode, unit upsert, insert │
//! │                                                │                        │
//! │                                                ▼                        │
//! │                      stock moves ──► after_stock(+1) ──► COMMIT         │
//! │                                                │                        │
//! │                                                ▼                        │
//! │                      render PDF ──► store path   (failure: 207)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Modify takes back the stored document's recorded effects, rewrites header
//! and items and applies the new effects, all in one transaction; only the
//! net result per medicine is checked against negative stock. Delete reverses and
//! soft-deletes. Both write the previous state to the audit log after commit.

use std::collections::HashMap;
use std::marker::PhantomData;

use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::audit::AuditKind;
use crate::error::{ApiError, ApiResult};
use crate::gate::Caller;
use crate::services::stock_service::StockKeeper;
use crate::AppState;
use pharma_core::validation::Validate;
use pharma_core::{DateRange, DocumentDraft, DocumentModel, DraftLine, Id, ListFilter, Unit};
use pharma_db::{DbError, DocumentRepository, Invoices, LookupRepository, MedicineRepository};

/// Result of a create or modify.
#[derive(Debug, Clone)]
pub struct Saved<D> {
    pub document: D,
    /// Set when the database write stands but the artifact step failed.
    pub artifact_error: Option<String>,
    /// Audit log file of a modify.
    pub log: Option<String>,
}

/// Result of a delete.
#[derive(Debug, Clone)]
pub struct Deleted {
    pub id: Id,
    pub number: i64,
    pub log: Option<String>,
}

/// The engine for one document kind.
///
/// ## Usage
/// ```rust,ignore
/// let saved = DocumentEngine::<Invoices>::new(&state).create(&caller, draft).await?;
/// ```
pub struct DocumentEngine<'a, R: DocumentRepository> {
    state: &'a AppState,
    _kind: PhantomData<R>,
}

impl<'a, R: DocumentRepository> DocumentEngine<'a, R> {
    pub fn new(state: &'a AppState) -> Self {
        DocumentEngine {
            state,
            _kind: PhantomData,
        }
    }

    fn label() -> &'static str {
        R::TABLE.kind.label()
    }

    fn duplicate(number: i64) -> ApiError {
        ApiError::conflict(format!("{} number {} already exists", Self::label(), number))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn next_number(&self) -> ApiResult<i64> {
        let mut session = self.state.db.read().await?;
        Ok(R::next_number(session.conn()).await?)
    }

    pub async fn detail(&self, id: Id) -> ApiResult<R::Detail> {
        let mut session = self.state.db.read().await?;
        let document = R::load(session.conn(), id)
            .await?
            .ok_or_else(|| DbError::not_found(Self::label(), id))?;
        Ok(self.publish(document))
    }

    pub async fn list(&self, range: &DateRange, filter: &ListFilter) -> ApiResult<Vec<R::Detail>> {
        range.validate()?;
        let mut session = self.state.db.read().await?;
        let documents = R::list(session.conn(), range, filter).await?;
        Ok(documents.into_iter().map(|d| self.publish(d)).collect())
    }

    /// Renders the artifact (if it changed) and returns its public URL.
    pub async fn print(&self, id: Id) -> ApiResult<String> {
        let document = {
            let mut session = self.state.db.read().await?;
            R::load(session.conn(), id)
                .await?
                .ok_or_else(|| DbError::not_found(Self::label(), id))?
        };

        let sheet = document.print_sheet(&self.state.config.letterhead());
        let artifact = self.state.pdf.render(R::TABLE.kind, &sheet).await?;

        if document.pdf_url() != Some(artifact.path.as_str()) {
            let mut session = self.state.db.begin().await?;
            R::update_artifact_url(session.conn(), id, Some(&artifact.path)).await?;
            session.commit().await?;
        }
        Ok(self.state.pdf.public_url(&artifact.path))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn create(&self, caller: &Caller, draft: R::Draft) -> ApiResult<Saved<R::Detail>> {
        draft.validate()?;
        let number = draft.number();

        let mut session = self.state.db.begin().await?;
        let conn = session.conn();

        if R::find_active(&mut *conn, number).await?.is_some() {
            return Err(Self::duplicate(number));
        }

        let id = R::insert_header(&mut *conn, &draft, caller.id).await?;
        match R::find_active(&mut *conn, number).await? {
            Some(found) if found == id => {}
            _ => {
                R::absolute_delete(&mut *conn, id).await?;
                return Err(Self::duplicate(number));
            }
        }

        if let Err(e) = Self::insert_items(&mut *conn, id, &draft, &HashMap::new()).await {
            R::absolute_delete(&mut *conn, id).await?;
            return Err(e);
        }

        let document = Self::load(&mut *conn, id).await?;
        StockKeeper::apply(&mut *conn, R::TABLE.kind, &document, caller.id).await?;
        R::after_stock(&mut *conn, &document, 1.0).await?;
        session.commit().await?;

        info!(kind = %R::TABLE.kind, id = id, number = number, user = %caller.name, "Document created");

        let (document, artifact_error) = self.render(document).await;
        Ok(Saved {
            document: self.publish(document),
            artifact_error,
            log: None,
        })
    }

    /// Replaces a document.
    ///
    /// ## Arguments
    /// * `force` - administrators only; lets the replacement leave a
    ///   medicine below zero
    ///
    /// The old effects are taken back and the new ones applied before any
    /// negative balance is judged, so only the net change per medicine can
    /// make a modify fail.
    pub async fn modify(
        &self,
        caller: &Caller,
        id: Id,
        draft: R::Draft,
        force: bool,
    ) -> ApiResult<Saved<R::Detail>> {
        draft.validate()?;
        Self::check_force(caller, force)?;
        let number = draft.number();

        let mut session = self.state.db.begin().await?;
        let conn = session.conn();

        let previous = Self::load(&mut *conn, id).await?;
        if let Some(other) = R::find_active(&mut *conn, number).await? {
            if other != id {
                return Err(Self::duplicate(number));
            }
        }

        let before = StockKeeper::snapshot(&mut *conn, R::TABLE.kind, id).await?;
        let referenced = Self::referenced(&mut *conn, id, &draft).await?;

        R::after_stock(&mut *conn, &previous, -1.0).await?;
        StockKeeper::reverse(&mut *conn, R::TABLE.kind, id, caller.id, true).await?;
        R::delete_items(&mut *conn, id).await?;

        R::update_header(&mut *conn, id, &draft, caller.id).await?;
        Self::insert_items(&mut *conn, id, &draft, &referenced).await?;

        let document = Self::load(&mut *conn, id).await?;
        StockKeeper::apply(&mut *conn, R::TABLE.kind, &document, caller.id).await?;
        R::after_stock(&mut *conn, &document, 1.0).await?;
        StockKeeper::settle(&mut *conn, &before, force).await?;
        session.commit().await?;

        info!(kind = %R::TABLE.kind, id = id, number = number, user = %caller.name, "Document modified");

        let log = self
            .state
            .audit
            .record(AuditKind::Modify, R::TABLE.kind.as_str(), &caller.name, id, &previous)
            .await;

        let (document, artifact_error) = self.render(document).await;
        Ok(Saved {
            document: self.publish(document),
            artifact_error,
            log,
        })
    }

    /// Soft-deletes a document and reverses its stock effects.
    pub async fn delete(&self, caller: &Caller, id: Id, force: bool) -> ApiResult<Deleted> {
        Self::check_force(caller, force)?;

        let mut session = self.state.db.begin().await?;
        let conn = session.conn();

        let previous = Self::load(&mut *conn, id).await?;
        R::after_stock(&mut *conn, &previous, -1.0).await?;
        StockKeeper::reverse(&mut *conn, R::TABLE.kind, id, caller.id, force).await?;
        R::soft_delete(&mut *conn, id, caller.id).await?;
        session.commit().await?;

        info!(kind = %R::TABLE.kind, id = id, number = previous.number(), user = %caller.name, "Document deleted");

        let log = self
            .state
            .audit
            .record(AuditKind::Delete, R::TABLE.kind.as_str(), &caller.name, id, &previous)
            .await;

        Ok(Deleted {
            id,
            number: previous.number(),
            log,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn check_force(caller: &Caller, force: bool) -> ApiResult<()> {
        if force && !caller.admin {
            return Err(crate::auth::TokenError::NotAdmin.into());
        }
        Ok(())
    }

    async fn load(conn: &mut SqliteConnection, id: Id) -> ApiResult<R::Detail> {
        R::load(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found(Self::label(), id).into())
    }

    /// Medicines the stored document already references by the draft's
    /// barcodes. Collected before its items are replaced.
    async fn referenced(
        conn: &mut SqliteConnection,
        id: Id,
        draft: &R::Draft,
    ) -> ApiResult<HashMap<String, Id>> {
        let mut found = HashMap::new();
        for line in draft.lines() {
            let barcode = line.barcode().trim();
            if found.contains_key(barcode) {
                continue;
            }
            if let Some(medicine) = R::referenced_medicine(&mut *conn, id, barcode).await? {
                found.insert(barcode.to_string(), medicine);
            }
        }
        Ok(found)
    }

    /// Resolves each line's medicine and unit and inserts it.
    ///
    /// ## Arguments
    /// * `referenced` - fallback for barcodes whose medicine has since been
    ///   soft-deleted
    async fn insert_items(
        conn: &mut SqliteConnection,
        id: Id,
        draft: &R::Draft,
        referenced: &HashMap<String, Id>,
    ) -> ApiResult<()> {
        for line in draft.lines() {
            let barcode = line.barcode().trim();
            let active = MedicineRepository::new(&mut *conn)
                .get_by_barcode(barcode)
                .await?
                .map(|m| m.id);
            let medicine = active
                .or_else(|| referenced.get(barcode).copied())
                .ok_or_else(|| DbError::not_found("Medicine", barcode))?;
            let unit = LookupRepository::<Unit>::new(&mut *conn)
                .upsert(line.unit())
                .await?;
            R::insert_item(&mut *conn, id, line, medicine, unit.id).await?;
        }
        Ok(())
    }

    /// Best-effort artifact step after commit.
    async fn render(&self, mut document: R::Detail) -> (R::Detail, Option<String>) {
        let sheet = document.print_sheet(&self.state.config.letterhead());
        let id = document.id();

        let stored = match self.state.pdf.render(R::TABLE.kind, &sheet).await {
            Ok(artifact) => self.store_path(id, &artifact.path).await.map(|_| artifact.path),
            Err(e) => Err(ApiError::from(e)),
        };

        match stored {
            Ok(path) => {
                document.set_pdf_url(Some(path));
                (document, None)
            }
            Err(e) => {
                warn!(kind = %R::TABLE.kind, id = id, error = %e, "Artifact step failed");
                (document, Some(format!("PDF could not be generated: {}", e.detail)))
            }
        }
    }

    async fn store_path(&self, id: Id, path: &str) -> ApiResult<()> {
        let mut session = self.state.db.begin().await?;
        R::update_artifact_url(session.conn(), id, Some(path)).await?;
        session.commit().await?;
        Ok(())
    }

    /// Replaces the stored artifact paths with their public URLs.
    fn publish(&self, mut document: R::Detail) -> R::Detail {
        let url = document.pdf_url().map(|path| self.state.pdf.public_url(path));
        document.set_pdf_url(url);
        for slot in document.extra_artifacts() {
            if let Some(path) = slot.take() {
                *slot = Some(self.state.pdf.public_url(&path));
            }
        }
        document
    }
}

// =============================================================================
// Till Receipt
// =============================================================================

impl DocumentEngine<'_, Invoices> {
    /// Renders and stores an invoice's till receipt.
    ///
    /// ## Returns
    /// The receipt's public URL.
    ///
    /// ## Errors
    /// * `Conflict` - a receipt was already issued for this invoice
    /// * `NotFound` - no active invoice with this id
    pub async fn print_receipt(&self, caller: &Caller, id: Id) -> ApiResult<String> {
        let invoice = {
            let mut session = self.state.db.read().await?;
            Self::load(session.conn(), id).await?
        };
        if invoice.receipt_pdf_url.is_some() {
            return Err(Self::receipt_issued(invoice.number));
        }

        let sheet = invoice.receipt_sheet(&self.state.config.letterhead());
        let artifact = self.state.pdf.render_receipt(&sheet).await?;

        let mut session = self.state.db.begin().await?;
        if !Invoices::claim_receipt(session.conn(), id, &artifact.path).await? {
            return Err(Self::receipt_issued(invoice.number));
        }
        session.commit().await?;

        info!(id = id, number = invoice.number, user = %caller.name, "Receipt issued");
        Ok(self.state.pdf.public_url(&artifact.path))
    }

    fn receipt_issued(number: i64) -> ApiError {
        ApiError::conflict(format!("Receipt for invoice number {number} has been issued"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{
        cashier, customer, history_balance, invoice, medicine, on_hand, purchase, rerate, retire,
        state, supplier,
    };
    use pharma_db::{Invoices, PurchaseInvoices};

    #[tokio::test]
    async fn test_create_applies_stock_and_renders() {
        let app = state().await;
        let bc1 = medicine(&app, "BC1", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let saved = engine
            .create(&app.admin, invoice(1, customer, &[("BC1", "TAB", 30.0), ("BC1", "BOX", 2.0)]))
            .await
            .unwrap();

        assert!(saved.artifact_error.is_none());
        assert_eq!(on_hand(&app, bc1).await, 50.0);
        assert_eq!(history_balance(&app, bc1).await, 50.0);
        let url = saved.document.pdf_url.clone().unwrap();
        assert_eq!(
            url,
            "http://localhost:19230/static/export/pdf/invoice/invoice-1-2024-03-01.pdf"
        );
        assert_eq!(engine.detail(saved.document.id).await.unwrap(), saved.document);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing() {
        let app = state().await;
        let bc1 = medicine(&app, "BC1", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let err = engine
            .create(&app.admin, invoice(1, customer, &[("BC1", "TAB", 150.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientStock);

        let err = engine
            .create(&app.admin, invoice(1, customer, &[("NOPE", "TAB", 1.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        assert_eq!(on_hand(&app, bc1).await, 100.0);
        assert_eq!(engine.next_number().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_number() {
        let app = state().await;
        medicine(&app, "BC1", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        engine.create(&app.admin, invoice(7, customer, &[("BC1", "TAB", 1.0)])).await.unwrap();
        let err = engine
            .create(&app.admin, invoice(7, customer, &[("BC1", "TAB", 1.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_modify_swaps_effects_and_audits() {
        let app = state().await;
        let a = medicine(&app, "A", 100.0).await;
        let b = medicine(&app, "B", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let saved = engine
            .create(&app.admin, invoice(1, customer, &[("A", "TAB", 10.0), ("B", "TAB", 5.0)]))
            .await
            .unwrap();
        let id = saved.document.id;

        let modified = engine
            .modify(&app.admin, id, invoice(1, customer, &[("A", "TAB", 12.0), ("B", "TAB", 5.0)]), false)
            .await
            .unwrap();

        assert_eq!(on_hand(&app, a).await, 88.0);
        assert_eq!(on_hand(&app, b).await, 95.0);
        assert_eq!(history_balance(&app, a).await, 88.0);
        assert_eq!(modified.document.medicine_lists.len(), 2);
        assert_eq!(modified.document.medicine_lists[0].qty, 12.0);

        let log = modified.log.unwrap();
        assert!(app.dir.path().join("log/modify/invoice").join(&log).exists());
    }

    #[tokio::test]
    async fn test_failed_modify_keeps_old_document() {
        let app = state().await;
        let a = medicine(&app, "A", 20.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let id = engine
            .create(&app.admin, invoice(1, customer, &[("A", "TAB", 10.0)]))
            .await
            .unwrap()
            .document
            .id;

        let err = engine
            .modify(&app.admin, id, invoice(1, customer, &[("A", "TAB", 25.0)]), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientStock);

        assert_eq!(on_hand(&app, a).await, 10.0);
        let detail = engine.detail(id).await.unwrap();
        assert_eq!(detail.medicine_lists[0].qty, 10.0);
    }

    #[tokio::test]
    async fn test_delete_restores_stock() {
        let app = state().await;
        let a = medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let id = engine
            .create(&app.admin, invoice(1, customer, &[("A", "BOX", 3.0)]))
            .await
            .unwrap()
            .document
            .id;
        assert_eq!(on_hand(&app, a).await, 70.0);

        let deleted = engine.delete(&app.admin, id, false).await.unwrap();
        assert_eq!(deleted.number, 1);
        assert!(deleted.log.is_some());
        assert_eq!(on_hand(&app, a).await, 100.0);
        assert_eq!(history_balance(&app, a).await, 100.0);
        assert_eq!(engine.detail(id).await.unwrap_err().kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_negative_reversal_needs_admin_force() {
        let app = state().await;
        let a = medicine(&app, "A", 0.0).await;
        let customer = customer(&app).await;
        let supplier = supplier(&app).await;
        let purchases = DocumentEngine::<PurchaseInvoices>::new(&app.state);
        let sales = DocumentEngine::<Invoices>::new(&app.state);

        let id = purchases
            .create(&app.admin, purchase(1, supplier, &[("A", "BOX", 5.0)]))
            .await
            .unwrap()
            .document
            .id;
        sales.create(&app.admin, invoice(1, customer, &[("A", "TAB", 30.0)])).await.unwrap();
        assert_eq!(on_hand(&app, a).await, 20.0);

        let err = purchases.delete(&app.admin, id, false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(on_hand(&app, a).await, 20.0);

        let kasir = cashier(&app).await;
        let err = purchases.delete(&kasir, id, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        purchases.delete(&app.admin, id, true).await.unwrap();
        assert_eq!(on_hand(&app, a).await, -30.0);
        assert_eq!(history_balance(&app, a).await, -30.0);
    }

    #[tokio::test]
    async fn test_delete_after_rerate_takes_back_recorded_qty() {
        let app = state().await;
        let a = medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let id = engine
            .create(&app.admin, invoice(1, customer, &[("A", "BOX", 2.0)]))
            .await
            .unwrap()
            .document
            .id;
        assert_eq!(on_hand(&app, a).await, 80.0);

        rerate(&app, a, "A", "BOX", 20.0).await;
        engine.delete(&app.admin, id, false).await.unwrap();

        assert_eq!(on_hand(&app, a).await, 100.0);
        assert_eq!(history_balance(&app, a).await, 100.0);
    }

    #[tokio::test]
    async fn test_document_outlives_its_unit_slot() {
        let app = state().await;
        let a = medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let first = engine
            .create(&app.admin, invoice(1, customer, &[("A", "BOX", 2.0)]))
            .await
            .unwrap()
            .document
            .id;
        let second = engine
            .create(&app.admin, invoice(2, customer, &[("A", "BOX", 1.0)]))
            .await
            .unwrap()
            .document
            .id;
        assert_eq!(on_hand(&app, a).await, 70.0);

        rerate(&app, a, "A", "", 0.0).await;

        // The rewritten lines must use a unit the medicine still has.
        let err = engine
            .modify(&app.admin, second, invoice(2, customer, &[("A", "BOX", 1.0)]), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadPayload);
        engine
            .modify(&app.admin, second, invoice(2, customer, &[("A", "TAB", 5.0)]), false)
            .await
            .unwrap();
        assert_eq!(on_hand(&app, a).await, 75.0);

        engine.delete(&app.admin, first, false).await.unwrap();
        assert_eq!(on_hand(&app, a).await, 95.0);
        assert_eq!(history_balance(&app, a).await, 95.0);
    }

    #[tokio::test]
    async fn test_purchase_correction_is_judged_on_net_stock() {
        let app = state().await;
        let a = medicine(&app, "A", 0.0).await;
        let customer = customer(&app).await;
        let supplier = supplier(&app).await;
        let purchases = DocumentEngine::<PurchaseInvoices>::new(&app.state);
        let sales = DocumentEngine::<Invoices>::new(&app.state);

        let id = purchases
            .create(&app.admin, purchase(1, supplier, &[("A", "BOX", 5.0)]))
            .await
            .unwrap()
            .document
            .id;
        sales.create(&app.admin, invoice(1, customer, &[("A", "TAB", 30.0)])).await.unwrap();
        assert_eq!(on_hand(&app, a).await, 20.0);

        purchases
            .modify(&app.admin, id, purchase(1, supplier, &[("A", "BOX", 6.0)]), false)
            .await
            .unwrap();
        assert_eq!(on_hand(&app, a).await, 30.0);
        assert_eq!(history_balance(&app, a).await, 30.0);

        let err = purchases
            .modify(&app.admin, id, purchase(1, supplier, &[("A", "BOX", 1.0)]), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(on_hand(&app, a).await, 30.0);
        assert_eq!(purchases.detail(id).await.unwrap().purchase_medicine_list[0].qty, 6.0);

        purchases
            .modify(&app.admin, id, purchase(1, supplier, &[("A", "BOX", 1.0)]), true)
            .await
            .unwrap();
        assert_eq!(on_hand(&app, a).await, -20.0);
        assert_eq!(history_balance(&app, a).await, -20.0);
    }

    #[tokio::test]
    async fn test_modify_keeps_lines_of_deleted_medicine() {
        let app = state().await;
        let a = medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);
        let draft = invoice(1, customer, &[("A", "TAB", 10.0)]);

        let id = engine.create(&app.admin, draft.clone()).await.unwrap().document.id;
        retire(&app, a).await;

        let modified = engine.modify(&app.admin, id, draft, false).await.unwrap();
        assert_eq!(modified.document.medicine_lists[0].medicine_id, a);
        assert_eq!(history_balance(&app, a).await, 90.0);

        // A new document cannot pick the deleted medicine up.
        let err = engine
            .create(&app.admin, invoice(2, customer, &[("A", "TAB", 1.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_receipt_is_issued_once() {
        let app = state().await;
        medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let id = engine
            .create(&app.admin, invoice(3, customer, &[("A", "TAB", 2.0)]))
            .await
            .unwrap()
            .document
            .id;

        let url = engine.print_receipt(&app.admin, id).await.unwrap();
        assert_eq!(
            url,
            "http://localhost:19230/static/export/pdf/receipt/receipt-3-2024-03-01.pdf"
        );
        assert!(app
            .state
            .pdf
            .absolute("export/pdf/receipt/receipt-3-2024-03-01.pdf")
            .exists());
        assert_eq!(engine.detail(id).await.unwrap().receipt_pdf_url, Some(url));

        let err = engine.print_receipt(&app.admin, id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.message, "Receipt for invoice number 3 has been issued");

        let err = engine.print_receipt(&app.admin, id + 1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_artifact_failure_keeps_document() {
        let app = state().await;
        let a = medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        // A file where the export directory should be.
        std::fs::write(app.dir.path().join("export"), b"").unwrap();
        let engine = DocumentEngine::<Invoices>::new(&app.state);

        let saved = engine
            .create(&app.admin, invoice(1, customer, &[("A", "TAB", 1.0)]))
            .await
            .unwrap();
        assert!(saved.artifact_error.is_some());
        assert!(saved.document.pdf_url.is_none());
        assert_eq!(on_hand(&app, a).await, 99.0);
    }

    #[tokio::test]
    async fn test_unchanged_modify_keeps_pdf_bytes() {
        let app = state().await;
        medicine(&app, "A", 100.0).await;
        let customer = customer(&app).await;
        let engine = DocumentEngine::<Invoices>::new(&app.state);
        let draft = invoice(1, customer, &[("A", "TAB", 1.0)]);

        let id = engine.create(&app.admin, draft.clone()).await.unwrap().document.id;
        let file = app.state.pdf.absolute("export/pdf/invoice/invoice-1-2024-03-01.pdf");
        let before = std::fs::read(&file).unwrap();

        engine.modify(&app.admin, id, draft, false).await.unwrap();
        assert_eq!(std::fs::read(&file).unwrap(), before);

        let url = engine.print(id).await.unwrap();
        assert!(url.ends_with("/static/export/pdf/invoice/invoice-1-2024-03-01.pdf"));
        assert_eq!(std::fs::read(&file).unwrap(), before);
    }
}
