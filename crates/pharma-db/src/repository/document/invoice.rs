//! Sales invoices.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;

use super::{number_conflict, require_active, DocumentRepository, DocumentTable};
use crate::error::{DbError, DbResult};
use crate::repository::lookup::LookupRepository;
use pharma_core::{DocumentKind, Id, Invoice, InvoiceDraft, InvoiceItem, InvoiceLine, PaymentMethod};

pub struct Invoices;

impl Invoices {
    /// Stores the till receipt path unless one was issued already.
    ///
    /// ## Returns
    /// * `Ok(true)` - the path was stored
    /// * `Ok(false)` - the invoice already has a receipt
    pub async fn claim_receipt(conn: &mut SqliteConnection, id: Id, path: &str) -> DbResult<bool> {
        require_active(&mut *conn, "invoices", Self::TABLE.kind.label(), id).await?;
        let result = sqlx::query(
            "UPDATE invoices SET receipt_pdf_url = ? \
             WHERE id = ? AND deleted_at IS NULL AND receipt_pdf_url IS NULL",
        )
        .bind(path)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl DocumentRepository for Invoices {
    type Draft = InvoiceDraft;
    type Detail = Invoice;
    type Item = InvoiceItem;

    const TABLE: DocumentTable = DocumentTable {
        kind: DocumentKind::Invoice,
        header: "invoices",
        items: "invoice_items",
        item_fk: "invoice_id",
        date_column: "invoice_date",
        counterparty_column: "customer_id",
        counterparty_table: "customers",
        select_header: r#"
            SELECT h.id, h.number, h.user_id, u.name AS user_name,
                   h.customer_id, c.name AS customer_name,
                   h.subtotal, h.discount_percentage, h.discount_amount,
                   h.tax_percentage, h.tax_amount, h.total_price, h.paid_amount,
                   h.change_amount, h.payment_method_id, pm.name AS payment_method_name,
                   h.description, h.invoice_date, h.pdf_url, h.receipt_pdf_url,
                   h.created_at, h.last_modified,
                   mu.name AS last_modified_by_user_name
            FROM invoices h
            JOIN users u ON u.id = h.user_id
            JOIN customers c ON c.id = h.customer_id
            JOIN payment_methods pm ON pm.id = h.payment_method_id
            LEFT JOIN users mu ON mu.id = h.last_modified_by_user_id
        "#,
        select_items: r#"
            SELECT i.id, i.medicine_id, i.unit_id, m.barcode AS medicine_barcode,
                   m.name AS medicine_name, i.qty, un.name AS unit, i.price,
                   i.discount_percentage, i.discount_amount, i.subtotal
            FROM invoice_items i
            JOIN medicines m ON m.id = i.medicine_id
            JOIN units un ON un.id = i.unit_id
        "#,
    };

    async fn insert_header(
        conn: &mut SqliteConnection,
        draft: &InvoiceDraft,
        actor: Id,
    ) -> DbResult<Id> {
        require_active(&mut *conn, "customers", "Customer", draft.customer_id).await?;
        let payment = LookupRepository::<PaymentMethod>::new(&mut *conn)
            .upsert(&draft.payment_method_name)
            .await?;
        let now = Utc::now();

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO invoices (number, user_id, customer_id, subtotal, discount_percentage,
                                  discount_amount, tax_percentage, tax_amount, total_price,
                                  paid_amount, change_amount, payment_method_id, description,
                                  invoice_date, created_at, last_modified,
                                  last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(draft.number)
        .bind(actor)
        .bind(draft.customer_id)
        .bind(draft.subtotal)
        .bind(draft.discount_percentage)
        .bind(draft.discount_amount)
        .bind(draft.tax_percentage)
        .bind(draft.tax_amount)
        .bind(draft.total_price)
        .bind(draft.paid_amount)
        .bind(draft.change_amount)
        .bind(payment.id)
        .bind(&draft.description)
        .bind(draft.invoice_date)
        .bind(now)
        .bind(now)
        .bind(actor)
        .fetch_one(&mut *conn)
        .await
        .map_err(number_conflict(Self::TABLE.kind, draft.number))?;

        Ok(id)
    }

    async fn update_header(
        conn: &mut SqliteConnection,
        id: Id,
        draft: &InvoiceDraft,
        actor: Id,
    ) -> DbResult<()> {
        require_active(&mut *conn, "customers", "Customer", draft.customer_id).await?;
        let payment = LookupRepository::<PaymentMethod>::new(&mut *conn)
            .upsert(&draft.payment_method_name)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET number = ?, customer_id = ?, subtotal = ?, discount_percentage = ?,
                discount_amount = ?, tax_percentage = ?, tax_amount = ?, total_price = ?,
                paid_amount = ?, change_amount = ?, payment_method_id = ?, description = ?,
                invoice_date = ?, last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(draft.number)
        .bind(draft.customer_id)
        .bind(draft.subtotal)
        .bind(draft.discount_percentage)
        .bind(draft.discount_amount)
        .bind(draft.tax_percentage)
        .bind(draft.tax_amount)
        .bind(draft.total_price)
        .bind(draft.paid_amount)
        .bind(draft.change_amount)
        .bind(payment.id)
        .bind(&draft.description)
        .bind(draft.invoice_date)
        .bind(Utc::now())
        .bind(actor)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(number_conflict(Self::TABLE.kind, draft.number))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Self::TABLE.kind.label(), id));
        }
        Ok(())
    }

    async fn insert_item(
        conn: &mut SqliteConnection,
        header_id: Id,
        line: &InvoiceLine,
        medicine_id: Id,
        unit_id: Id,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (invoice_id, medicine_id, unit_id, qty, price,
                                       discount_percentage, discount_amount, subtotal)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(header_id)
        .bind(medicine_id)
        .bind(unit_id)
        .bind(line.qty)
        .bind(line.price)
        .bind(line.discount_percentage)
        .bind(line.discount_amount)
        .bind(line.subtotal)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn attach_items(detail: &mut Invoice, items: Vec<InvoiceItem>) {
        detail.medicine_lists = items;
    }
}
