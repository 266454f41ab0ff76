//! Purchase invoices. A purchase invoice may fulfil a purchase order; its
//! items then count towards the order's `receivedQty`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use tracing::{debug, warn};

use super::{number_conflict, require_active, DocumentRepository, DocumentTable};
use crate::error::{DbError, DbResult};
use crate::repository::document::PurchaseOrders;
use crate::repository::medicine::MedicineRepository;
use pharma_core::{
    DocumentKind, Id, PurchaseInvoice, PurchaseInvoiceDraft, PurchaseItem, PurchaseLine,
};

pub struct PurchaseInvoices;

#[derive(FromRow)]
struct OrderLineRow {
    id: Id,
    unit_id: Id,
}

#[async_trait]
impl DocumentRepository for PurchaseInvoices {
    type Draft = PurchaseInvoiceDraft;
    type Detail = PurchaseInvoice;
    type Item = PurchaseItem;

    const TABLE: DocumentTable = DocumentTable {
        kind: DocumentKind::PurchaseInvoice,
        header: "purchase_invoices",
        items: "purchase_invoice_items",
        item_fk: "purchase_invoice_id",
        date_column: "invoice_date",
        counterparty_column: "supplier_id",
        counterparty_table: "suppliers",
        select_header: r#"
            SELECT h.id, h.number, h.user_id, u.name AS user_name,
                   h.supplier_id, s.name AS supplier_name, h.purchase_order_number,
                   h.subtotal, h.discount, h.tax, h.total_price, h.description,
                   h.invoice_date, h.pdf_url, h.created_at, h.last_modified,
                   mu.name AS last_modified_by_user_name
            FROM purchase_invoices h
            JOIN users u ON u.id = h.user_id
            JOIN suppliers s ON s.id = h.supplier_id
            LEFT JOIN users mu ON mu.id = h.last_modified_by_user_id
        "#,
        select_items: r#"
            SELECT i.id, i.medicine_id, i.unit_id, m.barcode AS medicine_barcode,
                   m.name AS medicine_name, i.qty, un.name AS unit, i.price, i.discount,
                   i.tax, i.subtotal, i.batch_number, i.exp_date
            FROM purchase_invoice_items i
            JOIN medicines m ON m.id = i.medicine_id
            JOIN units un ON un.id = i.unit_id
        "#,
    };

    async fn insert_header(
        conn: &mut SqliteConnection,
        draft: &PurchaseInvoiceDraft,
        actor: Id,
    ) -> DbResult<Id> {
        require_active(&mut *conn, "suppliers", "Supplier", draft.supplier_id).await?;
        let now = Utc::now();

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_invoices (number, user_id, supplier_id, purchase_order_number,
                                           subtotal, discount, tax, total_price, description,
                                           invoice_date, created_at, last_modified,
                                           last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(draft.number)
        .bind(actor)
        .bind(draft.supplier_id)
        .bind(draft.purchase_order_number)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.total_price)
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
        draft: &PurchaseInvoiceDraft,
        actor: Id,
    ) -> DbResult<()> {
        require_active(&mut *conn, "suppliers", "Supplier", draft.supplier_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE purchase_invoices
            SET number = ?, supplier_id = ?, purchase_order_number = ?, subtotal = ?,
                discount = ?, tax = ?, total_price = ?, description = ?, invoice_date = ?,
                last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(draft.number)
        .bind(draft.supplier_id)
        .bind(draft.purchase_order_number)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.total_price)
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
        line: &PurchaseLine,
        medicine_id: Id,
        unit_id: Id,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_invoice_items (purchase_invoice_id, medicine_id, unit_id, qty,
                                                price, discount, tax, subtotal, batch_number,
                                                exp_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(header_id)
        .bind(medicine_id)
        .bind(unit_id)
        .bind(line.qty)
        .bind(line.price)
        .bind(line.discount)
        .bind(line.tax)
        .bind(line.subtotal)
        .bind(&line.batch_number)
        .bind(line.exp_date)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn attach_items(detail: &mut PurchaseInvoice, items: Vec<PurchaseItem>) {
        detail.purchase_medicine_list = items;
    }

    /// Moves the referenced order's `receivedQty` by each item, converted
    /// into the order line's unit.
    ///
    /// The order must exist when receiving (`sign > 0`); a reversal against
    /// an order deleted meanwhile is skipped.
    async fn after_stock(
        conn: &mut SqliteConnection,
        detail: &PurchaseInvoice,
        sign: f64,
    ) -> DbResult<()> {
        let Some(order_number) = detail.purchase_order_number else {
            return Ok(());
        };

        let Some(order_id) = PurchaseOrders::find_active(&mut *conn, order_number).await? else {
            if sign > 0.0 {
                return Err(DbError::not_found("Purchase order", order_number));
            }
            warn!(order = order_number, "Purchase order gone, receipt not reversed");
            return Ok(());
        };

        for item in &detail.purchase_medicine_list {
            let order_line = sqlx::query_as::<_, OrderLineRow>(
                r#"
                SELECT id, unit_id FROM purchase_order_items
                WHERE purchase_order_id = ? AND medicine_id = ?
                ORDER BY id
                LIMIT 1
                "#,
            )
            .bind(order_id)
            .bind(item.medicine_id)
            .fetch_optional(&mut *conn)
            .await?;

            let Some(order_line) = order_line else {
                debug!(medicine_id = item.medicine_id, "Item not on the purchase order");
                continue;
            };

            let Some(profile) = MedicineRepository::new(&mut *conn)
                .stock_profile(item.medicine_id)
                .await?
            else {
                continue;
            };

            let received = profile
                .to_first_unit(item.unit_id, &item.unit, item.qty)
                .ok()
                .and_then(|first| profile.from_first_unit(order_line.unit_id, first));

            match received {
                Some(qty) => {
                    sqlx::query(
                        "UPDATE purchase_order_items SET received_qty = received_qty + ? WHERE id = ?",
                    )
                    .bind(sign * qty)
                    .bind(order_line.id)
                    .execute(&mut *conn)
                    .await?;
                }
                None => debug!(
                    medicine_id = item.medicine_id,
                    "Unit not convertible to the order line"
                ),
            }
        }
        Ok(())
    }
}
