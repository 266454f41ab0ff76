//! Purchase orders. No stock effect; purchase invoices move `received_qty`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;

use super::{number_conflict, require_active, DocumentRepository, DocumentTable};
use crate::error::{DbError, DbResult};
use pharma_core::{
    DocumentKind, Id, OrderLine, PurchaseOrder, PurchaseOrderDraft, PurchaseOrderItem,
};

pub struct PurchaseOrders;

#[async_trait]
impl DocumentRepository for PurchaseOrders {
    type Draft = PurchaseOrderDraft;
    type Detail = PurchaseOrder;
    type Item = PurchaseOrderItem;

    const TABLE: DocumentTable = DocumentTable {
        kind: DocumentKind::PurchaseOrder,
        header: "purchase_orders",
        items: "purchase_order_items",
        item_fk: "purchase_order_id",
        date_column: "invoice_date",
        counterparty_column: "supplier_id",
        counterparty_table: "suppliers",
        select_header: r#"
            SELECT h.id, h.number, h.user_id, u.name AS user_name,
                   h.supplier_id, s.name AS supplier_name, h.total_item, h.invoice_date,
                   h.pdf_url, h.created_at, h.last_modified,
                   mu.name AS last_modified_by_user_name
            FROM purchase_orders h
            JOIN users u ON u.id = h.user_id
            JOIN suppliers s ON s.id = h.supplier_id
            LEFT JOIN users mu ON mu.id = h.last_modified_by_user_id
        "#,
        select_items: r#"
            SELECT i.id, i.medicine_id, i.unit_id, m.barcode AS medicine_barcode,
                   m.name AS medicine_name, i.order_qty, i.received_qty,
                   un.name AS unit, i.remarks
            FROM purchase_order_items i
            JOIN medicines m ON m.id = i.medicine_id
            JOIN units un ON un.id = i.unit_id
        "#,
    };

    async fn insert_header(
        conn: &mut SqliteConnection,
        draft: &PurchaseOrderDraft,
        actor: Id,
    ) -> DbResult<Id> {
        require_active(&mut *conn, "suppliers", "Supplier", draft.supplier_id).await?;
        let now = Utc::now();

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_orders (number, user_id, supplier_id, total_item, invoice_date,
                                         created_at, last_modified, last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(draft.number)
        .bind(actor)
        .bind(draft.supplier_id)
        .bind(draft.total_item)
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
        draft: &PurchaseOrderDraft,
        actor: Id,
    ) -> DbResult<()> {
        require_active(&mut *conn, "suppliers", "Supplier", draft.supplier_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET number = ?, supplier_id = ?, total_item = ?, invoice_date = ?,
                last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(draft.number)
        .bind(draft.supplier_id)
        .bind(draft.total_item)
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

    /// `received_qty` comes from the draft so a modify keeps what was
    /// already received.
    async fn insert_item(
        conn: &mut SqliteConnection,
        header_id: Id,
        line: &OrderLine,
        medicine_id: Id,
        unit_id: Id,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (purchase_order_id, medicine_id, unit_id,
                                              order_qty, received_qty, remarks)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(header_id)
        .bind(medicine_id)
        .bind(unit_id)
        .bind(line.order_qty)
        .bind(line.received_qty)
        .bind(&line.remarks)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn attach_items(detail: &mut PurchaseOrder, items: Vec<PurchaseOrderItem>) {
        detail.purchase_order_medicine_list = items;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::document::test_support::{seed, store};
    use crate::repository::test_support::database;
    use pharma_core::{DateRange, DocumentModel, ListFilter, Lookup};

    fn order(supplier: Id) -> PurchaseOrderDraft {
        serde_json::from_value(serde_json::json!({
            "number": 1,
            "supplierId": supplier,
            "totalItem": 1,
            "invoiceDate": "2024-03-01",
            "purchaseOrderMedicineList": [
                { "barcode": "BC1", "medicineName": "ACET", "orderQty": 20,
                  "receivedQty": 5, "unit": "BOX", "remarks": "urgent" }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_detail_matches_draft() {
        let (db, admin) = database().await;
        let (_, supplier, _) = seed(&db, admin).await;
        let mut session = db.begin().await.unwrap();

        let draft = order(supplier);
        let id = store::<PurchaseOrders>(session.conn(), &draft, admin).await;
        let detail = PurchaseOrders::load(session.conn(), id).await.unwrap().unwrap();

        assert_eq!(PurchaseOrderDraft::from(&detail), draft);
        assert!(detail.stock_moves().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_supplier_name() {
        let (db, admin) = database().await;
        let (_, supplier, _) = seed(&db, admin).await;
        let mut session = db.begin().await.unwrap();
        store::<PurchaseOrders>(session.conn(), &order(supplier), admin).await;

        let march = DateRange {
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        };
        let filter = ListFilter::Counterparty(Lookup::Name("sehat".into()));
        let rows = PurchaseOrders::list(session.conn(), &march, &filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].purchase_order_medicine_list[0].remarks, "urgent");
    }
}
