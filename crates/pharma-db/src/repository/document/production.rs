//! Productions. The counterparty of a production is the produced medicine.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;

use super::{number_conflict, DocumentRepository, DocumentTable};
use crate::error::{DbError, DbResult};
use crate::repository::lookup::LookupRepository;
use crate::repository::medicine::MedicineRepository;
use pharma_core::{
    DocumentKind, Id, Production, ProductionDraft, ProductionItem, ProductionLine, Unit,
};

pub struct Productions;

/// Resolves the produced medicine and unit of a draft.
///
/// ## Arguments
/// * `current` - the production being rewritten; its produced medicine is
///   still accepted after a soft delete
///
/// ## Returns
/// `(medicine_id, unit_id)`; the unit must be one of the medicine's slots.
async fn produced(
    conn: &mut SqliteConnection,
    draft: &ProductionDraft,
    current: Option<Id>,
) -> DbResult<(Id, Id)> {
    let barcode = &draft.produced_medicine_barcode;
    let active = MedicineRepository::new(&mut *conn)
        .get_by_barcode(barcode)
        .await?
        .map(|m| m.id);
    let medicine_id = match (active, current) {
        (Some(id), _) => id,
        (None, Some(header)) => sqlx::query_scalar(
            r#"
            SELECT m.id FROM productions h
            JOIN medicines m ON m.id = h.produced_medicine_id
            WHERE h.id = ? AND m.barcode = ?
            "#,
        )
        .bind(header)
        .bind(barcode.trim())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Medicine", barcode))?,
        (None, None) => return Err(DbError::not_found("Medicine", barcode)),
    };

    let unit = LookupRepository::<Unit>::new(&mut *conn)
        .upsert(&draft.produced_unit)
        .await?;

    let profile = MedicineRepository::new(&mut *conn)
        .stock_profile(medicine_id)
        .await?
        .ok_or_else(|| DbError::not_found("Medicine", barcode))?;

    profile
        .to_first_unit(unit.id, &unit.name, draft.produced_qty)
        .map_err(|e| DbError::CheckViolation {
            message: e.to_string(),
        })?;

    Ok((medicine_id, unit.id))
}

#[async_trait]
impl DocumentRepository for Productions {
    type Draft = ProductionDraft;
    type Detail = Production;
    type Item = ProductionItem;

    const TABLE: DocumentTable = DocumentTable {
        kind: DocumentKind::Production,
        header: "productions",
        items: "production_items",
        item_fk: "production_id",
        date_column: "production_date",
        counterparty_column: "produced_medicine_id",
        counterparty_table: "medicines",
        select_header: r#"
            SELECT h.id, h.number, h.user_id, u.name AS user_name,
                   h.produced_medicine_id, pm.barcode AS produced_medicine_barcode,
                   pm.name AS produced_medicine_name, h.produced_qty,
                   h.produced_unit_id, pu.name AS produced_unit, h.production_date,
                   h.description, h.updated_to_stock, h.updated_to_account, h.total_cost,
                   h.pdf_url, h.created_at, h.last_modified,
                   mu.name AS last_modified_by_user_name
            FROM productions h
            JOIN users u ON u.id = h.user_id
            JOIN medicines pm ON pm.id = h.produced_medicine_id
            JOIN units pu ON pu.id = h.produced_unit_id
            LEFT JOIN users mu ON mu.id = h.last_modified_by_user_id
        "#,
        select_items: r#"
            SELECT i.id, i.medicine_id, i.unit_id, m.barcode AS medicine_barcode,
                   m.name AS medicine_name, i.qty, un.name AS unit, i.cost
            FROM production_items i
            JOIN medicines m ON m.id = i.medicine_id
            JOIN units un ON un.id = i.unit_id
        "#,
    };

    async fn insert_header(
        conn: &mut SqliteConnection,
        draft: &ProductionDraft,
        actor: Id,
    ) -> DbResult<Id> {
        let (medicine_id, unit_id) = produced(&mut *conn, draft, None).await?;
        let now = Utc::now();

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO productions (number, user_id, produced_medicine_id, produced_qty,
                                     produced_unit_id, production_date, description,
                                     updated_to_stock, updated_to_account, total_cost,
                                     created_at, last_modified, last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(draft.number)
        .bind(actor)
        .bind(medicine_id)
        .bind(draft.produced_qty)
        .bind(unit_id)
        .bind(draft.production_date)
        .bind(&draft.description)
        .bind(draft.updated_to_stock)
        .bind(draft.updated_to_account)
        .bind(draft.total_cost)
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
        draft: &ProductionDraft,
        actor: Id,
    ) -> DbResult<()> {
        let (medicine_id, unit_id) = produced(&mut *conn, draft, Some(id)).await?;

        let result = sqlx::query(
            r#"
            UPDATE productions
            SET number = ?, produced_medicine_id = ?, produced_qty = ?, produced_unit_id = ?,
                production_date = ?, description = ?, updated_to_stock = ?,
                updated_to_account = ?, total_cost = ?, last_modified = ?,
                last_modified_by_user_id = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(draft.number)
        .bind(medicine_id)
        .bind(draft.produced_qty)
        .bind(unit_id)
        .bind(draft.production_date)
        .bind(&draft.description)
        .bind(draft.updated_to_stock)
        .bind(draft.updated_to_account)
        .bind(draft.total_cost)
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
        line: &ProductionLine,
        medicine_id: Id,
        unit_id: Id,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO production_items (production_id, medicine_id, unit_id, qty, cost)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(header_id)
        .bind(medicine_id)
        .bind(unit_id)
        .bind(line.qty)
        .bind(line.cost)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn attach_items(detail: &mut Production, items: Vec<ProductionItem>) {
        detail.production_medicine_list = items;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::document::test_support::{seed, store};
    use crate::repository::test_support::{database, medicine_input};
    use pharma_core::{Direction, DocumentModel};

    fn production(produced_unit: &str) -> ProductionDraft {
        serde_json::from_value(serde_json::json!({
            "number": 1,
            "producedMedicineBarcode": "PUYER",
            "producedQty": 10,
            "producedUnit": produced_unit,
            "productionDate": "2024-03-04",
            "updatedToStock": true,
            "totalCost": 20000,
            "productionMedicineList": [
                { "barcode": "BC1", "medicineName": "ACET", "qty": 20, "unit": "TAB",
                  "cost": 20000 }
            ]
        }))
        .unwrap()
    }

    async fn with_puyer(db: &crate::Database, admin: Id) {
        let mut session = db.begin().await.unwrap();
        session
            .medicines()
            .create(&medicine_input("PUYER", 0.0), admin)
            .await
            .unwrap();
        session.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_detail_matches_draft() {
        let (db, admin) = database().await;
        seed(&db, admin).await;
        with_puyer(&db, admin).await;
        let mut session = db.begin().await.unwrap();

        let mut draft = production("BOX");
        draft.produced_medicine_name = "ACET".into();
        let id = store::<Productions>(session.conn(), &draft, admin).await;
        let detail = Productions::load(session.conn(), id).await.unwrap().unwrap();

        assert_eq!(ProductionDraft::from(&detail), draft);
        let moves = detail.stock_moves();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[1].direction, Direction::In);
        assert_eq!(moves[1].medicine_id, detail.produced_medicine_id);
    }

    #[tokio::test]
    async fn test_produced_unit_must_belong_to_medicine() {
        let (db, admin) = database().await;
        seed(&db, admin).await;
        with_puyer(&db, admin).await;
        let mut session = db.begin().await.unwrap();

        let err = Productions::insert_header(session.conn(), &production("BTL"), admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_unknown_produced_medicine() {
        let (db, admin) = database().await;
        seed(&db, admin).await;
        let mut session = db.begin().await.unwrap();

        let err = Productions::insert_header(session.conn(), &production("BOX"), admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Medicine"));
    }

    #[tokio::test]
    async fn test_rewrite_keeps_deleted_produced_medicine() {
        let (db, admin) = database().await;
        seed(&db, admin).await;
        with_puyer(&db, admin).await;
        let mut session = db.begin().await.unwrap();

        let id = store::<Productions>(session.conn(), &production("BOX"), admin).await;
        let puyer = Productions::load(session.conn(), id).await.unwrap().unwrap().produced_medicine_id;
        session.medicines().soft_delete(puyer, admin).await.unwrap();

        Productions::update_header(session.conn(), id, &production("TAB"), admin)
            .await
            .unwrap();
        let err = Productions::insert_header(session.conn(), &production("BOX"), admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
