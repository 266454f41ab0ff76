//! In-house production: components are consumed, one medicine is produced.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::print::{format_qty, Letterhead, PrintSheet};
use super::{DocumentDraft, DocumentKind, DocumentModel, DraftLine};
use crate::money::Money;
use crate::stock::{Direction, StockMove};
use crate::types::Id;
use crate::validation::{
    require_text, validate_amount, validate_line_count, validate_number, validate_quantity,
    Validate, ValidationResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionDraft {
    pub number: i64,
    pub produced_medicine_barcode: String,
    #[serde(default)]
    pub produced_medicine_name: String,
    pub produced_qty: f64,
    pub produced_unit: String,
    pub production_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    /// When false the production is recorded without touching stock.
    #[serde(default)]
    pub updated_to_stock: bool,
    #[serde(default)]
    pub updated_to_account: bool,
    #[serde(default)]
    pub total_cost: Money,
    pub production_medicine_list: Vec<ProductionLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionLine {
    #[serde(alias = "barcode")]
    pub medicine_barcode: String,
    #[serde(default)]
    pub medicine_name: String,
    pub qty: f64,
    pub unit: String,
    #[serde(default)]
    pub cost: Money,
}

impl DraftLine for ProductionLine {
    fn barcode(&self) -> &str {
        &self.medicine_barcode
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn qty(&self) -> f64 {
        self.qty
    }
}

impl DocumentDraft for ProductionDraft {
    type Line = ProductionLine;

    fn number(&self) -> i64 {
        self.number
    }

    fn business_date(&self) -> NaiveDate {
        self.production_date
    }

    fn lines(&self) -> &[ProductionLine] {
        &self.production_medicine_list
    }
}

impl Validate for ProductionDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_number(self.number)?;
        require_text("producedMedicineBarcode", &self.produced_medicine_barcode)?;
        require_text("producedUnit", &self.produced_unit)?;
        validate_quantity("producedQty", self.produced_qty)?;
        validate_amount("totalCost", self.total_cost)?;
        validate_line_count("productionMedicineList", self.production_medicine_list.len())?;

        for line in &self.production_medicine_list {
            require_text("medicineBarcode", &line.medicine_barcode)?;
            require_text("unit", &line.unit)?;
            validate_quantity("qty", line.qty)?;
            validate_amount("cost", line.cost)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Production {
    pub id: Id,
    pub number: i64,
    pub user_id: Id,
    pub user_name: String,
    pub produced_medicine_id: Id,
    pub produced_medicine_barcode: String,
    pub produced_medicine_name: String,
    pub produced_qty: f64,
    pub produced_unit_id: Id,
    pub produced_unit: String,
    pub production_date: NaiveDate,
    pub description: String,
    pub updated_to_stock: bool,
    pub updated_to_account: bool,
    pub total_cost: Money,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub production_medicine_list: Vec<ProductionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ProductionItem {
    pub id: Id,
    pub medicine_id: Id,
    pub unit_id: Id,
    pub medicine_barcode: String,
    pub medicine_name: String,
    pub qty: f64,
    pub unit: String,
    pub cost: Money,
}

impl From<&Production> for ProductionDraft {
    fn from(p: &Production) -> Self {
        ProductionDraft {
            number: p.number,
            produced_medicine_barcode: p.produced_medicine_barcode.clone(),
            produced_medicine_name: p.produced_medicine_name.clone(),
            produced_qty: p.produced_qty,
            produced_unit: p.produced_unit.clone(),
            production_date: p.production_date,
            description: p.description.clone(),
            updated_to_stock: p.updated_to_stock,
            updated_to_account: p.updated_to_account,
            total_cost: p.total_cost,
            production_medicine_list: p
                .production_medicine_list
                .iter()
                .map(|item| ProductionLine {
                    medicine_barcode: item.medicine_barcode.clone(),
                    medicine_name: item.medicine_name.clone(),
                    qty: item.qty,
                    unit: item.unit.clone(),
                    cost: item.cost,
                })
                .collect(),
        }
    }
}

impl DocumentModel for Production {
    const KIND: DocumentKind = DocumentKind::Production;

    fn id(&self) -> Id {
        self.id
    }

    fn number(&self) -> i64 {
        self.number
    }

    fn business_date(&self) -> NaiveDate {
        self.production_date
    }

    fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    fn set_pdf_url(&mut self, url: Option<String>) {
        self.pdf_url = url;
    }

    /// Components out, then the produced medicine in. Empty unless
    /// `updated_to_stock`.
    fn stock_moves(&self) -> Vec<StockMove> {
        if !self.updated_to_stock {
            return Vec::new();
        }

        let mut moves: Vec<StockMove> = self
            .production_medicine_list
            .iter()
            .map(|item| {
                StockMove::new(item.medicine_id, item.unit_id, &item.unit, item.qty, Direction::Out)
            })
            .collect();
        moves.push(StockMove::new(
            self.produced_medicine_id,
            self.produced_unit_id,
            &self.produced_unit,
            self.produced_qty,
            Direction::In,
        ));
        moves
    }

    fn print_sheet(&self, letterhead: &Letterhead) -> PrintSheet {
        let mut sheet =
            PrintSheet::new("PRODUCTION", letterhead, self.number, self.production_date)
                .party(
                    "Produced",
                    format!(
                        "{} ({}) {} {}",
                        self.produced_medicine_name,
                        self.produced_medicine_barcode,
                        format_qty(self.produced_qty),
                        self.produced_unit
                    ),
                )
                .party("Produced by", &self.user_name)
                .party("Stock updated", if self.updated_to_stock { "YES" } else { "NO" })
                .columns(&["No", "Component", "Qty", "Unit", "Cost"]);

        sheet.rows = self
            .production_medicine_list
            .iter()
            .enumerate()
            .map(|(i, item)| {
                vec![
                    (i + 1).to_string(),
                    item.medicine_name.clone(),
                    format_qty(item.qty),
                    item.unit.clone(),
                    item.cost.grouped(),
                ]
            })
            .collect();

        sheet
            .total("Total cost", self.total_cost.grouped())
            .notes(&self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production(updated_to_stock: bool) -> Production {
        let now = Utc::now();
        Production {
            id: 1,
            number: 1,
            user_id: 1,
            user_name: "ADMIN".into(),
            produced_medicine_id: 10,
            produced_medicine_barcode: "PUYER".into(),
            produced_medicine_name: "PUYER BATUK".into(),
            produced_qty: 10.0,
            produced_unit_id: 3,
            produced_unit: "BKS".into(),
            production_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: String::new(),
            updated_to_stock,
            updated_to_account: false,
            total_cost: Money::from_major(5000),
            pdf_url: None,
            created_at: now,
            last_modified: now,
            last_modified_by_user_name: None,
            production_medicine_list: vec![ProductionItem {
                id: 1,
                medicine_id: 4,
                unit_id: 1,
                medicine_barcode: "BC1".into(),
                medicine_name: "ACET".into(),
                qty: 20.0,
                unit: "TAB".into(),
                cost: Money::from_major(5000),
            }],
        }
    }

    #[test]
    fn test_moves_follow_stock_flag() {
        assert!(production(false).stock_moves().is_empty());

        let moves = production(true).stock_moves();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].direction, Direction::Out);
        assert_eq!(moves[0].medicine_id, 4);
        assert_eq!(moves[1].direction, Direction::In);
        assert_eq!(moves[1].medicine_id, 10);
        assert_eq!(moves[1].qty, 10.0);
    }

    #[test]
    fn test_draft_round_trip() {
        let p = production(true);
        let draft = ProductionDraft::from(&p);
        assert!(draft.validate().is_ok());
        assert_eq!(draft.production_medicine_list.len(), 1);
        assert!(draft.updated_to_stock);
    }
}
