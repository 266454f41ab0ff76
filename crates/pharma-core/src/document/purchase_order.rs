//! Purchase order. Carries no stock effect; `receivedQty` grows as purchase
//! invoices referencing the order are recorded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::print::{format_qty, Letterhead, PrintSheet};
use super::{DocumentDraft, DocumentKind, DocumentModel, DraftLine};
use crate::error::ValidationError;
use crate::stock::StockMove;
use crate::types::Id;
use crate::validation::{
    require_text, validate_line_count, validate_number, validate_quantity, Validate,
    ValidationResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderDraft {
    pub number: i64,
    pub supplier_id: Id,
    #[serde(default)]
    pub total_item: i64,
    pub invoice_date: NaiveDate,
    pub purchase_order_medicine_list: Vec<OrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(alias = "barcode")]
    pub medicine_barcode: String,
    #[serde(default)]
    pub medicine_name: String,
    pub order_qty: f64,
    #[serde(default)]
    pub received_qty: f64,
    pub unit: String,
    #[serde(default)]
    pub remarks: String,
}

impl DraftLine for OrderLine {
    fn barcode(&self) -> &str {
        &self.medicine_barcode
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn qty(&self) -> f64 {
        self.order_qty
    }
}

impl DocumentDraft for PurchaseOrderDraft {
    type Line = OrderLine;

    fn number(&self) -> i64 {
        self.number
    }

    fn business_date(&self) -> NaiveDate {
        self.invoice_date
    }

    fn lines(&self) -> &[OrderLine] {
        &self.purchase_order_medicine_list
    }
}

impl Validate for PurchaseOrderDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_number(self.number)?;
        if self.supplier_id <= 0 {
            return Err(ValidationError::required("supplierId"));
        }
        if self.total_item < 0 {
            return Err(ValidationError::Negative {
                field: "totalItem".to_string(),
            });
        }
        validate_line_count(
            "purchaseOrderMedicineList",
            self.purchase_order_medicine_list.len(),
        )?;

        for line in &self.purchase_order_medicine_list {
            require_text("medicineBarcode", &line.medicine_barcode)?;
            require_text("unit", &line.unit)?;
            validate_quantity("orderQty", line.order_qty)?;
            if !line.received_qty.is_finite() || line.received_qty < 0.0 {
                return Err(ValidationError::Negative {
                    field: "receivedQty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Id,
    pub number: i64,
    pub user_id: Id,
    pub user_name: String,
    pub supplier_id: Id,
    pub supplier_name: String,
    pub total_item: i64,
    pub invoice_date: NaiveDate,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub purchase_order_medicine_list: Vec<PurchaseOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderItem {
    pub id: Id,
    pub medicine_id: Id,
    pub unit_id: Id,
    pub medicine_barcode: String,
    pub medicine_name: String,
    pub order_qty: f64,
    pub received_qty: f64,
    pub unit: String,
    pub remarks: String,
}

impl From<&PurchaseOrder> for PurchaseOrderDraft {
    fn from(po: &PurchaseOrder) -> Self {
        PurchaseOrderDraft {
            number: po.number,
            supplier_id: po.supplier_id,
            total_item: po.total_item,
            invoice_date: po.invoice_date,
            purchase_order_medicine_list: po
                .purchase_order_medicine_list
                .iter()
                .map(|item| OrderLine {
                    medicine_barcode: item.medicine_barcode.clone(),
                    medicine_name: item.medicine_name.clone(),
                    order_qty: item.order_qty,
                    received_qty: item.received_qty,
                    unit: item.unit.clone(),
                    remarks: item.remarks.clone(),
                })
                .collect(),
        }
    }
}

impl DocumentModel for PurchaseOrder {
    const KIND: DocumentKind = DocumentKind::PurchaseOrder;

    fn id(&self) -> Id {
        self.id
    }

    fn number(&self) -> i64 {
        self.number
    }

    fn business_date(&self) -> NaiveDate {
        self.invoice_date
    }

    fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref()
    }

    fn set_pdf_url(&mut self, url: Option<String>) {
        self.pdf_url = url;
    }

    fn stock_moves(&self) -> Vec<StockMove> {
        Vec::new()
    }

    fn print_sheet(&self, letterhead: &Letterhead) -> PrintSheet {
        let mut sheet = PrintSheet::new("PURCHASE ORDER", letterhead, self.number, self.invoice_date)
            .party("Supplier", &self.supplier_name)
            .party("Ordered by", &self.user_name)
            .columns(&["No", "Item", "Qty", "Unit", "Remarks"]);

        // receivedQty is left off the sheet.
        sheet.rows = self
            .purchase_order_medicine_list
            .iter()
            .enumerate()
            .map(|(i, item)| {
                vec![
                    (i + 1).to_string(),
                    item.medicine_name.clone(),
                    format_qty(item.order_qty),
                    item.unit.clone(),
                    item.remarks.clone(),
                ]
            })
            .collect();

        sheet.total("Total item", self.total_item.to_string())
    }
}
