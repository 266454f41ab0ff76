//! Purchase invoice (goods received from a supplier).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::print::{format_qty, Letterhead, PrintSheet};
use super::{DocumentDraft, DocumentKind, DocumentModel, DraftLine};
use crate::error::ValidationError;
use crate::money::Money;
use crate::stock::{Direction, StockMove};
use crate::types::Id;
use crate::validation::{
    require_text, validate_amount, validate_line_count, validate_number, validate_quantity,
    Validate, ValidationResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoiceDraft {
    pub number: i64,
    pub supplier_id: Id,
    /// Purchase order this delivery fulfils, if any.
    #[serde(default)]
    pub purchase_order_number: Option<i64>,
    pub subtotal: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    pub total_price: Money,
    #[serde(default)]
    pub description: String,
    pub invoice_date: NaiveDate,
    pub purchase_medicine_list: Vec<PurchaseLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLine {
    #[serde(alias = "barcode")]
    pub medicine_barcode: String,
    #[serde(default)]
    pub medicine_name: String,
    pub qty: f64,
    pub unit: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub subtotal: Money,
    #[serde(default)]
    pub batch_number: String,
    #[serde(default)]
    pub exp_date: Option<NaiveDate>,
}

impl DraftLine for PurchaseLine {
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

impl DocumentDraft for PurchaseInvoiceDraft {
    type Line = PurchaseLine;

    fn number(&self) -> i64 {
        self.number
    }

    fn business_date(&self) -> NaiveDate {
        self.invoice_date
    }

    fn lines(&self) -> &[PurchaseLine] {
        &self.purchase_medicine_list
    }
}

impl Validate for PurchaseInvoiceDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_number(self.number)?;
        if self.supplier_id <= 0 {
            return Err(ValidationError::required("supplierId"));
        }
        if let Some(po) = self.purchase_order_number {
            if po <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "purchaseOrderNumber".to_string(),
                });
            }
        }
        validate_amount("subtotal", self.subtotal)?;
        validate_amount("discount", self.discount)?;
        validate_amount("tax", self.tax)?;
        validate_amount("totalPrice", self.total_price)?;
        validate_line_count("purchaseMedicineList", self.purchase_medicine_list.len())?;

        for line in &self.purchase_medicine_list {
            require_text("medicineBarcode", &line.medicine_barcode)?;
            require_text("unit", &line.unit)?;
            validate_quantity("qty", line.qty)?;
            validate_amount("price", line.price)?;
            validate_amount("discount", line.discount)?;
            validate_amount("tax", line.tax)?;
            validate_amount("subtotal", line.subtotal)?;
        }
        Ok(())
    }
}

/// A stored purchase invoice with joined names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInvoice {
    pub id: Id,
    pub number: i64,
    pub user_id: Id,
    pub user_name: String,
    pub supplier_id: Id,
    pub supplier_name: String,
    pub purchase_order_number: Option<i64>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total_price: Money,
    pub description: String,
    pub invoice_date: NaiveDate,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub purchase_medicine_list: Vec<PurchaseItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub id: Id,
    pub medicine_id: Id,
    pub unit_id: Id,
    pub medicine_barcode: String,
    pub medicine_name: String,
    pub qty: f64,
    pub unit: String,
    pub price: Money,
    pub discount: Money,
    pub tax: Money,
    pub subtotal: Money,
    pub batch_number: String,
    pub exp_date: Option<NaiveDate>,
}

impl From<&PurchaseInvoice> for PurchaseInvoiceDraft {
    fn from(pi: &PurchaseInvoice) -> Self {
        PurchaseInvoiceDraft {
            number: pi.number,
            supplier_id: pi.supplier_id,
            purchase_order_number: pi.purchase_order_number,
            subtotal: pi.subtotal,
            discount: pi.discount,
            tax: pi.tax,
            total_price: pi.total_price,
            description: pi.description.clone(),
            invoice_date: pi.invoice_date,
            purchase_medicine_list: pi
                .purchase_medicine_list
                .iter()
                .map(|item| PurchaseLine {
                    medicine_barcode: item.medicine_barcode.clone(),
                    medicine_name: item.medicine_name.clone(),
                    qty: item.qty,
                    unit: item.unit.clone(),
                    price: item.price,
                    discount: item.discount,
                    tax: item.tax,
                    subtotal: item.subtotal,
                    batch_number: item.batch_number.clone(),
                    exp_date: item.exp_date,
                })
                .collect(),
        }
    }
}

impl DocumentModel for PurchaseInvoice {
    const KIND: DocumentKind = DocumentKind::PurchaseInvoice;

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
        self.purchase_medicine_list
            .iter()
            .map(|item| {
                StockMove::new(item.medicine_id, item.unit_id, &item.unit, item.qty, Direction::In)
            })
            .collect()
    }

    fn print_sheet(&self, letterhead: &Letterhead) -> PrintSheet {
        let mut sheet =
            PrintSheet::new("PURCHASE INVOICE", letterhead, self.number, self.invoice_date)
                .party("Supplier", &self.supplier_name)
                .party("Received by", &self.user_name);
        if let Some(po) = self.purchase_order_number {
            sheet = sheet.party("Purchase order", po.to_string());
        }
        sheet = sheet.columns(&[
            "No", "Item", "Batch", "Exp", "Qty", "Unit", "Price", "Disc", "Tax", "Subtotal",
        ]);

        sheet.rows = self
            .purchase_medicine_list
            .iter()
            .enumerate()
            .map(|(i, item)| {
                vec![
                    (i + 1).to_string(),
                    item.medicine_name.clone(),
                    item.batch_number.clone(),
                    item.exp_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                    format_qty(item.qty),
                    item.unit.clone(),
                    item.price.grouped(),
                    item.discount.grouped(),
                    item.tax.grouped(),
                    item.subtotal.grouped(),
                ]
            })
            .collect();

        sheet
            .total("Subtotal", self.subtotal.grouped())
            .total("Discount", self.discount.grouped())
            .total("Tax", self.tax.grouped())
            .total("Total", self.total_price.grouped())
            .notes(&self.description)
    }
}
