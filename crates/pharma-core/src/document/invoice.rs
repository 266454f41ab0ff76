//! Sales invoice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::print::{format_qty, Letterhead, PrintSheet};
use super::{DocumentDraft, DocumentKind, DocumentModel, DraftLine};
use crate::error::ValidationError;
use crate::money::Money;
use crate::stock::{Direction, StockMove};
use crate::types::Id;
use crate::validation::{
    require_text, validate_amount, validate_line_count, validate_number, validate_percentage,
    validate_quantity, Validate, ValidationResult,
};

// =============================================================================
// Draft
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub number: i64,
    pub customer_id: Id,
    pub subtotal: Money,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub tax_percentage: f64,
    #[serde(default)]
    pub tax_amount: Money,
    pub total_price: Money,
    pub paid_amount: Money,
    #[serde(default)]
    pub change_amount: Money,
    pub payment_method_name: String,
    #[serde(default)]
    pub description: String,
    pub invoice_date: NaiveDate,
    pub medicine_lists: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    #[serde(alias = "barcode")]
    pub medicine_barcode: String,
    #[serde(default)]
    pub medicine_name: String,
    pub qty: f64,
    pub unit: String,
    pub price: Money,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub discount_amount: Money,
    pub subtotal: Money,
}

impl DraftLine for InvoiceLine {
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

impl DocumentDraft for InvoiceDraft {
    type Line = InvoiceLine;

    fn number(&self) -> i64 {
        self.number
    }

    fn business_date(&self) -> NaiveDate {
        self.invoice_date
    }

    fn lines(&self) -> &[InvoiceLine] {
        &self.medicine_lists
    }
}

impl Validate for InvoiceDraft {
    fn validate(&self) -> ValidationResult<()> {
        validate_number(self.number)?;
        if self.customer_id <= 0 {
            return Err(ValidationError::required("customerId"));
        }
        validate_amount("subtotal", self.subtotal)?;
        validate_percentage("discountPercentage", self.discount_percentage)?;
        validate_amount("discountAmount", self.discount_amount)?;
        validate_percentage("taxPercentage", self.tax_percentage)?;
        validate_amount("taxAmount", self.tax_amount)?;
        validate_amount("totalPrice", self.total_price)?;
        validate_amount("paidAmount", self.paid_amount)?;
        validate_amount("changeAmount", self.change_amount)?;
        require_text("paymentMethodName", &self.payment_method_name)?;
        validate_line_count("medicineLists", self.medicine_lists.len())?;

        for line in &self.medicine_lists {
            require_text("medicineBarcode", &line.medicine_barcode)?;
            require_text("unit", &line.unit)?;
            validate_quantity("qty", line.qty)?;
            validate_amount("price", line.price)?;
            validate_percentage("discountPercentage", line.discount_percentage)?;
            validate_amount("discountAmount", line.discount_amount)?;
            validate_amount("subtotal", line.subtotal)?;
        }
        Ok(())
    }
}

// =============================================================================
// Stored Document
// =============================================================================

/// A stored sales invoice with joined names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Id,
    pub number: i64,
    pub user_id: Id,
    pub user_name: String,
    pub customer_id: Id,
    pub customer_name: String,
    pub subtotal: Money,
    pub discount_percentage: f64,
    pub discount_amount: Money,
    pub tax_percentage: f64,
    pub tax_amount: Money,
    pub total_price: Money,
    pub paid_amount: Money,
    pub change_amount: Money,
    pub payment_method_id: Id,
    pub payment_method_name: String,
    pub description: String,
    pub invoice_date: NaiveDate,
    pub pdf_url: Option<String>,
    /// Till receipt, issued at most once.
    pub receipt_pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub medicine_lists: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Id,
    pub medicine_id: Id,
    pub unit_id: Id,
    pub medicine_barcode: String,
    pub medicine_name: String,
    pub qty: f64,
    pub unit: String,
    pub price: Money,
    pub discount_percentage: f64,
    pub discount_amount: Money,
    pub subtotal: Money,
}

impl From<&Invoice> for InvoiceDraft {
    fn from(invoice: &Invoice) -> Self {
        InvoiceDraft {
            number: invoice.number,
            customer_id: invoice.customer_id,
            subtotal: invoice.subtotal,
            discount_percentage: invoice.discount_percentage,
            discount_amount: invoice.discount_amount,
            tax_percentage: invoice.tax_percentage,
            tax_amount: invoice.tax_amount,
            total_price: invoice.total_price,
            paid_amount: invoice.paid_amount,
            change_amount: invoice.change_amount,
            payment_method_name: invoice.payment_method_name.clone(),
            description: invoice.description.clone(),
            invoice_date: invoice.invoice_date,
            medicine_lists: invoice
                .medicine_lists
                .iter()
                .map(|item| InvoiceLine {
                    medicine_barcode: item.medicine_barcode.clone(),
                    medicine_name: item.medicine_name.clone(),
                    qty: item.qty,
                    unit: item.unit.clone(),
                    price: item.price,
                    discount_percentage: item.discount_percentage,
                    discount_amount: item.discount_amount,
                    subtotal: item.subtotal,
                })
                .collect(),
        }
    }
}

impl DocumentModel for Invoice {
    const KIND: DocumentKind = DocumentKind::Invoice;

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

    fn extra_artifacts(&mut self) -> Vec<&mut Option<String>> {
        vec![&mut self.receipt_pdf_url]
    }

    fn stock_moves(&self) -> Vec<StockMove> {
        self.medicine_lists
            .iter()
            .map(|item| {
                StockMove::new(item.medicine_id, item.unit_id, &item.unit, item.qty, Direction::Out)
            })
            .collect()
    }

    fn print_sheet(&self, letterhead: &Letterhead) -> PrintSheet {
        let mut sheet = PrintSheet::new("INVOICE", letterhead, self.number, self.invoice_date)
            .party("Customer", &self.customer_name)
            .party("Cashier", &self.user_name)
            .party("Payment", &self.payment_method_name)
            .columns(&["No", "Item", "Qty", "Unit", "Price", "Disc", "Subtotal"]);

        sheet.rows = self
            .medicine_lists
            .iter()
            .enumerate()
            .map(|(i, item)| {
                vec![
                    (i + 1).to_string(),
                    item.medicine_name.clone(),
                    format_qty(item.qty),
                    item.unit.clone(),
                    item.price.grouped(),
                    item.discount_amount.grouped(),
                    item.subtotal.grouped(),
                ]
            })
            .collect();

        sheet
            .total("Subtotal", self.subtotal.grouped())
            .total(
                &format!("Discount ({}%)", format_qty(self.discount_percentage)),
                self.discount_amount.grouped(),
            )
            .total(
                &format!("Tax ({}%)", format_qty(self.tax_percentage)),
                self.tax_amount.grouped(),
            )
            .total("Total", self.total_price.grouped())
            .total("Paid", self.paid_amount.grouped())
            .total("Change", self.change_amount.grouped())
            .notes(&self.description)
    }
}

impl Invoice {
    /// Till receipt: who paid, how much and for which invoice.
    pub fn receipt_sheet(&self, letterhead: &Letterhead) -> PrintSheet {
        PrintSheet::new("RECEIPT", letterhead, self.number, self.invoice_date)
            .party("Received from", &self.customer_name)
            .party("Amount", self.total_price.grouped())
            .party("For", format!("Medicines, invoice no. {}", self.number))
            .party("Payment", &self.payment_method_name)
            .party("Cashier", &self.user_name)
            .total("Paid", self.paid_amount.grouped())
            .total("Change", self.change_amount.grouped())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> InvoiceDraft {
        serde_json::from_value(serde_json::json!({
            "number": 1,
            "customerId": 1,
            "subtotal": 30000,
            "totalPrice": 30000,
            "paidAmount": 50000,
            "changeAmount": 20000,
            "paymentMethodName": "cash",
            "invoiceDate": "2024-03-01",
            "medicineLists": [
                { "barcode": "BC1", "unit": "TAB", "qty": 30, "price": 1000, "subtotal": 30000 }
            ]
        }))
        .unwrap()
    }

    fn stored() -> Invoice {
        let now = Utc::now();
        Invoice {
            id: 9,
            number: 1,
            user_id: 1,
            user_name: "ADMIN".into(),
            customer_id: 1,
            customer_name: "UMUM".into(),
            subtotal: Money::from_major(30_000),
            discount_percentage: 0.0,
            discount_amount: Money::ZERO,
            tax_percentage: 0.0,
            tax_amount: Money::ZERO,
            total_price: Money::from_major(30_000),
            paid_amount: Money::from_major(50_000),
            change_amount: Money::from_major(20_000),
            payment_method_id: 1,
            payment_method_name: "CASH".into(),
            description: String::new(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            pdf_url: None,
            receipt_pdf_url: None,
            created_at: now,
            last_modified: now,
            last_modified_by_user_name: None,
            medicine_lists: vec![InvoiceItem {
                id: 1,
                medicine_id: 4,
                unit_id: 2,
                medicine_barcode: "BC1".into(),
                medicine_name: "ACET".into(),
                qty: 30.0,
                unit: "TAB".into(),
                price: Money::from_major(1000),
                discount_percentage: 0.0,
                discount_amount: Money::ZERO,
                subtotal: Money::from_major(30_000),
            }],
        }
    }

    #[test]
    fn test_draft_accepts_short_barcode_key() {
        let d = draft();
        assert_eq!(d.medicine_lists[0].medicine_barcode, "BC1");
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_draft_rejects_empty_lines_and_zero_qty() {
        let mut d = draft();
        d.medicine_lists[0].qty = 0.0;
        assert!(d.validate().is_err());

        let mut d = draft();
        d.medicine_lists.clear();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_sale_moves_out() {
        let moves = stored().stock_moves();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].direction, Direction::Out);
        assert_eq!(moves[0].qty, 30.0);
        assert_eq!(moves[0].medicine_id, 4);
    }

    #[test]
    fn test_sheet_ignores_timestamps() {
        let a = stored();
        let mut b = stored();
        b.last_modified = a.last_modified + chrono::Duration::hours(1);
        b.id = 99;
        let lh = Letterhead::default();
        assert_eq!(a.print_sheet(&lh), b.print_sheet(&lh));
        assert_eq!(a.print_sheet(&lh).rows[0][1], "ACET");
    }

    #[test]
    fn test_receipt_sheet_has_no_item_table() {
        let sheet = stored().receipt_sheet(&Letterhead::default());
        assert_eq!(sheet.title, "RECEIPT");
        assert!(sheet.columns.is_empty());
        assert!(sheet.rows.is_empty());
        assert_eq!(sheet.parties[0], ("Received from".to_string(), "UMUM".to_string()));
        assert_eq!(sheet.parties[1].1, Money::from_major(30_000).grouped());
        assert_eq!(sheet.totals.len(), 2);
    }

    #[test]
    fn test_back_to_draft() {
        let back = InvoiceDraft::from(&stored());
        assert_eq!(back.number, 1);
        assert_eq!(back.medicine_lists[0].qty, 30.0);
        assert_eq!(back.payment_method_name, "CASH");
    }
}
