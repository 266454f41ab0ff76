//! # Documents
//!
//! The four document kinds share one lifecycle: a header with line items,
//! multi-unit quantities and a stock side effect.
//!
//! ## Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Kind              Counterparty      Lines                  Stock       │
//! │  ───────────────   ───────────────   ────────────────────   ─────────── │
//! │  invoice           customer          medicineLists          OUT         │
//! │  purchase-invoice  supplier          purchaseMedicineList   IN          │
//! │  purchase-order    supplier          purchaseOrder...List   none        │
//! │  production        produced medicine productionMedicineList OUT + IN    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each kind provides a *draft* (what the client sends, validated here) and a
//! *detail* (what is stored, read back with joined names). The detail is the
//! single source for both the stock plan ([`DocumentModel::stock_moves`]) and
//! the printed artifact ([`DocumentModel::print_sheet`]).

mod invoice;
mod print;
mod production;
mod purchase_invoice;
mod purchase_order;

pub use invoice::{Invoice, InvoiceDraft, InvoiceItem, InvoiceLine};
pub use print::{format_qty, Letterhead, PrintSheet};
pub use production::{Production, ProductionDraft, ProductionItem, ProductionLine};
pub use purchase_invoice::{PurchaseInvoice, PurchaseInvoiceDraft, PurchaseItem, PurchaseLine};
pub use purchase_order::{OrderLine, PurchaseOrder, PurchaseOrderDraft, PurchaseOrderItem};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::stock::StockMove;
use crate::types::Id;
use crate::validation::{validate_date_order, Validate, ValidationResult};

// =============================================================================
// Document Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Invoice,
    PurchaseInvoice,
    PurchaseOrder,
    Production,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Invoice,
        DocumentKind::PurchaseInvoice,
        DocumentKind::PurchaseOrder,
        DocumentKind::Production,
    ];

    /// Stable identifier used in log paths, artifact folders and history rows.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::PurchaseInvoice => "purchase-invoice",
            DocumentKind::PurchaseOrder => "purchase-order",
            DocumentKind::Production => "production",
        }
    }

    /// Human-readable name for messages and printed titles.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::PurchaseInvoice => "Purchase invoice",
            DocumentKind::PurchaseOrder => "Purchase order",
            DocumentKind::Production => "Production",
        }
    }

    /// Name of the counterparty filter segment in list routes.
    pub fn counterparty_filter(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "customer",
            DocumentKind::PurchaseInvoice | DocumentKind::PurchaseOrder => "supplier",
            DocumentKind::Production => "medicine",
        }
    }

    /// Artifact file name: `<kind>-<number>-<YYYY-MM-DD>.pdf`.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use pharma_core::DocumentKind;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    /// assert_eq!(DocumentKind::Invoice.artifact_name(7, date), "invoice-7-2024-03-01.pdf");
    /// ```
    pub fn artifact_name(self, number: i64, date: NaiveDate) -> String {
        format!("{}-{}-{}.pdf", self.as_str(), number, date.format("%Y-%m-%d"))
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive business-date range of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

impl Validate for DateRange {
    fn validate(&self) -> ValidationResult<()> {
        validate_date_order(self.start_date, self.end_date)
    }
}

// =============================================================================
// List Filter
// =============================================================================

/// A user or counterparty reference given either by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(Id),
    Name(String),
}

impl Lookup {
    /// Numeric values are ids, anything else is a name.
    pub fn parse(val: &str) -> Lookup {
        match val.trim().parse::<Id>() {
            Ok(id) => Lookup::Id(id),
            Err(_) => Lookup::Name(val.trim().to_string()),
        }
    }
}

/// The optional `{filter}/{val}` suffix of a list route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Id(Id),
    Number(i64),
    User(Lookup),
    Counterparty(Lookup),
}

impl ListFilter {
    /// Parses a filter segment for a document kind.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::{DocumentKind, ListFilter, Lookup};
    ///
    /// let f = ListFilter::parse(DocumentKind::Invoice, "customer", "budi").unwrap();
    /// assert_eq!(f, ListFilter::Counterparty(Lookup::Name("budi".into())));
    /// assert!(ListFilter::parse(DocumentKind::Invoice, "supplier", "1").is_err());
    /// ```
    pub fn parse(kind: DocumentKind, filter: &str, val: &str) -> ValidationResult<ListFilter> {
        let numeric = |field: &str| {
            val.trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::invalid_format(field, "expected a number"))
        };

        match filter {
            "all" => Ok(ListFilter::All),
            "id" => numeric("id").map(ListFilter::Id),
            "number" => numeric("number").map(ListFilter::Number),
            "user" => Ok(ListFilter::User(Lookup::parse(val))),
            other if other == kind.counterparty_filter() => {
                Ok(ListFilter::Counterparty(Lookup::parse(val)))
            }
            _ => Err(ValidationError::NotAllowed {
                field: "filter".to_string(),
                allowed: ["all", "id", "number", "user", kind.counterparty_filter()]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A line of a draft as the engine needs it for resolution.
pub trait DraftLine {
    fn barcode(&self) -> &str;
    fn unit(&self) -> &str;
    fn qty(&self) -> f64;
}

/// A client-side document before it is stored.
pub trait DocumentDraft: Validate {
    type Line: DraftLine + Send + Sync;

    fn number(&self) -> i64;
    fn business_date(&self) -> NaiveDate;
    fn lines(&self) -> &[Self::Line];
}

/// A stored document.
pub trait DocumentModel {
    const KIND: DocumentKind;

    fn id(&self) -> Id;
    fn number(&self) -> i64;
    fn business_date(&self) -> NaiveDate;

    /// Stored artifact path, relative to the static root.
    fn pdf_url(&self) -> Option<&str>;
    fn set_pdf_url(&mut self, url: Option<String>);

    /// Further artifact paths of the document, published like `pdf_url`.
    fn extra_artifacts(&mut self) -> Vec<&mut Option<String>> {
        Vec::new()
    }

    /// The stock effect of this document, in line order.
    fn stock_moves(&self) -> Vec<StockMove>;

    /// Canonical render input. Contains no timestamps or ids so that an
    /// unchanged document produces the same sheet.
    fn print_sheet(&self, letterhead: &Letterhead) -> PrintSheet;
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(DocumentKind::PurchaseOrder.as_str(), "purchase-order");
        let json = serde_json::to_string(&DocumentKind::PurchaseInvoice).unwrap();
        assert_eq!(json, "\"purchase-invoice\"");
        assert_eq!(DocumentKind::Production.counterparty_filter(), "medicine");
    }

    #[test]
    fn test_list_filter_parse() {
        let k = DocumentKind::PurchaseInvoice;
        assert_eq!(ListFilter::parse(k, "all", "").unwrap(), ListFilter::All);
        assert_eq!(ListFilter::parse(k, "number", "12").unwrap(), ListFilter::Number(12));
        assert_eq!(
            ListFilter::parse(k, "user", "3").unwrap(),
            ListFilter::User(Lookup::Id(3))
        );
        assert_eq!(
            ListFilter::parse(k, "supplier", "PT Sehat").unwrap(),
            ListFilter::Counterparty(Lookup::Name("PT Sehat".into()))
        );
        assert!(ListFilter::parse(k, "id", "abc").is_err());
        assert!(ListFilter::parse(k, "customer", "1").is_err());
    }

    #[test]
    fn test_date_range() {
        let range: DateRange =
            serde_json::from_str(r#"{"startDate":"2024-01-01","endDate":"2024-01-31"}"#).unwrap();
        assert!(range.validate().is_ok());
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));

        let reversed = DateRange {
            start_date: range.end_date,
            end_date: range.start_date,
        };
        assert!(reversed.validate().is_err());

        assert!(serde_json::from_str::<DateRange>(r#"{"startDate":"01/01/2024","endDate":"2024-01-31"}"#).is_err());
    }
}
