//! Layout data for printed documents.
//!
//! A [`PrintSheet`] is plain data: the renderer in pos-api turns it into a
//! PDF and fingerprints its JSON form to decide whether the file on disk is
//! still current.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Company branding printed at the top of every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Letterhead {
    pub company_name: String,
    pub address: String,
    pub phone_number: String,
    pub whatsapp_number: String,
    pub slogan: String,
    pub pharmacist: String,
    pub pharmacist_license_number: String,
    pub business_registration_number: String,
}

/// Canonical render input of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintSheet {
    pub title: String,
    pub letterhead: Letterhead,
    pub number: i64,
    pub date: NaiveDate,
    /// Label/value pairs printed under the title (customer, supplier, ...).
    pub parties: Vec<(String, String)>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Label/value pairs printed below the table.
    pub totals: Vec<(String, String)>,
    pub notes: String,
}

impl PrintSheet {
    pub(crate) fn new(title: &str, letterhead: &Letterhead, number: i64, date: NaiveDate) -> Self {
        PrintSheet {
            title: title.to_string(),
            letterhead: letterhead.clone(),
            number,
            date,
            parties: Vec::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            totals: Vec::new(),
            notes: String::new(),
        }
    }

    pub(crate) fn party(mut self, label: &str, value: impl Into<String>) -> Self {
        self.parties.push((label.to_string(), value.into()));
        self
    }

    pub(crate) fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub(crate) fn total(mut self, label: &str, value: impl Into<String>) -> Self {
        self.totals.push((label.to_string(), value.into()));
        self
    }

    pub(crate) fn notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_string();
        self
    }
}

/// Formats a quantity without a trailing `.0` for whole numbers.
///
/// ```rust
/// use pharma_core::document::format_qty;
///
/// assert_eq!(format_qty(30.0), "30");
/// assert_eq!(format_qty(2.5), "2.5");
/// ```
pub fn format_qty(qty: f64) -> String {
    if qty.fract() == 0.0 && qty.abs() < 1e15 {
        format!("{}", qty as i64)
    } else {
        format!("{qty}")
    }
}
