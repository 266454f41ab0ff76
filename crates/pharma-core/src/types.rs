//! # Domain Types
//!
//! Entities of the pharmacy back-end as the rest of the system sees them.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌───────────────────────────┐ │
//! │  │    User      │  │    Medicine      │  │  Parties                  │ │
//! │  │  name        │  │  barcode         │  │  Customer (name)          │ │
//! │  │  admin       │  │  qty (1st unit)  │  │  Patient (name, age)      │ │
//! │  │  token id ✗  │  │  3 × unit slot   │  │  Doctor, Supplier         │ │
//! │  └──────────────┘  │  2 × ratio       │  │  CompanyProfile (single)  │ │
//! │                    └──────────────────┘  └───────────────────────────┘ │
//! │  ┌──────────────┐  ┌──────────────────┐                                │
//! │  │ Unit         │  │ PaymentMethod    │   upper-cased, upsert-on-read  │
//! │  └──────────────┘  └──────────────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stored views derive `FromRow` when the `sqlx` feature is on; inputs are the
//! client payloads and implement [`Validate`](crate::validation::Validate).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::search::{normalize_name, normalize_upper};
use crate::stock::StockProfile;
use crate::validation::{
    require_text, validate_amount, validate_name, validate_password, validate_ratio, Validate,
    ValidationResult,
};

/// Primary key type shared by every table.
pub type Id = i64;

// =============================================================================
// User
// =============================================================================

/// A user account. Password hash and bound token id never leave pharma-db.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub phone_number: String,
    pub admin: bool,
    pub last_logged_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

/// Enrolment / modification payload for a user.
///
/// `admin_password` is the calling administrator's own password, re-entered
/// to elevate the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    #[serde(skip_serializing)]
    pub admin_password: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub admin: bool,
}

impl Validate for UserInput {
    fn validate(&self) -> ValidationResult<()> {
        require_text("adminPassword", &self.admin_password)?;
        validate_name("name", &self.name)?;
        validate_password(&self.password)?;
        Ok(())
    }
}

// =============================================================================
// Lookup tables
// =============================================================================

/// Unit of measure (TAB, BOX, BTL, ...). Upper-cased, unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Unit {
    pub id: Id,
    pub name: String,
}

/// Payment method (CASH, QRIS, ...). Upper-cased, unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethod {
    pub id: Id,
    pub name: String,
}

/// Payload for the unit and payment-method tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupInput {
    pub name: String,
}

impl LookupInput {
    pub fn normalized(&self) -> String {
        normalize_upper(&self.name)
    }
}

impl Validate for LookupInput {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)
    }
}

// =============================================================================
// Parties
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

/// Payload shared by customer and doctor (name only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedInput {
    pub name: String,
}

impl NamedInput {
    pub fn normalized(&self) -> String {
        normalize_name(&self.name)
    }
}

impl Validate for NamedInput {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

/// A patient; unique by (name, age).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Id,
    pub name: String,
    pub age: i64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInput {
    pub name: String,
    #[serde(default)]
    pub age: i64,
}

impl Validate for PatientInput {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        if !(0..=150).contains(&self.age) {
            return Err(ValidationError::OutOfRange {
                field: "age".to_string(),
                min: 0.0,
                max: 150.0,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Id,
    pub name: String,
    pub address: String,
    pub company_phone_number: String,
    pub contact_person_name: String,
    pub contact_person_number: String,
    pub terms: String,
    pub vendor_is_taxable: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    pub name: String,
    pub address: String,
    pub company_phone_number: String,
    #[serde(default)]
    pub contact_person_name: String,
    #[serde(default)]
    pub contact_person_number: String,
    pub terms: String,
    #[serde(default)]
    pub vendor_is_taxable: bool,
}

impl Validate for SupplierInput {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        require_text("address", &self.address)?;
        require_text("companyPhoneNumber", &self.company_phone_number)?;
        require_text("terms", &self.terms)?;
        Ok(())
    }
}

/// The pharmacy's own profile. There is exactly one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    pub address: String,
    pub business_registration_number: String,
    pub pharmacist: String,
    pub pharmacist_license_number: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfileInput {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub business_registration_number: String,
    #[serde(default)]
    pub pharmacist: String,
    #[serde(default)]
    pub pharmacist_license_number: String,
}

impl Validate for CompanyProfileInput {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        require_text("address", &self.address)
    }
}

// =============================================================================
// Medicine
// =============================================================================

/// A medicine with its three unit slots, as stored and joined with unit names.
///
/// `qty` is the quantity on hand, always expressed in the first unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Id,
    pub barcode: String,
    pub name: String,
    pub qty: f64,

    pub first_unit_id: Id,
    pub first_unit_name: String,
    pub first_subtotal: Money,
    pub first_discount_percentage: f64,
    pub first_discount_amount: Money,
    pub first_price: Money,

    pub second_unit_id: Option<Id>,
    pub second_unit_name: Option<String>,
    pub second_unit_to_first_unit_ratio: f64,
    pub second_subtotal: Money,
    pub second_discount_percentage: f64,
    pub second_discount_amount: Money,
    pub second_price: Money,

    pub third_unit_id: Option<Id>,
    pub third_unit_name: Option<String>,
    pub third_unit_to_first_unit_ratio: f64,
    pub third_subtotal: Money,
    pub third_discount_percentage: f64,
    pub third_discount_amount: Money,
    pub third_price: Money,

    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by_user_name: Option<String>,
}

impl Medicine {
    /// Returns what the stock keeper needs to know about this medicine.
    pub fn stock_profile(&self) -> StockProfile {
        StockProfile {
            medicine_id: self.id,
            barcode: self.barcode.clone(),
            on_hand: self.qty,
            first_unit_id: self.first_unit_id,
            second_unit_id: self.second_unit_id,
            second_to_first: self.second_unit_to_first_unit_ratio,
            third_unit_id: self.third_unit_id,
            third_to_first: self.third_unit_to_first_unit_ratio,
        }
    }
}

/// One (unit, pricing) slot of a medicine payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitPricing {
    pub unit: String,
    pub ratio: f64,
    pub subtotal: Money,
    pub discount_percentage: f64,
    pub discount_amount: Money,
    pub price: Money,
}

/// Medicine registration / modification payload (flat, as the client sends it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineInput {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub qty: f64,
    pub first_unit: String,
    #[serde(default)]
    pub first_subtotal: Money,
    #[serde(default)]
    pub first_discount_percentage: f64,
    #[serde(default)]
    pub first_discount_amount: Money,
    #[serde(default)]
    pub first_price: Money,
    #[serde(default)]
    pub second_unit: String,
    #[serde(default)]
    pub second_unit_to_first_unit_ratio: f64,
    #[serde(default)]
    pub second_subtotal: Money,
    #[serde(default)]
    pub second_discount_percentage: f64,
    #[serde(default)]
    pub second_discount_amount: Money,
    #[serde(default)]
    pub second_price: Money,
    #[serde(default)]
    pub third_unit: String,
    #[serde(default)]
    pub third_unit_to_first_unit_ratio: f64,
    #[serde(default)]
    pub third_subtotal: Money,
    #[serde(default)]
    pub third_discount_percentage: f64,
    #[serde(default)]
    pub third_discount_amount: Money,
    #[serde(default)]
    pub third_price: Money,
    #[serde(default)]
    pub description: String,
}

impl MedicineInput {
    pub fn normalized_name(&self) -> String {
        normalize_upper(&self.name)
    }

    /// The first unit slot (always present).
    pub fn first(&self) -> UnitPricing {
        UnitPricing {
            unit: normalize_upper(&self.first_unit),
            ratio: 1.0,
            subtotal: self.first_subtotal,
            discount_percentage: self.first_discount_percentage,
            discount_amount: self.first_discount_amount,
            price: self.first_price,
        }
    }

    /// The second unit slot, when a unit name was given.
    pub fn second(&self) -> Option<UnitPricing> {
        let unit = normalize_upper(&self.second_unit);
        (!unit.is_empty()).then(|| UnitPricing {
            unit,
            ratio: self.second_unit_to_first_unit_ratio,
            subtotal: self.second_subtotal,
            discount_percentage: self.second_discount_percentage,
            discount_amount: self.second_discount_amount,
            price: self.second_price,
        })
    }

    /// The third unit slot, when a unit name was given.
    pub fn third(&self) -> Option<UnitPricing> {
        let unit = normalize_upper(&self.third_unit);
        (!unit.is_empty()).then(|| UnitPricing {
            unit,
            ratio: self.third_unit_to_first_unit_ratio,
            subtotal: self.third_subtotal,
            discount_percentage: self.third_discount_percentage,
            discount_amount: self.third_discount_amount,
            price: self.third_price,
        })
    }
}

impl Validate for MedicineInput {
    fn validate(&self) -> ValidationResult<()> {
        require_text("barcode", &self.barcode)?;
        validate_name("name", &self.name)?;
        require_text("firstUnit", &self.first_unit)?;
        if self.qty < 0.0 || !self.qty.is_finite() {
            return Err(ValidationError::Negative {
                field: "qty".to_string(),
            });
        }
        validate_amount("firstPrice", self.first_price)?;
        if let Some(second) = self.second() {
            validate_ratio("secondUnitToFirstUnitRatio", second.ratio)?;
            validate_amount("secondPrice", second.price)?;
        }
        if let Some(third) = self.third() {
            validate_ratio("thirdUnitToFirstUnitRatio", third.ratio)?;
            validate_amount("thirdPrice", third.price)?;
        }
        Ok(())
    }
}

// =============================================================================
// Medicine history
// =============================================================================

/// One recorded stock movement of a medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MedicineHistory {
    pub id: Id,
    pub medicine_id: Id,
    pub document_kind: String,
    pub document_id: Id,
    pub document_number: i64,
    /// "IN" or "OUT".
    pub direction: String,
    /// Quantity in the medicine's first unit.
    pub qty: f64,
    /// Quantity as entered on the document line, in `unit_name`.
    pub entered_qty: f64,
    pub unit_name: String,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
