//! # Validation Module
//!
//! Field rules applied to every payload before a transaction is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: JSON decode (serde)                                          │
//! │  ├── Types, required keys, YYYY-MM-DD dates (NaiveDate)                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Validate::validate (THIS MODULE)                             │
//! │  ├── Non-empty names, positive quantities, sane percentages            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / FOREIGN KEY / CHECK constraints               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_LINE_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Implemented by every client payload.
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

// =============================================================================
// String Validators
// =============================================================================

/// Fails with `Required` when the trimmed value is empty.
pub fn require_text(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a display name (people, medicines, units).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use pharma_core::validation::validate_name;
///
/// assert!(validate_name("name", "Paracetamol 500mg").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    require_text(field, value)?;
    if value.trim().chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }
    Ok(())
}

/// Validates a new password: 3 to 130 characters.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    let len = password.chars().count();
    if len < 3 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 3,
        });
    }
    if len > 130 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 130,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Finite
/// - Strictly positive
///
/// ```rust
/// use pharma_core::validation::validate_quantity;
///
/// assert!(validate_quantity("qty", 0.5).is_ok());
/// assert!(validate_quantity("qty", 0.0).is_err());
/// assert!(validate_quantity("qty", f64::NAN).is_err());
/// ```
pub fn validate_quantity(field: &str, qty: f64) -> ValidationResult<()> {
    if !qty.is_finite() || qty <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a unit ratio of a populated unit slot (strictly positive).
pub fn validate_ratio(field: &str, ratio: f64) -> ValidationResult<()> {
    validate_quantity(field, ratio)
}

/// Validates a monetary amount: zero is fine, negative is not.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a percentage in `0..=100`.
pub fn validate_percentage(field: &str, pct: f64) -> ValidationResult<()> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

/// Validates a document running number (strictly positive).
pub fn validate_number(number: i64) -> ValidationResult<()> {
    if number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "number".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Collection and Date Validators
// =============================================================================

/// Validates a document's line count: at least one, at most MAX_LINE_ITEMS.
pub fn validate_line_count(field: &str, count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required(field));
    }
    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1.0,
            max: MAX_LINE_ITEMS as f64,
        });
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` business date.
///
/// ```rust
/// use pharma_core::validation::parse_date;
///
/// assert!(parse_date("invoiceDate", "2024-02-29").is_ok());
/// assert!(parse_date("invoiceDate", "2023-02-29").is_err());
/// assert!(parse_date("invoiceDate", "29/02/2024").is_err());
/// ```
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::invalid_format(field, "expected YYYY-MM-DD"))
}

/// Validates `start <= end` for a date range.
pub fn validate_date_order(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::invalid_format(
            "startDate",
            "startDate must not be after endDate",
        ));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "ACET").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abc").is_ok());
        assert!(validate_password("ab").is_err());
        assert!(validate_password(&"x".repeat(131)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("qty", 30.0).is_ok());
        assert!(validate_quantity("qty", -1.0).is_err());
        assert!(validate_quantity("qty", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_amount_and_percentage() {
        assert!(validate_amount("price", Money::ZERO).is_ok());
        assert!(validate_amount("price", Money::from_minor(-1)).is_err());
        assert!(validate_percentage("discountPercentage", 12.5).is_ok());
        assert!(validate_percentage("discountPercentage", 100.5).is_err());
    }

    #[test]
    fn test_line_count() {
        assert!(validate_line_count("medicineLists", 0).is_err());
        assert!(validate_line_count("medicineLists", 1).is_ok());
        assert!(validate_line_count("medicineLists", MAX_LINE_ITEMS + 1).is_err());
    }

    #[test]
    fn test_date_order() {
        let a = parse_date("startDate", "2024-01-01").unwrap();
        let b = parse_date("endDate", "2024-01-31").unwrap();
        assert!(validate_date_order(a, b).is_ok());
        assert!(validate_date_order(b, a).is_err());
        assert!(validate_date_order(a, a).is_ok());
    }
}
