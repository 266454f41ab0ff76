//! # Error Types
//!
//! Domain-specific error types for pharma-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharma-core errors (this file)                                        │
//! │  ├── CoreError        - Stock and document rule violations             │
//! │  └── ValidationError  - Payload field failures                         │
//! │                                                                         │
//! │  pharma-db errors                                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  pos-api errors                                                         │
//! │  └── ApiError         - What the client sees inside the envelope       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Envelope               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The unit is none of the medicine's three unit slots.
    #[error("unknown unit {unit} for medicine {barcode}")]
    UnknownUnit { barcode: String, unit: String },

    /// A sale (or production component) asks for more than is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// POST /invoice  { barcode: "BC1", unit: "TAB", qty: 150 }
    ///      │
    ///      ▼
    /// first-unit qty 150 > on hand 70
    ///      │
    ///      ▼
    /// InsufficientStock { barcode: "BC1", available: 70, requested: 150 }
    /// ```
    #[error("Insufficient stock for {barcode}: available {available}, requested {requested}")]
    InsufficientStock {
        barcode: String,
        available: f64,
        requested: f64,
    },

    /// Reversing a purchase (or produced output) would drive on-hand below
    /// zero. Only an administrator override lets this through.
    #[error("reversing {requested} of {barcode} would leave negative stock (on hand {available})")]
    NegativeStock {
        barcode: String,
        available: f64,
        requested: f64,
    },

    /// Too many line items on one document.
    #[error("document cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g. a date that is not YYYY-MM-DD).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn invalid_format(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            barcode: "BC1".to_string(),
            available: 70.0,
            requested: 150.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for BC1: available 70, requested 150"
        );

        let err = CoreError::UnknownUnit {
            barcode: "BC1".to_string(),
            unit: "BOX".to_string(),
        };
        assert_eq!(err.to_string(), "unknown unit BOX for medicine BC1");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("name").to_string(), "name is required");
        assert_eq!(
            ValidationError::Negative {
                field: "paidAmount".to_string()
            }
            .to_string(),
            "paidAmount must not be negative"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("barcode").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
