//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Rates, allocation, payment configuration       │
//! │  └── ValidationError  - Customer/item/quantity/stock invariants        │
//! │                                                                         │
//! │  caja-db errors                                                        │
//! │  └── DbError          - Storage failures, wraps CoreError               │
//! │                                                                         │
//! │  caja-sync errors                                                      │
//! │  ├── RemoteError      - ERP transport/status/decode failures            │
//! │  └── SyncError        - Unit and pass failures                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → SyncError               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No direct or inverse exchange rate is known for the pair.
    ///
    /// ## When This Occurs
    /// - Tender currency has no `Currency Exchange` record against the
    ///   receivable currency (in either direction)
    /// - A stored rate is zero, which cannot be inverted
    ///
    /// Callers must surface this. Defaulting to 1.0 is only valid for
    /// same-currency pairs, which never reach this error.
    #[error("No exchange rate available from {from} to {to}")]
    RateUnavailable { from: String, to: String },

    /// The referenced document has no outstanding balance left.
    #[error("Nothing to allocate: {document} has no outstanding amount")]
    NothingToAllocate { document: String },

    /// A mode of payment has no settlement account for the company.
    #[error("Mode of payment '{mode}' has no configured account")]
    UnconfiguredPaymentMode { mode: String },

    /// The exchange-rate source could not be read.
    #[error("Rate source error: {0}")]
    RateSource(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true when the error came from input validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors raised before any document is written.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// A quantity, rate or total too large to represent.
    #[error("{field} is out of range")]
    OutOfRange { field: String },

    /// Invalid format (e.g., unknown doc type, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Customer is disabled")]
    CustomerDisabled,

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Item {0} is disabled")]
    ItemDisabled(String),

    /// No rate override was given and the price list has no rate.
    #[error("Item {item} has no price in {price_list}")]
    MissingPrice { item: String, price_list: String },

    /// Requested quantity exceeds what the warehouse holds.
    ///
    /// ## User Workflow
    /// ```text
    /// Invoice line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { item: "COKE", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: Decimal,
        requested: Decimal,
    },

    /// A document needs at least one line.
    #[error("{0} must have at least one item")]
    EmptyDocument(String),

    /// The document type cannot link to the given target.
    #[error("{doc_type} cannot link to {target}")]
    UnsupportedLink { doc_type: String, target: String },
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
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_messages() {
        let err = ValidationError::InsufficientStock {
            item: "COKE-330".to_string(),
            available: dec!(3),
            requested: dec!(5),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COKE-330: available 3, requested 5"
        );

        assert_eq!(ValidationError::CustomerDisabled.to_string(), "Customer is disabled");
    }

    #[test]
    fn test_rate_unavailable_message() {
        let err = CoreError::RateUnavailable {
            from: "EUR".into(),
            to: "NIO".into(),
        };
        assert_eq!(err.to_string(), "No exchange rate available from EUR to NIO");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::CustomerDisabled.into();
        assert!(core_err.is_validation());
        assert!(matches!(
            core_err,
            CoreError::Validation(ValidationError::CustomerDisabled)
        ));
    }
}
