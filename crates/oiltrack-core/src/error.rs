//! # Error Types
//!
//! Domain-specific error types for oiltrack-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  oiltrack-core errors (this file)                                      │
//! │  ├── CoreError        - Ledger and reporting rule failures             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  oiltrack-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  oiltrack-ledger errors (service crate)                                │
//! │  └── LedgerError      - What callers see                               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → CLI / dashboard     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core ledger errors.
///
/// Business rule violations that are not plain field validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Nothing to export.
    ///
    /// ## When This Occurs
    /// - CSV export over an empty ledger
    /// - Photo archive over a range with no transactions
    #[error("No {what} found for export")]
    NothingToExport { what: String },

    /// A collection name that the purge endpoint does not know.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// A date range whose start is after its end.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write so no partial state is ever created.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// The supply form is missing liters, branch or oil type.
    ///
    /// ## User Workflow
    /// ```text
    /// Supply form (oilSuppliedLiters: 0)
    ///      │
    ///      ▼
    /// validate_supply_form()
    ///      │
    ///      ▼
    /// MissingInformation { fields: ["oilSuppliedLiters"] }
    ///      │
    ///      ▼
    /// UI shows: "Missing Information"
    /// ```
    #[error("Missing Information: please fill {}", fields.join(", "))]
    MissingInformation { fields: Vec<String> },

    /// Start meter reading is greater than end meter reading.
    #[error("Invalid Meter Readings: start ({start}) cannot be greater than end ({end})")]
    InvalidMeterReadings { start: f64, end: f64 },
}

impl ValidationError {
    /// Creates a Required error for a field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates a MustBePositive error for a field.
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    /// User-facing headline, the short title a toast would show.
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::MissingInformation { .. } => "Missing Information",
            ValidationError::InvalidMeterReadings { .. } => "Invalid Meter Readings",
            _ => "Validation Error",
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_information_message() {
        let err = ValidationError::MissingInformation {
            fields: vec!["branchId".into(), "oilTypeId".into()],
        };
        assert_eq!(err.title(), "Missing Information");
        assert!(err.to_string().contains("branchId, oilTypeId"));
    }

    #[test]
    fn test_validation_wraps_into_core() {
        let err: CoreError = ValidationError::required("title").into();
        assert_eq!(err.to_string(), "Validation error: title is required");
    }
}
