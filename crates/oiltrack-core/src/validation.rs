//! # Validation Module
//!
//! Input validation for forms that feed the ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Supply / loading form (THIS MODULE)                          │
//! │  ├── Missing liters, branch or oil type → "Missing Information"        │
//! │  └── start meter > end meter            → "Invalid Meter Readings"     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ledger records (DeliveryRecord::validate)                    │
//! │  └── delivered liters > 0, ids present                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── CHECK (quantity > 0)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every check here runs before any write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::ledger::{delivery_order_id, direct_session_id, DeliveryRecord};
use crate::types::Photos;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length for names and titles.
pub const MAX_NAME_LENGTH: usize = 200;

// =============================================================================
// Primitive Validators
// =============================================================================

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Rejects zero, negative and NaN values.
pub fn validate_positive(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_nan() || value <= 0.0 {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates a display name (branch, oil type, task title).
///
/// ## Example
/// ```rust
/// use oiltrack_core::validation::validate_name;
///
/// assert!(validate_name("name", "Diesel").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    validate_required(field, value)?;
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.into(),
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(())
}

// =============================================================================
// Supply Form
// =============================================================================

/// What a driver submits when recording a supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SupplyForm {
    /// Session the supply draws from. `None` records a direct supply.
    pub load_session_id: Option<String>,
    /// Delivery order number; synthesized when blank.
    pub delivery_order_id: Option<String>,
    pub branch_id: String,
    pub branch_name: String,
    pub oil_type_id: String,
    pub oil_type_name: String,
    pub oil_supplied_liters: Option<f64>,
    pub start_meter_reading: Option<f64>,
    pub end_meter_reading: Option<f64>,
    pub photos: Photos,
    pub driver_uid: Option<String>,
    pub driver_name: Option<String>,
}

/// Checks a supply form before anything is written.
///
/// ## Rules
/// - liters, branch and oil type must be present (liters > 0)
/// - when both meter readings are given, start ≤ end
pub fn validate_supply_form(form: &SupplyForm) -> ValidationResult<()> {
    let mut missing = Vec::new();
    match form.oil_supplied_liters {
        Some(liters) if liters > 0.0 => {}
        _ => missing.push("oilSuppliedLiters".to_string()),
    }
    if form.branch_id.trim().is_empty() {
        missing.push("branchId".to_string());
    }
    if form.oil_type_id.trim().is_empty() {
        missing.push("oilTypeId".to_string());
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingInformation { fields: missing });
    }

    if let (Some(start), Some(end)) = (form.start_meter_reading, form.end_meter_reading) {
        if start > end {
            return Err(ValidationError::InvalidMeterReadings { start, end });
        }
    }
    Ok(())
}

impl SupplyForm {
    /// Validates the form and turns it into a ledger record, synthesizing a
    /// `DIRECT_` session id and a `DO_` order number where absent.
    pub fn into_record(self, now: DateTime<Utc>) -> ValidationResult<DeliveryRecord> {
        validate_supply_form(&self)?;

        let load_session_id = self
            .load_session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| direct_session_id(now));
        let delivery_order_id = self
            .delivery_order_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| delivery_order_id(now));

        Ok(DeliveryRecord {
            load_session_id,
            delivery_order_id,
            branch_id: self.branch_id,
            branch_name: self.branch_name,
            oil_type_id: self.oil_type_id,
            oil_type_name: self.oil_type_name,
            delivered_liters: self.oil_supplied_liters.unwrap_or_default(),
            start_meter_reading: self.start_meter_reading,
            end_meter_reading: self.end_meter_reading,
            photos: self.photos,
            driver_uid: self.driver_uid,
            driver_name: self.driver_name,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::is_direct_session;

    fn form() -> SupplyForm {
        SupplyForm {
            branch_id: "b1".into(),
            branch_name: "North".into(),
            oil_type_id: "diesel".into(),
            oil_type_name: "Diesel".into(),
            oil_supplied_liters: Some(250.0),
            start_meter_reading: Some(100.0),
            end_meter_reading: Some(350.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_liters_is_missing_information() {
        let f = SupplyForm {
            oil_supplied_liters: Some(0.0),
            ..form()
        };
        let err = validate_supply_form(&f).unwrap_err();
        assert_eq!(err.title(), "Missing Information");
    }

    #[test]
    fn test_negative_liters_is_missing_information() {
        let f = SupplyForm {
            oil_supplied_liters: Some(-10.0),
            ..form()
        };
        assert!(matches!(
            validate_supply_form(&f),
            Err(ValidationError::MissingInformation { .. })
        ));
    }

    #[test]
    fn test_missing_branch_and_oil_type_listed() {
        let f = SupplyForm {
            branch_id: String::new(),
            oil_type_id: " ".into(),
            ..form()
        };
        match validate_supply_form(&f) {
            Err(ValidationError::MissingInformation { fields }) => {
                assert_eq!(fields, vec!["branchId", "oilTypeId"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_start_after_end_rejected() {
        let f = SupplyForm {
            start_meter_reading: Some(500.0),
            end_meter_reading: Some(400.0),
            ..form()
        };
        let err = validate_supply_form(&f).unwrap_err();
        assert_eq!(err.title(), "Invalid Meter Readings");
    }

    #[test]
    fn test_into_record_synthesizes_ids() {
        let record = form().into_record(Utc::now()).unwrap();
        assert!(is_direct_session(&record.load_session_id));
        assert!(record.delivery_order_id.starts_with("DO_"));
        assert_eq!(record.delivered_liters, 250.0);
    }

    #[test]
    fn test_into_record_keeps_given_ids() {
        let record = SupplyForm {
            load_session_id: Some("LS_1_ABCD".into()),
            delivery_order_id: Some("DO-778".into()),
            ..form()
        }
        .into_record(Utc::now())
        .unwrap();
        assert_eq!(record.load_session_id, "LS_1_ABCD");
        assert_eq!(record.delivery_order_id, "DO-778");
    }

    #[test]
    fn test_validate_positive_rejects_nan() {
        assert!(validate_positive("liters", f64::NAN).is_err());
        assert!(validate_positive("liters", 0.1).is_ok());
    }
}
