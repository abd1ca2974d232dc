//! # Service Error Types
//!
//! What callers of the service layer see.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ledger Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Input       │  │     Store       │  │     Photos / Export     │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Database       │  │  Photo                  │ │
//! │  │  Core           │  │  NotFound       │  │  Archive                │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │                                                   │
//! │  │  InvalidConfig  │                                                   │
//! │  │  ConfigLoad/Save│                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use oiltrack_core::{CoreError, ValidationError};
use oiltrack_db::DbError;

use crate::photos::PhotoError;

/// Result type alias for service operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Input rejected before any write.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Business rule failure (empty export, bad date range, unknown collection).
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error(transparent)]
    Database(#[from] DbError),

    /// A record the caller addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Photo & Export Errors
    // =========================================================================
    #[error("Photo storage error: {0}")]
    Photo(#[from] PhotoError),

    /// Building the photo archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True only for a missing record, never for a failing store.
    pub fn is_not_found(&self) -> bool {
        match self {
            LedgerError::NotFound { .. } => true,
            LedgerError::Database(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Machine-readable code for dashboards and the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) | LedgerError::Core(CoreError::Validation(_)) => {
                "VALIDATION_ERROR"
            }
            LedgerError::Core(CoreError::NothingToExport { .. }) => "NOTHING_TO_EXPORT",
            LedgerError::Core(_) => "BUSINESS_RULE",
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::Database(e) if e.is_not_found() => "NOT_FOUND",
            LedgerError::Database(e) if e.is_unavailable() => "STORE_UNAVAILABLE",
            LedgerError::Database(_) => "DATABASE_ERROR",
            LedgerError::Photo(_) => "PHOTO_ERROR",
            LedgerError::Archive(_) => "ARCHIVE_ERROR",
            LedgerError::InvalidConfig(_)
            | LedgerError::ConfigLoadFailed(_)
            | LedgerError::ConfigSaveFailed(_) => "CONFIG_ERROR",
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<zip::result::ZipError> for LedgerError {
    fn from(err: zip::result::ZipError) -> Self {
        LedgerError::Archive(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::ConfigSaveFailed(err.to_string())
    }
}
