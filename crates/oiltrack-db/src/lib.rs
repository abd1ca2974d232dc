//! # oiltrack-db: Database Layer for OilTrack
//!
//! SQLite storage for reference data, the load-session ledger and the admin
//! workflows, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OilTrack Data Flow                               │
//! │                                                                         │
//! │  oiltrack-ledger service (complete_delivery, export_csv, ...)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   oiltrack-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ LedgerRepo    │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │◄───│ BranchRepo    │    │              │  │   │
//! │  │   │ RetryPolicy   │    │ OilTypeRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`retry`] - Exponential backoff for transient failures
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oiltrack_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("oiltrack.db")).await?;
//! let outcome = db.ledger().record_supply(&delivery, &supply_tx, Utc::now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

pub use repository::branch::BranchRepository;
pub use repository::delivery::DeliveryRepository;
pub use repository::driver::DriverRepository;
pub use repository::ledger::{LedgerRepository, SupplyOutcome};
pub use repository::load_session::LoadSessionRepository;
pub use repository::maintenance::MaintenanceRepository;
pub use repository::oil_type::OilTypeRepository;
pub use repository::transaction::TransactionRepository;
pub use repository::workflow::{ComplaintRepository, TaskRepository};
pub use repository::CascadeReport;
