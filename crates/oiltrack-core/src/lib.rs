//! # oiltrack-core: Pure Ledger Logic for OilTrack
//!
//! Domain types and the I/O-free rules behind the load-session ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OilTrack Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 oiltrack-cli / dashboards                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        oiltrack-ledger (services, photos, config)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ oiltrack-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  ledger  │ │  report  │ │  export  │          │   │
//! │  │   │ Branch   │ │ Session  │ │ Entry    │ │ CSV      │          │   │
//! │  │   │ OilType  │ │ Tx/Deliv │ │ Totals   │ │ ZIP names│          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 oiltrack-db (SQLite repositories)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Reference data (OilType, Branch, Driver), roles, photos
//! - [`ledger`] - LoadSession, Transaction, Delivery and balance reconciliation
//! - [`validation`] - Supply-form and field validation
//! - [`workflow`] - Tasks and complaints
//! - [`report`] - Enrichment, unified list, daily totals
//! - [`export`] - CSV rendering and photo-archive naming
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use oiltrack_core::ledger::{generate_load_session_id, LoadSession, NewLoadSession};
//!
//! let now = Utc::now();
//! let session = LoadSession::open(
//!     NewLoadSession {
//!         oil_type_id: "diesel".into(),
//!         oil_type_name: "Diesel".into(),
//!         total_loaded_liters: 1000.0,
//!         ..Default::default()
//!     },
//!     generate_load_session_id(now, &mut rand::thread_rng()),
//!     "driver-1".into(),
//!     now,
//! );
//!
//! let rec = session.reconcile(600.0, now);
//! assert_eq!(rec.remaining_liters, 400.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod export;
pub mod ledger;
pub mod report;
pub mod types;
pub mod validation;
pub mod workflow;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use ledger::{
    Delivery, DeliveryRecord, DeliveryStatus, LoadSession, LoadSessionStatus, NewLoadSession,
    Transaction, TransactionKind, TransactionType,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Identity recorded when no user is signed in.
pub const ANONYMOUS_USER: &str = "anonymous";
