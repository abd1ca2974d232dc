//! # oiltrack-ledger: Services for the OilTrack Ledger
//!
//! Everything the CLI and dashboards call. Each service borrows one
//! [`LedgerContext`] and goes through the store's atomic ledger writes.
//!
//! ## Service Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LedgerContext                                    │
//! │         Database • PhotoStore • Identity • Watermarker • Config         │
//! │                                                                         │
//! │   ledger()       open sessions, balances, reconcile                     │
//! │   deliveries()   record supplies, repair watermarks                     │
//! │   reporting()    enriched lists, CSV, daily totals, photo ZIP           │
//! │   reference()    oil types, branches, drivers (cascade deletes)         │
//! │   workflow()     tasks, complaints                                      │
//! │   maintenance()  purge by date, photo purge, usage                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use oiltrack_ledger::{LedgerContext, OilTrackConfig};
//! use oiltrack_core::NewLoadSession;
//!
//! # async fn run() -> oiltrack_ledger::LedgerResult<()> {
//! let ctx = LedgerContext::from_config(OilTrackConfig::load(None)?).await?;
//! let session = ctx
//!     .ledger()
//!     .create_load_session(NewLoadSession {
//!         oil_type_id: "diesel".into(),
//!         oil_type_name: "Diesel".into(),
//!         total_loaded_liters: 1000.0,
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{}", session.load_session_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod delivery;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod maintenance;
pub mod photos;
pub mod reference;
pub mod reporting;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::OilTrackConfig;
pub use context::LedgerContext;
pub use delivery::{DeliveryService, SupplyReceipt};
pub use error::{LedgerError, LedgerResult};
pub use identity::{AnonymousIdentity, Identity, StaticIdentity};
pub use ledger::LedgerService;
pub use maintenance::MaintenanceService;
pub use photos::{
    LocalPhotoStore, MemoryPhotoStore, PassthroughWatermarker, PhotoError, PhotoStore,
    Watermarker,
};
pub use reference::ReferenceService;
pub use reporting::{CsvExport, PhotoArchive, ReportingService};
pub use workflow::WorkflowService;
