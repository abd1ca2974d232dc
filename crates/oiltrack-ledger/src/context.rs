//! # Ledger Context
//!
//! Everything a service needs, built once and passed in explicitly.
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         LedgerContext                                   │
//! │                                                                         │
//! │   Database ─────────── SqlitePool + RetryPolicy                         │
//! │   Arc<dyn PhotoStore>  memory (tests) / local filesystem (CLI)          │
//! │   Arc<dyn Identity>    current uid + role                               │
//! │   Arc<dyn Watermarker> caption stamping                                 │
//! │   Arc<OilTrackConfig>  folders, reporting offset                        │
//! │                                                                         │
//! │   ctx.ledger()      ctx.deliveries()   ctx.reporting()                  │
//! │   ctx.reference()   ctx.workflow()     ctx.maintenance()                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cloning is cheap; every field is reference counted.

use std::fmt;
use std::sync::Arc;

use chrono::FixedOffset;
use tracing::info;

use oiltrack_db::Database;

use crate::config::OilTrackConfig;
use crate::delivery::DeliveryService;
use crate::error::LedgerResult;
use crate::identity::{AnonymousIdentity, Identity};
use crate::ledger::LedgerService;
use crate::maintenance::MaintenanceService;
use crate::photos::{LocalPhotoStore, PassthroughWatermarker, PhotoStore, Watermarker};
use crate::reference::ReferenceService;
use crate::reporting::ReportingService;
use crate::workflow::WorkflowService;

#[derive(Clone)]
pub struct LedgerContext {
    db: Database,
    photos: Arc<dyn PhotoStore>,
    identity: Arc<dyn Identity>,
    watermarker: Arc<dyn Watermarker>,
    config: Arc<OilTrackConfig>,
}

impl fmt::Debug for LedgerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerContext")
            .field("db", &self.db)
            .field("user", &self.identity.current_user_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LedgerContext {
    /// Anonymous identity and a passthrough watermarker until replaced.
    pub fn new(db: Database, photos: Arc<dyn PhotoStore>, config: OilTrackConfig) -> Self {
        LedgerContext {
            db,
            photos,
            identity: Arc::new(AnonymousIdentity),
            watermarker: Arc::new(PassthroughWatermarker),
            config: Arc::new(config),
        }
    }

    /// Opens the configured database and a local photo store under
    /// `photos.root`.
    pub async fn from_config(config: OilTrackConfig) -> LedgerResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let photos = Arc::new(LocalPhotoStore::new(config.photos.root.clone()));
        info!(
            database = ?config.database.path,
            photos = ?config.photos.root,
            "Ledger context ready"
        );
        Ok(LedgerContext::new(db, photos, config))
    }

    pub fn with_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_watermarker(mut self, watermarker: Arc<dyn Watermarker>) -> Self {
        self.watermarker = watermarker;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn photos(&self) -> &dyn PhotoStore {
        self.photos.as_ref()
    }

    pub fn identity(&self) -> &dyn Identity {
        self.identity.as_ref()
    }

    pub fn watermarker(&self) -> &dyn Watermarker {
        self.watermarker.as_ref()
    }

    pub fn config(&self) -> &OilTrackConfig {
        &self.config
    }

    /// Offset for local dates.
    pub fn tz(&self) -> FixedOffset {
        self.config.reporting_offset()
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn ledger(&self) -> LedgerService<'_> {
        LedgerService::new(self)
    }

    pub fn deliveries(&self) -> DeliveryService<'_> {
        DeliveryService::new(self)
    }

    pub fn reporting(&self) -> ReportingService<'_> {
        ReportingService::new(self)
    }

    pub fn reference(&self) -> ReferenceService<'_> {
        ReferenceService::new(self)
    }

    pub fn workflow(&self) -> WorkflowService<'_> {
        WorkflowService::new(self)
    }

    pub fn maintenance(&self) -> MaintenanceService<'_> {
        MaintenanceService::new(self)
    }
}
