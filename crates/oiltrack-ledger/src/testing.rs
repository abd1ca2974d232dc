//! Fixtures shared by the service tests.

use std::sync::Arc;

use oiltrack_core::{Branch, DeliveryRecord, NewBranch, NewLoadSession, NewOilType, OilType, Photos};
use oiltrack_db::{Database, DbConfig};

use crate::config::OilTrackConfig;
use crate::context::LedgerContext;
use crate::photos::{MemoryPhotoStore, PhotoStore};

/// In-memory store and photo store, reporting in UTC.
pub(crate) async fn ctx() -> (LedgerContext, Arc<MemoryPhotoStore>) {
    ctx_with(OilTrackConfig::default()).await
}

/// Like [`ctx`] with caller-supplied settings; reporting is still UTC.
pub(crate) async fn ctx_with(mut config: OilTrackConfig) -> (LedgerContext, Arc<MemoryPhotoStore>) {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    let photos = Arc::new(MemoryPhotoStore::new());
    config.reporting.utc_offset_minutes = Some(0);
    (LedgerContext::new(db, photos.clone(), config), photos)
}

pub(crate) async fn oil_type(ctx: &LedgerContext, name: &str) -> OilType {
    ctx.reference()
        .create_oil_type(NewOilType {
            name: name.into(),
            color: String::new(),
        })
        .await
        .expect("create oil type")
}

pub(crate) async fn branch(ctx: &LedgerContext, name: &str) -> Branch {
    ctx.reference()
        .create_branch(NewBranch {
            name: name.into(),
            address: format!("1 {name} Road"),
            contact_no: "0300-0000000".into(),
            oil_tanks: vec![],
        })
        .await
        .expect("create branch")
}

pub(crate) fn load_request(oil: &OilType, liters: f64) -> NewLoadSession {
    NewLoadSession {
        oil_type_id: oil.id.clone(),
        oil_type_name: oil.name.clone(),
        total_loaded_liters: liters,
        ..Default::default()
    }
}

pub(crate) fn record(session_id: &str, branch: &Branch, oil: &OilType, liters: f64) -> DeliveryRecord {
    DeliveryRecord {
        load_session_id: session_id.into(),
        delivery_order_id: "DO_1".into(),
        branch_id: branch.id.clone(),
        branch_name: branch.name.clone(),
        oil_type_id: oil.id.clone(),
        oil_type_name: oil.name.clone(),
        delivered_liters: liters,
        start_meter_reading: Some(100.0),
        end_meter_reading: Some(100.0 + liters),
        photos: Photos::new(),
        driver_uid: Some("driver-1".into()),
        driver_name: None,
    }
}

/// Uploads a placeholder image and returns its URL.
pub(crate) async fn photo(store: &MemoryPhotoStore, folder: &str, bytes: &[u8]) -> String {
    store
        .upload(bytes.to_vec(), folder)
        .await
        .expect("upload photo")
}
