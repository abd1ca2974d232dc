//! # Delivery Service
//!
//! Records supplies against load sessions and repairs photo watermarks.
//!
//! ## Supply Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SupplyForm ──validate──► DeliveryRecord                                │
//! │                              │                                          │
//! │                              ▼                                          │
//! │               resolve branch address (failure → "")                     │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  ┌────────────────── one store transaction ─────────────────────────┐  │
//! │  │  insert delivery  →  insert supply entry  →  rescan supplies     │  │
//! │  │  →  rebalance session (skipped when the session doesn't exist)   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{debug, error, info, warn};

use oiltrack_core::validation::SupplyForm;
use oiltrack_core::{Delivery, DeliveryRecord, LoadSession, Photos, Transaction};

use crate::context::LedgerContext;
use crate::error::LedgerResult;
use crate::photos::{watermark_text, PhotoResult};

/// What a recorded supply produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyReceipt {
    pub delivery: Delivery,
    pub transaction: Transaction,
    /// Session after rebalancing; `None` for direct supplies.
    pub session: Option<LoadSession>,
    pub newly_completed: bool,
}

pub struct DeliveryService<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> DeliveryService<'a> {
    pub(crate) fn new(ctx: &'a LedgerContext) -> Self {
        DeliveryService { ctx }
    }

    /// Records a supply and rebalances its session.
    pub async fn complete_delivery(&self, record: DeliveryRecord) -> LedgerResult<Delivery> {
        Ok(self.record_supply(record).await?.delivery)
    }

    /// Validates a driver's form, fills in the session and order ids it left
    /// blank, then records the supply.
    ///
    /// ## Errors
    /// - `MissingInformation` when liters, branch or oil type is missing
    /// - `InvalidMeterReadings` when start > end
    pub async fn submit_supply_form(&self, mut form: SupplyForm) -> LedgerResult<SupplyReceipt> {
        if form.driver_uid.is_none() {
            form.driver_uid = self.ctx.identity().current_user_id();
        }
        let record = form.into_record(Utc::now())?;
        self.record_supply(record).await
    }

    pub async fn record_supply(&self, record: DeliveryRecord) -> LedgerResult<SupplyReceipt> {
        record.validate()?;

        let address = self.branch_address(&record.branch_id).await;
        let now = Utc::now();
        let delivery = record.into_delivery(address, now);
        let transaction = delivery.supply_transaction();

        let outcome = self
            .ctx
            .db()
            .ledger()
            .record_supply(&delivery, &transaction, now)
            .await?;

        if delivery.is_direct() {
            debug!(load_session_id = %delivery.load_session_id, "Direct supply recorded");
        }

        Ok(SupplyReceipt {
            delivery,
            transaction,
            session: outcome.session,
            newly_completed: outcome.newly_completed,
        })
    }

    /// Branch address, or an empty string when the lookup fails.
    async fn branch_address(&self, branch_id: &str) -> String {
        match self.ctx.db().branches().get(branch_id).await {
            Ok(Some(branch)) => branch.address,
            Ok(None) => {
                warn!(branch_id, "Branch not found, recording supply without address");
                String::new()
            }
            Err(e) => {
                warn!(branch_id, error = %e, "Branch lookup failed, recording supply without address");
                String::new()
            }
        }
    }

    /// End meter of the most recent supply that has one.
    pub async fn suggested_start_meter(&self) -> LedgerResult<Option<f64>> {
        Ok(self.ctx.db().transactions().latest_end_meter().await?)
    }

    /// Deliveries, newest first.
    pub async fn list(&self) -> LedgerResult<Vec<Delivery>> {
        Ok(self.ctx.db().deliveries().list().await?)
    }

    // =========================================================================
    // Watermark Repair
    // =========================================================================

    /// Re-stamps every photo of `transaction` with `<branch> | <local time>`
    /// and stores the new URLs.
    ///
    /// A photo that cannot be fetched, stamped or uploaded keeps its old URL.
    /// If the final write fails the transaction comes back unchanged.
    pub async fn update_photos_with_correct_watermarks(
        &self,
        transaction: Transaction,
        branch_name: &str,
    ) -> Transaction {
        let text = watermark_text(branch_name, transaction.timestamp, &self.ctx.tz());

        let mut repaired = Photos::new();
        for (slot, url) in transaction.photos.iter() {
            match self.rewatermark(url, &text).await {
                Ok(new_url) => repaired.insert(slot, new_url),
                Err(e) => {
                    warn!(
                        transaction_id = %transaction.id,
                        slot,
                        error = %e,
                        "Watermark repair failed, keeping original photo"
                    );
                    repaired.insert(slot, url);
                }
            }
        }

        match self
            .ctx
            .db()
            .transactions()
            .update_photos(&transaction.id, &repaired)
            .await
        {
            Ok(()) => {
                info!(
                    transaction_id = %transaction.id,
                    photos = repaired.len(),
                    "Photo watermarks repaired"
                );
                Transaction {
                    photos: repaired,
                    ..transaction
                }
            }
            Err(e) => {
                error!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "Saving repaired photos failed, transaction unchanged"
                );
                transaction
            }
        }
    }

    async fn rewatermark(&self, url: &str, text: &str) -> PhotoResult<String> {
        let original = self.ctx.photos().fetch(url).await?;
        let stamped = self.ctx.watermarker().watermark(&original, text)?;
        self.ctx
            .photos()
            .upload(stamped, &self.ctx.config().photos.delivery_folder)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use oiltrack_core::ledger::{is_direct_session, LoadSessionStatus};
    use oiltrack_core::photo_keys;
    use oiltrack_core::validation::SupplyForm;
    use oiltrack_core::{Role, ValidationError};

    use super::*;
    use crate::error::LedgerError;
    use crate::identity::StaticIdentity;
    use crate::photos::{PhotoError, PhotoStore, Watermarker, DELIVERY_PHOTOS_FOLDER};
    use crate::testing;

    /// Prefixes the caption so tests can see what was stamped.
    #[derive(Default)]
    struct CaptionWatermarker {
        captions: Mutex<Vec<String>>,
    }

    impl Watermarker for CaptionWatermarker {
        fn watermark(&self, image: &[u8], text: &str) -> PhotoResult<Vec<u8>> {
            self.captions.lock().unwrap().push(text.to_string());
            let mut out = text.as_bytes().to_vec();
            out.extend_from_slice(image);
            Ok(out)
        }
    }

    struct FailingWatermarker;

    impl Watermarker for FailingWatermarker {
        fn watermark(&self, _image: &[u8], _text: &str) -> PhotoResult<Vec<u8>> {
            Err(PhotoError::Watermark("codec unavailable".into()))
        }
    }

    fn form(session_id: Option<&str>, liters: Option<f64>) -> SupplyForm {
        SupplyForm {
            load_session_id: session_id.map(Into::into),
            delivery_order_id: None,
            branch_id: String::new(),
            branch_name: String::new(),
            oil_type_id: String::new(),
            oil_type_name: String::new(),
            oil_supplied_liters: liters,
            start_meter_reading: None,
            end_meter_reading: None,
            photos: Photos::new(),
            driver_uid: None,
            driver_name: None,
        }
    }

    #[tokio::test]
    async fn test_thousand_six_hundred_four_hundred() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 1000.0))
            .await
            .unwrap();

        let first = ctx
            .deliveries()
            .record_supply(testing::record(&session.load_session_id, &branch, &diesel, 600.0))
            .await
            .unwrap();
        let after_first = first.session.unwrap();
        assert_eq!(after_first.remaining_liters, 400.0);
        assert_eq!(after_first.status, LoadSessionStatus::Active);
        assert!(!first.newly_completed);

        let second = ctx
            .deliveries()
            .record_supply(testing::record(&session.load_session_id, &branch, &diesel, 400.0))
            .await
            .unwrap();
        let after_second = second.session.unwrap();
        assert_eq!(after_second.remaining_liters, 0.0);
        assert_eq!(after_second.total_supplied, 1000.0);
        assert_eq!(after_second.status, LoadSessionStatus::Completed);
        assert!(after_second.completed_at.is_some());
        assert!(second.newly_completed);
    }

    #[tokio::test]
    async fn test_branch_address_is_resolved() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "Harbour").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 500.0))
            .await
            .unwrap();

        let delivery = ctx
            .deliveries()
            .complete_delivery(testing::record(&session.load_session_id, &branch, &diesel, 50.0))
            .await
            .unwrap();
        assert_eq!(delivery.branch_address, "1 Harbour Road");
    }

    #[tokio::test]
    async fn test_unknown_branch_records_empty_address() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let mut branch = testing::branch(&ctx, "Ghost").await;
        branch.id = "missing-branch".into();
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 500.0))
            .await
            .unwrap();

        let receipt = ctx
            .deliveries()
            .record_supply(testing::record(&session.load_session_id, &branch, &diesel, 50.0))
            .await
            .unwrap();
        assert_eq!(receipt.delivery.branch_address, "");
        assert_eq!(receipt.session.unwrap().remaining_liters, 450.0);
    }

    #[tokio::test]
    async fn test_direct_supply_skips_balance() {
        let (ctx, _) = testing::ctx().await;
        let ctx = ctx.with_identity(Arc::new(StaticIdentity::new("driver-4", Role::Driver)));
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;

        let mut direct = form(None, Some(75.0));
        direct.branch_id = branch.id.clone();
        direct.branch_name = branch.name.clone();
        direct.oil_type_id = diesel.id.clone();
        direct.oil_type_name = diesel.name.clone();

        let receipt = ctx.deliveries().submit_supply_form(direct).await.unwrap();
        assert!(is_direct_session(&receipt.delivery.load_session_id));
        assert!(receipt.delivery.delivery_order_id.starts_with("DO_"));
        assert_eq!(receipt.delivery.driver_uid.as_deref(), Some("driver-4"));
        assert!(receipt.session.is_none());
        assert!(ctx.ledger().all_sessions().await.unwrap().is_empty());
        assert_eq!(ctx.reporting().all_transactions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_form_writes_nothing() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 500.0))
            .await
            .unwrap();

        for liters in [Some(0.0), Some(-5.0), None] {
            let mut bad = form(Some(&session.load_session_id), liters);
            bad.branch_id = branch.id.clone();
            bad.oil_type_id = diesel.id.clone();
            let err = ctx.deliveries().submit_supply_form(bad).await.unwrap_err();
            match err {
                LedgerError::Validation(e @ ValidationError::MissingInformation { .. }) => {
                    assert_eq!(e.title(), "Missing Information")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let mut meters = form(Some(&session.load_session_id), Some(10.0));
        meters.branch_id = branch.id.clone();
        meters.oil_type_id = diesel.id.clone();
        meters.start_meter_reading = Some(500.0);
        meters.end_meter_reading = Some(400.0);
        let err = ctx.deliveries().submit_supply_form(meters).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidMeterReadings { .. })
        ));

        assert!(ctx.deliveries().list().await.unwrap().is_empty());
        let stored = ctx.ledger().get_session(&session.load_session_id).await.unwrap();
        assert_eq!(stored.remaining_liters, 500.0);
    }

    #[tokio::test]
    async fn test_suggested_start_meter() {
        let (ctx, _) = testing::ctx().await;
        assert_eq!(ctx.deliveries().suggested_start_meter().await.unwrap(), None);

        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 500.0))
            .await
            .unwrap();
        ctx.deliveries()
            .complete_delivery(testing::record(&session.load_session_id, &branch, &diesel, 40.0))
            .await
            .unwrap();

        assert_eq!(
            ctx.deliveries().suggested_start_meter().await.unwrap(),
            Some(140.0)
        );
    }

    #[tokio::test]
    async fn test_watermark_repair_replaces_photos() {
        let (ctx, store) = testing::ctx().await;
        let marker = Arc::new(CaptionWatermarker::default());
        let ctx = ctx.with_watermarker(marker.clone());
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 500.0))
            .await
            .unwrap();

        let good = testing::photo(&store, DELIVERY_PHOTOS_FOLDER, b"before").await;
        let mut record = testing::record(&session.load_session_id, &branch, &diesel, 50.0);
        record.photos = Photos::new()
            .with(photo_keys::TANK_LEVEL_BEFORE, good.clone())
            .with(photo_keys::HOSE_CONNECTION, "memory://delivery-photos/gone.jpg");
        let receipt = ctx.deliveries().record_supply(record).await.unwrap();

        let repaired = ctx
            .deliveries()
            .update_photos_with_correct_watermarks(receipt.transaction.clone(), "North")
            .await;

        let new_url = repaired.photos.get(photo_keys::TANK_LEVEL_BEFORE).unwrap();
        assert_ne!(new_url, good);
        assert!(new_url.starts_with("memory://delivery-photos/"));
        assert_eq!(
            repaired.photos.get(photo_keys::HOSE_CONNECTION),
            Some("memory://delivery-photos/gone.jpg")
        );

        let stamped = store.fetch(new_url).await.unwrap();
        assert!(stamped.starts_with(b"North | "));
        assert_eq!(marker.captions.lock().unwrap().len(), 1);

        let stored = ctx
            .db()
            .transactions()
            .get(&receipt.transaction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.photos, repaired.photos);
    }

    #[tokio::test]
    async fn test_watermark_failure_keeps_originals() {
        let (ctx, store) = testing::ctx().await;
        let ctx = ctx.with_watermarker(Arc::new(FailingWatermarker));
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;

        let url = testing::photo(&store, DELIVERY_PHOTOS_FOLDER, b"img").await;
        let mut record = testing::record("DIRECT_1", &branch, &diesel, 20.0);
        record.photos = Photos::new().with(photo_keys::TANK_LEVEL_AFTER, url.clone());
        let receipt = ctx.deliveries().record_supply(record).await.unwrap();

        let repaired = ctx
            .deliveries()
            .update_photos_with_correct_watermarks(receipt.transaction.clone(), "North")
            .await;
        assert_eq!(repaired.photos, receipt.transaction.photos);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_watermark_repair_returns_original_when_save_fails() {
        let (ctx, store) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;

        let url = testing::photo(&store, DELIVERY_PHOTOS_FOLDER, b"img").await;
        let mut record = testing::record("DIRECT_2", &branch, &diesel, 20.0);
        record.photos = Photos::new().with(photo_keys::TANK_LEVEL_AFTER, url);
        let mut transaction = ctx.deliveries().record_supply(record).await.unwrap().transaction;
        transaction.id = "no-such-transaction".into();

        let result = ctx
            .deliveries()
            .update_photos_with_correct_watermarks(transaction.clone(), "North")
            .await;
        assert_eq!(result, transaction);
    }
}
