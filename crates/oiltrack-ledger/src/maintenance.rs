//! # Maintenance Service
//!
//! Admin housekeeping: purge by creation date, photo cleanup, store usage.
//!
//! ## When To Reconcile
//! Purging `transactions` or `deliveries` leaves session balances as they
//! were. Run `LedgerService::reconcile_all` afterwards if the balances should
//! follow the trimmed log.

use chrono::NaiveDate;
use tracing::{info, warn};

use oiltrack_core::export::DateRange;
use oiltrack_core::report::StoreUsage;
use oiltrack_core::{Collection, Photos};

use crate::context::LedgerContext;
use crate::error::LedgerResult;

pub struct MaintenanceService<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> MaintenanceService<'a> {
    pub(crate) fn new(ctx: &'a LedgerContext) -> Self {
        MaintenanceService { ctx }
    }

    /// Deletes records of `collection` created between `start` and the end of
    /// `end`. Returns how many went.
    ///
    /// ## Errors
    /// - `UnknownCollection` for a name outside the purgeable set
    /// - `InvalidDateRange` when start is after end
    pub async fn delete_records_by_date_range(
        &self,
        collection: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<u64> {
        let collection: Collection = collection.parse()?;
        let range = DateRange::new(start, end)?;
        let deleted = self
            .ctx
            .db()
            .maintenance()
            .purge_created_between(collection, range.start_instant(), range.end_instant())
            .await?;

        if deleted > 0 && matches!(collection, Collection::Transactions | Collection::Deliveries) {
            warn!(
                collection = %collection,
                deleted,
                "Ledger rows purged; session balances are unchanged until reconciled"
            );
        }
        Ok(deleted)
    }

    /// Record counts per collection.
    pub async fn usage(&self) -> LedgerResult<StoreUsage> {
        let counts = self.ctx.db().maintenance().counts().await?;
        Ok(StoreUsage::from_counts(
            counts
                .into_iter()
                .map(|(c, n)| (c.as_str().to_string(), n))
                .collect(),
        ))
    }

    /// Deletes stored photos of entries in the range and clears their photo
    /// maps. Only blobs in the managed folders are deleted; a failed delete
    /// is skipped. Returns the number of blobs deleted.
    pub async fn delete_photos_in_date_range(&self, range: DateRange) -> LedgerResult<u64> {
        let transactions = self
            .ctx
            .db()
            .transactions()
            .list_between(range.start_instant(), range.end_instant())
            .await?;

        let folders = &self.ctx.config().photos;
        let mut deleted = 0u64;
        for tx in transactions.iter().filter(|t| !t.photos.is_empty()) {
            for (slot, url) in tx.photos.iter() {
                if !folders.is_managed(url) {
                    continue;
                }
                match self.ctx.photos().delete(url).await {
                    Ok(()) => deleted += 1,
                    Err(e) => warn!(transaction_id = %tx.id, slot, error = %e, "Photo delete failed"),
                }
            }

            if let Err(e) = self
                .ctx
                .db()
                .transactions()
                .update_photos(&tx.id, &Photos::new())
                .await
            {
                warn!(transaction_id = %tx.id, error = %e, "Clearing photo references failed");
            }
        }

        info!(start = %range.start, end = %range.end, deleted, "Photos purged");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use oiltrack_core::{photo_keys, CoreError};

    use super::*;
    use crate::config::OilTrackConfig;
    use crate::error::LedgerError;
    use crate::photos::{DELIVERY_PHOTOS_FOLDER, LOADING_PHOTOS_FOLDER};
    use crate::testing;

    #[tokio::test]
    async fn test_purge_by_collection_name() {
        let (ctx, _) = testing::ctx().await;
        testing::oil_type(&ctx, "Diesel").await;
        testing::oil_type(&ctx, "Petrol").await;
        testing::branch(&ctx, "North").await;
        let today = Utc::now().date_naive();

        let deleted = ctx
            .maintenance()
            .delete_records_by_date_range("oilTypes", today, today)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(ctx.reference().list_oil_types().await.unwrap().is_empty());
        assert_eq!(ctx.reference().list_branches().await.unwrap().len(), 1);

        let yesterday = today - Duration::days(1);
        let none = ctx
            .maintenance()
            .delete_records_by_date_range("branches", yesterday, yesterday)
            .await
            .unwrap();
        assert_eq!(none, 0);
    }

    #[tokio::test]
    async fn test_purge_rejects_bad_input() {
        let (ctx, _) = testing::ctx().await;
        let today = Utc::now().date_naive();

        let err = ctx
            .maintenance()
            .delete_records_by_date_range("invoices", today, today)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::UnknownCollection(ref c)) if c == "invoices"));

        let err = ctx
            .maintenance()
            .delete_records_by_date_range("tasks", today, today - Duration::days(3))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidDateRange { .. })));
    }

    #[tokio::test]
    async fn test_purged_transactions_need_reconcile() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 1000.0))
            .await
            .unwrap();
        ctx.deliveries()
            .complete_delivery(testing::record(&session.load_session_id, &branch, &diesel, 400.0))
            .await
            .unwrap();
        let today = Utc::now().date_naive();

        let deleted = ctx
            .maintenance()
            .delete_records_by_date_range("transactions", today, today)
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let stored = ctx.ledger().get_session(&session.load_session_id).await.unwrap();
        assert_eq!(stored.remaining_liters, 600.0);

        let drifted = ctx.ledger().reconcile_all().await.unwrap();
        assert_eq!(drifted.len(), 1);
        let healed = ctx.ledger().get_session(&session.load_session_id).await.unwrap();
        assert_eq!(healed.remaining_liters, 1000.0);
    }

    #[tokio::test]
    async fn test_usage_counts() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        ctx.ledger()
            .create_load_session(testing::load_request(&diesel, 100.0))
            .await
            .unwrap();

        let usage = ctx.maintenance().usage().await.unwrap();
        assert_eq!(usage.collections.len(), 8);
        assert_eq!(usage.total_documents, 3);
        assert_eq!(usage.estimated_size, 6);
        let sessions = usage
            .collections
            .iter()
            .find(|c| c.name == "loadSessions")
            .unwrap();
        assert_eq!(sessions.count, 1);
    }

    #[tokio::test]
    async fn test_photo_purge_only_deletes_managed_blobs() {
        let (ctx, store) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;

        let delivered = testing::photo(&store, DELIVERY_PHOTOS_FOLDER, b"a").await;
        let loaded = testing::photo(&store, LOADING_PHOTOS_FOLDER, b"b").await;
        let foreign = testing::photo(&store, "avatars/", b"c").await;

        let mut record = testing::record("DIRECT_1", &branch, &diesel, 10.0);
        record.photos = Photos::new()
            .with(photo_keys::TANK_LEVEL_BEFORE, delivered.clone())
            .with(photo_keys::TANK_LEVEL_AFTER, loaded.clone())
            .with(photo_keys::HOSE_CONNECTION, foreign.clone());
        let tx = ctx.deliveries().record_supply(record).await.unwrap().transaction;

        let today = Utc::now().date_naive();
        let range = DateRange::new(today, today).unwrap();
        let deleted = ctx.maintenance().delete_photos_in_date_range(range).await.unwrap();
        assert_eq!(deleted, 2);

        assert!(!store.contains(&delivered).await);
        assert!(!store.contains(&loaded).await);
        assert!(store.contains(&foreign).await);

        let stored = ctx.db().transactions().get(&tx.id).await.unwrap().unwrap();
        assert!(stored.photos.is_empty());
        assert_eq!(
            ctx.reporting().photo_statistics(range).await.unwrap().photo_count,
            0
        );
    }

    #[tokio::test]
    async fn test_photo_purge_uses_configured_folders() {
        let mut config = OilTrackConfig::default();
        config.photos.delivery_folder = "site-a/".into();
        config.photos.loading_folder = "site-a-loads/".into();
        let (ctx, store) = testing::ctx_with(config).await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;

        let before = testing::photo(&store, "site-a/", b"before").await;
        let mut record = testing::record("DIRECT_1", &branch, &diesel, 10.0);
        record.photos = Photos::new().with(photo_keys::TANK_LEVEL_BEFORE, before);
        let tx = ctx.deliveries().record_supply(record).await.unwrap().transaction;

        let repaired = ctx
            .deliveries()
            .update_photos_with_correct_watermarks(tx, &branch.name)
            .await;
        let repaired_url = repaired
            .photos
            .get(photo_keys::TANK_LEVEL_BEFORE)
            .unwrap()
            .to_string();
        assert!(repaired_url.starts_with("memory://site-a/"));

        let today = Utc::now().date_naive();
        let range = DateRange::new(today, today).unwrap();
        let deleted = ctx.maintenance().delete_photos_in_date_range(range).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!store.contains(&repaired_url).await);
    }
}
