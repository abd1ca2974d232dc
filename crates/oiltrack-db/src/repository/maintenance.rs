//! # Maintenance Repository
//!
//! Admin housekeeping: bulk delete by creation date and per-table counts.
//!
//! The purge works on one table per call and does not rebalance load
//! sessions; run `LedgerRepository::reconcile_all` after purging ledger rows.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use oiltrack_core::Collection;

use super::encode_ts;
use crate::error::DbResult;
use crate::retry::RetryPolicy;

/// SQL table behind a collection name.
pub fn table_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Users => "users",
        Collection::Deliveries => "deliveries",
        Collection::Complaints => "complaints",
        Collection::Branches => "branches",
        Collection::OilTypes => "oil_types",
        Collection::Tasks => "tasks",
        Collection::LoadSessions => "load_sessions",
        Collection::Transactions => "transactions",
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl MaintenanceRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        MaintenanceRepository { pool, retry }
    }

    /// Deletes rows whose `created_at` lies in `[start, end]`. Returns the
    /// number removed.
    pub async fn purge_created_between(
        &self,
        collection: Collection,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<u64> {
        let table = table_name(collection);
        let (from, to) = (encode_ts(start), encode_ts(end));
        let deleted = self
            .retry
            .run("purge_by_date", || {
                let sql = format!("DELETE FROM {table} WHERE created_at BETWEEN ?1 AND ?2");
                let (from, to) = (from.clone(), to.clone());
                async move {
                    let result = sqlx::query(&sql)
                        .bind(from)
                        .bind(to)
                        .execute(&self.pool)
                        .await?;
                    Ok(result.rows_affected())
                }
            })
            .await?;

        info!(collection = %collection, table, deleted, "Purged records by date range");
        Ok(deleted)
    }

    /// Row count per collection, in `Collection::ALL` order.
    pub async fn counts(&self) -> DbResult<Vec<(Collection, u64)>> {
        self.retry
            .run("collection_counts", || async move {
                let mut counts = Vec::with_capacity(Collection::ALL.len());
                for collection in Collection::ALL {
                    let sql = format!("SELECT COUNT(*) FROM {}", table_name(collection));
                    let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
                    counts.push((collection, count as u64));
                }
                Ok(counts)
            })
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use oiltrack_core::Collection;

    use crate::testing;

    #[tokio::test]
    async fn test_purge_only_touches_range() {
        let db = testing::db().await;
        let now = Utc::now();

        let mut old = testing::oil_type("Kerosene");
        old.created_at = now - Duration::days(40);
        db.oil_types().insert(&old).await.unwrap();
        db.oil_types().insert(&testing::oil_type("Diesel")).await.unwrap();

        let deleted = db
            .maintenance()
            .purge_created_between(
                Collection::OilTypes,
                now - Duration::days(41),
                now - Duration::days(39),
            )
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let left = db.oil_types().list().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "Diesel");
    }

    #[tokio::test]
    async fn test_counts_cover_every_collection() {
        let db = testing::db().await;
        let diesel = testing::oil_type("Diesel");
        db.oil_types().insert(&diesel).await.unwrap();
        let branch = testing::branch("North");
        db.branches().insert(&branch).await.unwrap();
        let session = testing::open_session(&db, &diesel, 500.0).await;
        testing::supply(&db, &session.load_session_id, &branch, &diesel, 50.0).await;

        let counts = db.maintenance().counts().await.unwrap();
        assert_eq!(counts.len(), Collection::ALL.len());
        let get = |c: Collection| counts.iter().find(|(k, _)| *k == c).map(|(_, n)| *n);
        assert_eq!(get(Collection::Transactions), Some(2));
        assert_eq!(get(Collection::Deliveries), Some(1));
        assert_eq!(get(Collection::LoadSessions), Some(1));
        assert_eq!(get(Collection::Users), Some(0));
    }
}
