//! # Oil Type Repository
//!
//! CRUD for oil grades plus the cascading delete.
//!
//! ## Cascade
//! ```text
//! delete_cascade("diesel")        ── one SQLite transaction ──
//!   ├── DELETE transactions   WHERE oil_type_id = 'diesel'
//!   ├── DELETE load_sessions  WHERE oil_type_id = 'diesel'
//!   ├── DELETE deliveries     WHERE oil_type_id = 'diesel'
//!   └── DELETE oil_types      WHERE id = 'diesel'
//!   any failure ──► ROLLBACK, nothing removed
//! ```

use sqlx::SqlitePool;
use tracing::{debug, info};

use oiltrack_core::OilType;

use super::{decode_ts, encode_ts, CascadeReport};
use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;

#[derive(Debug, sqlx::FromRow)]
struct OilTypeRow {
    id: String,
    name: String,
    color: String,
    active: bool,
    created_at: String,
}

impl OilTypeRow {
    fn into_oil_type(self) -> DbResult<OilType> {
        Ok(OilType {
            created_at: decode_ts("OilType", &self.id, &self.created_at)?,
            id: self.id,
            name: self.name,
            color: self.color,
            active: self.active,
        })
    }
}

const SELECT_OIL_TYPE: &str = "SELECT id, name, color, active, created_at FROM oil_types";

/// Repository for oil type operations.
#[derive(Debug, Clone)]
pub struct OilTypeRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl OilTypeRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        OilTypeRepository { pool, retry }
    }

    /// All oil types, oldest first.
    pub async fn list(&self) -> DbResult<Vec<OilType>> {
        self.retry.run("list_oil_types", || self.list_once()).await
    }

    async fn list_once(&self) -> DbResult<Vec<OilType>> {
        let rows: Vec<OilTypeRow> =
            sqlx::query_as(&format!("{SELECT_OIL_TYPE} ORDER BY created_at, rowid"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(OilTypeRow::into_oil_type).collect()
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<OilType>> {
        self.retry.run("get_oil_type", || self.get_once(id)).await
    }

    async fn get_once(&self, id: &str) -> DbResult<Option<OilType>> {
        let row: Option<OilTypeRow> = sqlx::query_as(&format!("{SELECT_OIL_TYPE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OilTypeRow::into_oil_type).transpose()
    }

    pub async fn insert(&self, oil_type: &OilType) -> DbResult<()> {
        self.retry
            .run("insert_oil_type", || self.insert_once(oil_type))
            .await
    }

    async fn insert_once(&self, oil_type: &OilType) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO oil_types (id, name, color, active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&oil_type.id)
        .bind(&oil_type.name)
        .bind(&oil_type.color)
        .bind(oil_type.active)
        .bind(encode_ts(oil_type.created_at))
        .execute(&self.pool)
        .await?;

        debug!(id = %oil_type.id, name = %oil_type.name, "Inserted oil type");
        Ok(())
    }

    /// Writes the mutable fields back. `NotFound` if the id is unknown.
    pub async fn update(&self, oil_type: &OilType) -> DbResult<()> {
        self.retry
            .run("update_oil_type", || self.update_once(oil_type))
            .await
    }

    async fn update_once(&self, oil_type: &OilType) -> DbResult<()> {
        let result = sqlx::query("UPDATE oil_types SET name = ?2, color = ?3, active = ?4 WHERE id = ?1")
            .bind(&oil_type.id)
            .bind(&oil_type.name)
            .bind(&oil_type.color)
            .bind(oil_type.active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OilType", &oil_type.id));
        }
        Ok(())
    }

    /// Deletes the oil type and every ledger row that references it.
    pub async fn delete_cascade(&self, id: &str) -> DbResult<CascadeReport> {
        self.retry
            .run("delete_oil_type", || self.delete_cascade_once(id))
            .await
    }

    async fn delete_cascade_once(&self, id: &str) -> DbResult<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let transactions = sqlx::query("DELETE FROM transactions WHERE oil_type_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let load_sessions = sqlx::query("DELETE FROM load_sessions WHERE oil_type_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deliveries = sqlx::query("DELETE FROM deliveries WHERE oil_type_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM oil_types WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("OilType", id));
        }
        tx.commit().await?;

        let report = CascadeReport {
            transactions,
            deliveries,
            load_sessions,
        };
        info!(
            id,
            transactions, load_sessions, deliveries, "Deleted oil type with dependents"
        );
        Ok(report)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::{self, count};

    #[tokio::test]
    async fn test_insert_list_update() {
        let db = testing::db().await;
        let repo = db.oil_types();

        let mut diesel = testing::oil_type("Diesel");
        repo.insert(&diesel).await.unwrap();
        repo.insert(&testing::oil_type("Petrol")).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], diesel);

        diesel.color = "#000000".into();
        diesel.active = false;
        repo.update(&diesel).await.unwrap();
        let stored = repo.get(&diesel.id).await.unwrap().unwrap();
        assert_eq!(stored.color, "#000000");
        assert!(!stored.active);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let db = testing::db().await;
        let err = db
            .oil_types()
            .update(&testing::oil_type("Ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cascade_removes_sessions_transactions_deliveries() {
        let db = testing::db().await;
        let diesel = testing::oil_type("Diesel");
        let petrol = testing::oil_type("Petrol");
        db.oil_types().insert(&diesel).await.unwrap();
        db.oil_types().insert(&petrol).await.unwrap();
        let branch = testing::branch("North");
        db.branches().insert(&branch).await.unwrap();

        let session = testing::open_session(&db, &diesel, 1000.0).await;
        testing::supply(&db, &session.load_session_id, &branch, &diesel, 300.0).await;
        let other = testing::open_session(&db, &petrol, 500.0).await;
        testing::supply(&db, &other.load_session_id, &branch, &petrol, 100.0).await;

        let report = db.oil_types().delete_cascade(&diesel.id).await.unwrap();
        assert_eq!(report.load_sessions, 1);
        assert_eq!(report.transactions, 2);
        assert_eq!(report.deliveries, 1);

        assert!(db.oil_types().get(&diesel.id).await.unwrap().is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM transactions WHERE oil_type_id = ?1", &diesel.id).await, 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM transactions WHERE oil_type_id = ?1", &petrol.id).await, 2);
        assert_eq!(db.load_sessions().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cascade_failure_leaves_everything() {
        let db = testing::db().await;
        let diesel = testing::oil_type("Diesel");
        db.oil_types().insert(&diesel).await.unwrap();
        let branch = testing::branch("North");
        db.branches().insert(&branch).await.unwrap();
        let session = testing::open_session(&db, &diesel, 1000.0).await;
        testing::supply(&db, &session.load_session_id, &branch, &diesel, 300.0).await;

        sqlx::query(
            "CREATE TRIGGER fail_oil_type_delete BEFORE DELETE ON oil_types \
             BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
        )
        .execute(db.pool())
        .await
        .unwrap();

        assert!(db.oil_types().delete_cascade(&diesel.id).await.is_err());

        assert!(db.oil_types().get(&diesel.id).await.unwrap().is_some());
        assert_eq!(db.load_sessions().list().await.unwrap().len(), 1);
        assert_eq!(db.transactions().list_all().await.unwrap().len(), 2);
        assert_eq!(db.deliveries().list().await.unwrap().len(), 1);
    }
}
