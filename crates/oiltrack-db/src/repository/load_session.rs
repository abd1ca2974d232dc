//! # Load Session Repository
//!
//! Read side of the `load_sessions` table. Sessions are created and
//! rebalanced only through [`LedgerRepository`](super::ledger::LedgerRepository),
//! which keeps them in step with the transaction log.

use sqlx::{SqliteConnection, SqlitePool};

use oiltrack_core::{LoadSession, LoadSessionStatus};

use super::{decode_opt_ts, decode_ts, encode_opt_ts, encode_ts};
use crate::error::DbResult;
use crate::retry::RetryPolicy;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LoadSessionRow {
    id: String,
    load_session_id: String,
    oil_type_id: String,
    oil_type_name: String,
    total_loaded_liters: f64,
    remaining_liters: f64,
    total_supplied: f64,
    load_count: i64,
    status: LoadSessionStatus,
    load_location_id: Option<String>,
    load_meter_reading: Option<f64>,
    meter_reading_photo: Option<String>,
    created_by: String,
    created_at: String,
    timestamp: String,
    last_supply_at: Option<String>,
    completed_at: Option<String>,
}

impl LoadSessionRow {
    pub(crate) fn into_session(self) -> DbResult<LoadSession> {
        let id = self.load_session_id.as_str();
        let created_at = decode_ts("LoadSession", id, &self.created_at)?;
        let timestamp = decode_ts("LoadSession", id, &self.timestamp)?;
        let last_supply_at = decode_opt_ts("LoadSession", id, self.last_supply_at.as_deref())?;
        let completed_at = decode_opt_ts("LoadSession", id, self.completed_at.as_deref())?;
        Ok(LoadSession {
            id: self.id,
            load_session_id: self.load_session_id,
            oil_type_id: self.oil_type_id,
            oil_type_name: self.oil_type_name,
            total_loaded_liters: self.total_loaded_liters,
            remaining_liters: self.remaining_liters,
            total_supplied: self.total_supplied,
            load_count: self.load_count,
            status: self.status,
            load_location_id: self.load_location_id,
            load_meter_reading: self.load_meter_reading,
            meter_reading_photo: self.meter_reading_photo,
            created_by: self.created_by,
            created_at,
            timestamp,
            last_supply_at,
            completed_at,
        })
    }
}

pub(crate) const SELECT_SESSION: &str = r#"
    SELECT id, load_session_id, oil_type_id, oil_type_name, total_loaded_liters,
           remaining_liters, total_supplied, load_count, status, load_location_id,
           load_meter_reading, meter_reading_photo, created_by, created_at, timestamp,
           last_supply_at, completed_at
    FROM load_sessions
"#;

pub(crate) async fn insert_session(conn: &mut SqliteConnection, s: &LoadSession) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO load_sessions (
            id, load_session_id, oil_type_id, oil_type_name, total_loaded_liters,
            remaining_liters, total_supplied, load_count, status, load_location_id,
            load_meter_reading, meter_reading_photo, created_by, created_at, timestamp,
            last_supply_at, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
    )
    .bind(&s.id)
    .bind(&s.load_session_id)
    .bind(&s.oil_type_id)
    .bind(&s.oil_type_name)
    .bind(s.total_loaded_liters)
    .bind(s.remaining_liters)
    .bind(s.total_supplied)
    .bind(s.load_count)
    .bind(s.status)
    .bind(&s.load_location_id)
    .bind(s.load_meter_reading)
    .bind(&s.meter_reading_photo)
    .bind(&s.created_by)
    .bind(encode_ts(s.created_at))
    .bind(encode_ts(s.timestamp))
    .bind(encode_opt_ts(s.last_supply_at))
    .bind(encode_opt_ts(s.completed_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Persists the balance fields after a reconciliation.
pub(crate) async fn update_balance(conn: &mut SqliteConnection, s: &LoadSession) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE load_sessions
        SET remaining_liters = ?2, total_supplied = ?3, status = ?4,
            last_supply_at = ?5, completed_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(&s.id)
    .bind(s.remaining_liters)
    .bind(s.total_supplied)
    .bind(s.status)
    .bind(encode_opt_ts(s.last_supply_at))
    .bind(encode_opt_ts(s.completed_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_session_id(
    conn: &mut SqliteConnection,
    load_session_id: &str,
) -> DbResult<Option<LoadSession>> {
    let row: Option<LoadSessionRow> =
        sqlx::query_as(&format!("{SELECT_SESSION} WHERE load_session_id = ?1"))
            .bind(load_session_id)
            .fetch_optional(conn)
            .await?;
    row.map(LoadSessionRow::into_session).transpose()
}

#[derive(Debug, Clone)]
pub struct LoadSessionRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl LoadSessionRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        LoadSessionRepository { pool, retry }
    }

    /// Every session, newest first.
    pub async fn list(&self) -> DbResult<Vec<LoadSession>> {
        self.retry
            .run("list_load_sessions", || self.list_where(None))
            .await
    }

    /// Sessions still holding oil, newest first.
    pub async fn list_active(&self) -> DbResult<Vec<LoadSession>> {
        self.retry
            .run("list_active_load_sessions", || {
                self.list_where(Some(LoadSessionStatus::Active))
            })
            .await
    }

    async fn list_where(&self, status: Option<LoadSessionStatus>) -> DbResult<Vec<LoadSession>> {
        let rows: Vec<LoadSessionRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "{SELECT_SESSION} WHERE status = ?1 ORDER BY created_at DESC, rowid DESC"
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "{SELECT_SESSION} ORDER BY created_at DESC, rowid DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(LoadSessionRow::into_session).collect()
    }

    /// Looks a session up by its human-readable `LS_...` id.
    pub async fn get(&self, load_session_id: &str) -> DbResult<Option<LoadSession>> {
        self.retry
            .run("get_load_session", || async move {
                let mut conn = self.pool.acquire().await?;
                find_by_session_id(&mut conn, load_session_id).await
            })
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use oiltrack_core::LoadSessionStatus;

    use crate::testing;

    #[tokio::test]
    async fn test_active_sessions_newest_first() {
        let db = testing::db().await;
        let diesel = testing::oil_type("Diesel");
        db.oil_types().insert(&diesel).await.unwrap();

        let first = testing::open_session(&db, &diesel, 100.0).await;
        let second = testing::open_session(&db, &diesel, 200.0).await;

        let active = db.load_sessions().list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].load_session_id, second.load_session_id);
        assert_eq!(active[1].load_session_id, first.load_session_id);
    }

    #[tokio::test]
    async fn test_completed_sessions_leave_active_list() {
        let db = testing::db().await;
        let diesel = testing::oil_type("Diesel");
        db.oil_types().insert(&diesel).await.unwrap();
        let branch = testing::branch("North");
        db.branches().insert(&branch).await.unwrap();

        let session = testing::open_session(&db, &diesel, 100.0).await;
        testing::supply(&db, &session.load_session_id, &branch, &diesel, 100.0).await;

        assert!(db.load_sessions().list_active().await.unwrap().is_empty());
        let stored = db
            .load_sessions()
            .get(&session.load_session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, LoadSessionStatus::Completed);
        assert_eq!(db.load_sessions().list().await.unwrap().len(), 1);
    }
}
