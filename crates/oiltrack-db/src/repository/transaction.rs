//! # Transaction Repository
//!
//! The append-only ledger. One table holds both kinds; the kind-specific
//! columns are NULL for the other kind.
//!
//! ```text
//! kind     │ location_id meter_reading │ branch_* delivery_order_id *_meter_reading
//! ─────────┼───────────────────────────┼──────────────────────────────────────────
//! loading  │      set         set      │              NULL
//! supply   │     NULL        NULL      │              set
//! ```
//!
//! After insert only the `photos` column is ever rewritten.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use oiltrack_core::ledger::{LoadingDetails, SupplyDetails};
use oiltrack_core::{Photos, Transaction, TransactionKind, TransactionType};

use super::{decode_json, decode_ts, encode_json, encode_ts};
use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    kind: TransactionType,
    load_session_id: String,
    oil_type_id: String,
    oil_type_name: String,
    quantity: f64,
    driver_uid: Option<String>,
    driver_name: Option<String>,
    photos: String,
    timestamp: String,
    created_at: String,
    location_id: Option<String>,
    meter_reading: Option<f64>,
    branch_id: Option<String>,
    branch_name: Option<String>,
    branch_address: Option<String>,
    delivery_order_id: Option<String>,
    start_meter_reading: Option<f64>,
    end_meter_reading: Option<f64>,
}

impl TransactionRow {
    fn into_transaction(self) -> DbResult<Transaction> {
        let kind = match self.kind {
            TransactionType::Loading => TransactionKind::Loading(LoadingDetails {
                location_id: self.location_id,
                meter_reading: self.meter_reading,
            }),
            TransactionType::Supply => {
                let branch_id = self
                    .branch_id
                    .ok_or_else(|| DbError::corrupt("Transaction", &self.id, "supply without branch_id"))?;
                TransactionKind::Supply(SupplyDetails {
                    branch_id,
                    branch_name: self.branch_name.unwrap_or_default(),
                    branch_address: self.branch_address.unwrap_or_default(),
                    delivery_order_id: self.delivery_order_id.unwrap_or_default(),
                    start_meter_reading: self.start_meter_reading,
                    end_meter_reading: self.end_meter_reading,
                })
            }
        };
        let photos: Photos = decode_json("Transaction", &self.id, &self.photos)?;
        Ok(Transaction {
            timestamp: decode_ts("Transaction", &self.id, &self.timestamp)?,
            created_at: decode_ts("Transaction", &self.id, &self.created_at)?,
            id: self.id,
            load_session_id: self.load_session_id,
            oil_type_id: self.oil_type_id,
            oil_type_name: self.oil_type_name,
            quantity: self.quantity,
            driver_uid: self.driver_uid,
            driver_name: self.driver_name,
            photos,
            kind,
        })
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT id, kind, load_session_id, oil_type_id, oil_type_name, quantity, driver_uid,
           driver_name, photos, timestamp, created_at, location_id, meter_reading,
           branch_id, branch_name, branch_address, delivery_order_id,
           start_meter_reading, end_meter_reading
    FROM transactions
"#;

pub(crate) async fn insert_transaction(conn: &mut SqliteConnection, t: &Transaction) -> DbResult<()> {
    let loading = t.loading();
    let supply = t.supply();
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, kind, load_session_id, oil_type_id, oil_type_name, quantity, driver_uid,
            driver_name, photos, timestamp, created_at, location_id, meter_reading,
            branch_id, branch_name, branch_address, delivery_order_id,
            start_meter_reading, end_meter_reading
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
    )
    .bind(&t.id)
    .bind(t.transaction_type())
    .bind(&t.load_session_id)
    .bind(&t.oil_type_id)
    .bind(&t.oil_type_name)
    .bind(t.quantity)
    .bind(&t.driver_uid)
    .bind(&t.driver_name)
    .bind(encode_json(&t.photos)?)
    .bind(encode_ts(t.timestamp))
    .bind(encode_ts(t.created_at))
    .bind(loading.and_then(|l| l.location_id.clone()))
    .bind(loading.and_then(|l| l.meter_reading))
    .bind(supply.map(|s| s.branch_id.clone()))
    .bind(supply.map(|s| s.branch_name.clone()))
    .bind(supply.map(|s| s.branch_address.clone()))
    .bind(supply.map(|s| s.delivery_order_id.clone()))
    .bind(supply.and_then(|s| s.start_meter_reading))
    .bind(supply.and_then(|s| s.end_meter_reading))
    .execute(conn)
    .await?;
    Ok(())
}

/// Σ quantity over the session's supply entries, rescanned on every call.
/// Served by `idx_transactions_session`.
pub(crate) async fn supplied_total(conn: &mut SqliteConnection, load_session_id: &str) -> DbResult<f64> {
    let total: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0.0) FROM transactions WHERE load_session_id = ?1 AND kind = 'supply'",
    )
    .bind(load_session_id)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        TransactionRepository { pool, retry }
    }

    /// Whole ledger, newest first. Equal timestamps keep insertion order.
    pub async fn list_all(&self) -> DbResult<Vec<Transaction>> {
        self.retry
            .run("list_transactions", || {
                self.fetch(format!("{SELECT_TRANSACTION} ORDER BY timestamp DESC, rowid"), vec![])
            })
            .await
    }

    /// Entries of one session in the order they were written.
    pub async fn list_for_session(&self, load_session_id: &str) -> DbResult<Vec<Transaction>> {
        self.retry
            .run("list_session_transactions", || {
                self.fetch(
                    format!("{SELECT_TRANSACTION} WHERE load_session_id = ?1 ORDER BY timestamp, rowid"),
                    vec![load_session_id.to_string()],
                )
            })
            .await
    }

    /// Entries whose `timestamp` falls in `[start, end]`, newest first.
    pub async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Transaction>> {
        self.retry
            .run("list_transactions_between", || {
                self.fetch(
                    format!(
                        "{SELECT_TRANSACTION} WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp DESC, rowid"
                    ),
                    vec![encode_ts(start), encode_ts(end)],
                )
            })
            .await
    }

    async fn fetch(&self, sql: String, binds: Vec<String>) -> DbResult<Vec<Transaction>> {
        let mut query = sqlx::query_as::<_, TransactionRow>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transaction>> {
        let mut found = self
            .retry
            .run("get_transaction", || {
                self.fetch(format!("{SELECT_TRANSACTION} WHERE id = ?1"), vec![id.to_string()])
            })
            .await?;
        Ok(found.pop())
    }

    /// Most recent supply that recorded an end meter reading.
    pub async fn latest_end_meter(&self) -> DbResult<Option<f64>> {
        self.retry
            .run("latest_end_meter", || async move {
                let reading: Option<f64> = sqlx::query_scalar(
                    r#"
                    SELECT end_meter_reading FROM transactions
                    WHERE kind = 'supply' AND end_meter_reading IS NOT NULL
                    ORDER BY timestamp DESC, rowid DESC
                    LIMIT 1
                    "#,
                )
                .fetch_optional(&self.pool)
                .await?;
                Ok(reading)
            })
            .await
    }

    /// Replaces the photo map. The only mutation a ledger entry allows.
    pub async fn update_photos(&self, id: &str, photos: &Photos) -> DbResult<()> {
        let encoded = encode_json(photos)?;
        self.retry
            .run("update_transaction_photos", || {
                let encoded = encoded.clone();
                async move {
                    let result = sqlx::query("UPDATE transactions SET photos = ?2 WHERE id = ?1")
                        .bind(id)
                        .bind(encoded)
                        .execute(&self.pool)
                        .await?;
                    if result.rows_affected() == 0 {
                        return Err(DbError::not_found("Transaction", id));
                    }
                    debug!(id, photos = photos.len(), "Updated transaction photos");
                    Ok(())
                }
            })
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
