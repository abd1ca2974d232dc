//! # Delivery Repository
//!
//! Denormalized supply records. Each row has a mirrored `supply` entry in
//! `transactions`; both are written together by
//! [`LedgerRepository::record_supply`](super::ledger::LedgerRepository::record_supply).

use sqlx::{SqliteConnection, SqlitePool};

use oiltrack_core::{Delivery, DeliveryStatus, Photos};

use super::{decode_json, decode_ts, encode_json, encode_ts};
use crate::error::DbResult;
use crate::retry::RetryPolicy;

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: String,
    load_session_id: String,
    delivery_order_id: String,
    branch_id: String,
    branch_name: String,
    branch_address: String,
    oil_type_id: String,
    oil_type_name: String,
    delivered_liters: f64,
    start_meter_reading: Option<f64>,
    end_meter_reading: Option<f64>,
    photos: String,
    driver_uid: Option<String>,
    driver_name: Option<String>,
    status: DeliveryStatus,
    completed_at: String,
    timestamp: String,
    created_at: String,
}

impl DeliveryRow {
    fn into_delivery(self) -> DbResult<Delivery> {
        let photos: Photos = decode_json("Delivery", &self.id, &self.photos)?;
        Ok(Delivery {
            completed_at: decode_ts("Delivery", &self.id, &self.completed_at)?,
            timestamp: decode_ts("Delivery", &self.id, &self.timestamp)?,
            created_at: decode_ts("Delivery", &self.id, &self.created_at)?,
            id: self.id,
            load_session_id: self.load_session_id,
            delivery_order_id: self.delivery_order_id,
            branch_id: self.branch_id,
            branch_name: self.branch_name,
            branch_address: self.branch_address,
            oil_type_id: self.oil_type_id,
            oil_type_name: self.oil_type_name,
            delivered_liters: self.delivered_liters,
            start_meter_reading: self.start_meter_reading,
            end_meter_reading: self.end_meter_reading,
            photos,
            driver_uid: self.driver_uid,
            driver_name: self.driver_name,
            status: self.status,
        })
    }
}

const SELECT_DELIVERY: &str = r#"
    SELECT id, load_session_id, delivery_order_id, branch_id, branch_name, branch_address,
           oil_type_id, oil_type_name, delivered_liters, start_meter_reading,
           end_meter_reading, photos, driver_uid, driver_name, status, completed_at,
           timestamp, created_at
    FROM deliveries
"#;

pub(crate) async fn insert_delivery(conn: &mut SqliteConnection, d: &Delivery) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO deliveries (
            id, load_session_id, delivery_order_id, branch_id, branch_name, branch_address,
            oil_type_id, oil_type_name, delivered_liters, start_meter_reading,
            end_meter_reading, photos, driver_uid, driver_name, status, completed_at,
            timestamp, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
    )
    .bind(&d.id)
    .bind(&d.load_session_id)
    .bind(&d.delivery_order_id)
    .bind(&d.branch_id)
    .bind(&d.branch_name)
    .bind(&d.branch_address)
    .bind(&d.oil_type_id)
    .bind(&d.oil_type_name)
    .bind(d.delivered_liters)
    .bind(d.start_meter_reading)
    .bind(d.end_meter_reading)
    .bind(encode_json(&d.photos)?)
    .bind(&d.driver_uid)
    .bind(&d.driver_name)
    .bind(d.status)
    .bind(encode_ts(d.completed_at))
    .bind(encode_ts(d.timestamp))
    .bind(encode_ts(d.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DeliveryRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl DeliveryRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        DeliveryRepository { pool, retry }
    }

    /// All deliveries, newest first.
    pub async fn list(&self) -> DbResult<Vec<Delivery>> {
        self.retry
            .run("list_deliveries", || async move {
                let rows: Vec<DeliveryRow> = sqlx::query_as(&format!(
                    "{SELECT_DELIVERY} ORDER BY timestamp DESC, rowid"
                ))
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(DeliveryRow::into_delivery).collect()
            })
            .await
    }

    pub async fn list_for_session(&self, load_session_id: &str) -> DbResult<Vec<Delivery>> {
        self.retry
            .run("list_session_deliveries", || async move {
                let rows: Vec<DeliveryRow> = sqlx::query_as(&format!(
                    "{SELECT_DELIVERY} WHERE load_session_id = ?1 ORDER BY timestamp, rowid"
                ))
                .bind(load_session_id)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(DeliveryRow::into_delivery).collect()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use oiltrack_core::DeliveryStatus;

    use crate::testing;

    #[tokio::test]
    async fn test_delivery_round_trip() {
        let db = testing::db().await;
        let diesel = testing::oil_type("Diesel");
        let branch = testing::branch("North");
        let session = testing::open_session(&db, &diesel, 1000.0).await;
        let written = testing::supply(&db, &session.load_session_id, &branch, &diesel, 250.0).await;

        let stored = db
            .deliveries()
            .list_for_session(&session.load_session_id)
            .await
            .unwrap();
        assert_eq!(stored, vec![written]);
        assert_eq!(stored[0].status, DeliveryStatus::Completed);
        assert!(db.deliveries().list_for_session("LS_0_ZZZZ").await.unwrap().is_empty());
    }
}
