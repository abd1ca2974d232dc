//! Fixtures shared by the repository tests.

use chrono::Utc;
use oiltrack_core::ledger::{generate_load_session_id, generate_record_id};
use oiltrack_core::{
    Branch, Delivery, DeliveryRecord, Driver, LoadSession, NewLoadSession, OilType, Photos, Role,
};

use crate::{Database, DbConfig};

pub(crate) async fn db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub(crate) fn oil_type(name: &str) -> OilType {
    OilType {
        id: generate_record_id(),
        name: name.into(),
        color: "#ff9900".into(),
        active: true,
        created_at: Utc::now(),
    }
}

pub(crate) fn branch(name: &str) -> Branch {
    Branch {
        id: generate_record_id(),
        name: name.into(),
        address: format!("1 {name} Road"),
        contact_no: "0300-0000000".into(),
        oil_tanks: vec![],
        active: true,
        created_at: Utc::now(),
    }
}

pub(crate) fn driver(uid: &str, name: &str) -> Driver {
    Driver {
        uid: uid.into(),
        email: format!("{uid}@oiltrack.test"),
        display_name: Some(name.into()),
        role: Role::Driver,
        active: true,
        emp_no: None,
        driver_licence_no: None,
        tanker_licence_no: None,
        licence_expiry_date: None,
        created_at: Utc::now(),
        updated_at: None,
        last_login_at: None,
    }
}

/// Opens a session through the ledger repository.
pub(crate) async fn open_session(db: &Database, oil: &OilType, liters: f64) -> LoadSession {
    let now = Utc::now();
    let session = LoadSession::open(
        NewLoadSession {
            oil_type_id: oil.id.clone(),
            oil_type_name: oil.name.clone(),
            total_loaded_liters: liters,
            ..Default::default()
        },
        generate_load_session_id(now, &mut rand::thread_rng()),
        "driver-1".into(),
        now,
    );
    db.ledger()
        .create_load_session(&session, &session.loading_transaction())
        .await
        .expect("create load session");
    session
}

pub(crate) fn delivery(session_id: &str, branch: &Branch, oil: &OilType, liters: f64) -> Delivery {
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
    .into_delivery(branch.address.clone(), Utc::now())
}

/// Records a supply through the ledger repository.
pub(crate) async fn supply(
    db: &Database,
    session_id: &str,
    branch: &Branch,
    oil: &OilType,
    liters: f64,
) -> Delivery {
    let delivery = delivery(session_id, branch, oil, liters);
    db.ledger()
        .record_supply(&delivery, &delivery.supply_transaction(), Utc::now())
        .await
        .expect("record supply");
    delivery
}

pub(crate) async fn count(db: &Database, sql: &str, bind: &str) -> i64 {
    sqlx::query_scalar(sql)
        .bind(bind)
        .fetch_one(db.pool())
        .await
        .expect("count query")
}
