//! # Load-Session Ledger
//!
//! Types and pure rules for the oil inventory lifecycle: a tanker is loaded
//! once, then drained by one or more supplies until nothing remains.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Load Session Lifecycle                              │
//! │                                                                         │
//! │  createLoadSession(total = 1000 L)                                     │
//! │       │                                                                 │
//! │       ├──► LoadSession  { remaining: 1000, status: active }            │
//! │       └──► Transaction  { type: loading, quantity: 1000 }              │
//! │                                                                         │
//! │  completeDelivery(600 L)                                               │
//! │       ├──► Delivery     { delivered: 600 }                             │
//! │       ├──► Transaction  { type: supply, quantity: 600 }                │
//! │       └──► reconcile: 1000 - Σ supply = 400 → active                   │
//! │                                                                         │
//! │  completeDelivery(400 L)                                               │
//! │       └──► reconcile: 1000 - Σ supply = 0   → completed (final)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Balance Rule
//! The remaining balance is never decremented in place. It is re-derived from
//! the transaction log (`total_loaded - Σ supply.quantity`) so that a missed
//! update heals on the next supply or on a repair pass.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::types::{photo_keys, Photos};
use crate::validation::{validate_positive, validate_required, ValidationResult};

// =============================================================================
// Identifiers
// =============================================================================

/// Prefix of human-readable load session ids.
pub const LOAD_SESSION_PREFIX: &str = "LS_";

/// Prefix of synthesized ids for supplies recorded without a load session.
pub const DIRECT_SESSION_PREFIX: &str = "DIRECT_";

/// Prefix of synthesized delivery order numbers.
pub const DELIVERY_ORDER_PREFIX: &str = "DO_";

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the random suffix on a load session id.
pub const LOAD_SESSION_SUFFIX_LEN: usize = 4;

/// Generates a load session id: `LS_<epochMillis>_<4 base36 chars>`.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use oiltrack_core::ledger::{generate_load_session_id, is_load_session_id};
///
/// let id = generate_load_session_id(Utc::now(), &mut rand::thread_rng());
/// assert!(is_load_session_id(&id));
/// ```
pub fn generate_load_session_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..LOAD_SESSION_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "{}{}_{}",
        LOAD_SESSION_PREFIX,
        now.timestamp_millis(),
        suffix
    )
}

/// Returns true if `id` has the `LS_<digits>_<4 x [A-Z0-9]>` shape.
pub fn is_load_session_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix(LOAD_SESSION_PREFIX) else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == LOAD_SESSION_SUFFIX_LEN
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

/// Session id for a supply that bypasses load tracking.
pub fn direct_session_id(now: DateTime<Utc>) -> String {
    format!("{}{}", DIRECT_SESSION_PREFIX, now.timestamp_millis())
}

/// True for ids produced by [`direct_session_id`].
pub fn is_direct_session(id: &str) -> bool {
    id.starts_with(DIRECT_SESSION_PREFIX)
}

/// Delivery order number used when the driver did not enter one.
pub fn delivery_order_id(now: DateTime<Utc>) -> String {
    format!("{}{}", DELIVERY_ORDER_PREFIX, now.timestamp_millis())
}

/// Store-side primary key.
pub fn generate_record_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Load Session
// =============================================================================

/// Status of a load session. Moves one way only: active → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LoadSessionStatus {
    Active,
    Completed,
}

impl LoadSessionStatus {
    /// Status implied by a remaining balance.
    pub fn for_remaining(remaining: f64) -> Self {
        if remaining <= 0.0 {
            LoadSessionStatus::Completed
        } else {
            LoadSessionStatus::Active
        }
    }
}

/// One tanker-loading event and its depleting balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoadSession {
    /// Store primary key (UUID v4).
    pub id: String,
    /// Human-readable id, `LS_<millis>_<XXXX>`.
    pub load_session_id: String,
    pub oil_type_id: String,
    pub oil_type_name: String,
    /// Fixed at creation.
    pub total_loaded_liters: f64,
    pub remaining_liters: f64,
    pub total_supplied: f64,
    pub load_count: i64,
    pub status: LoadSessionStatus,
    pub load_location_id: Option<String>,
    pub load_meter_reading: Option<f64>,
    pub meter_reading_photo: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub last_supply_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request to start a loading event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewLoadSession {
    pub oil_type_id: String,
    pub oil_type_name: String,
    pub total_loaded_liters: f64,
    pub load_location_id: Option<String>,
    pub load_meter_reading: Option<f64>,
    pub meter_reading_photo: Option<String>,
    /// Falls back to the current identity when absent.
    pub created_by: Option<String>,
}

impl NewLoadSession {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("oilTypeId", &self.oil_type_id)?;
        validate_positive("totalLoadedLiters", self.total_loaded_liters)?;
        Ok(())
    }
}

impl LoadSession {
    /// Builds a fresh active session. Never merges with an existing one.
    pub fn open(
        request: NewLoadSession,
        load_session_id: String,
        created_by: String,
        now: DateTime<Utc>,
    ) -> Self {
        LoadSession {
            id: generate_record_id(),
            load_session_id,
            oil_type_id: request.oil_type_id,
            oil_type_name: request.oil_type_name,
            total_loaded_liters: request.total_loaded_liters,
            remaining_liters: request.total_loaded_liters,
            total_supplied: 0.0,
            load_count: 1,
            status: LoadSessionStatus::Active,
            load_location_id: request.load_location_id,
            load_meter_reading: request.load_meter_reading,
            meter_reading_photo: request.meter_reading_photo,
            created_by,
            created_at: now,
            timestamp: now,
            last_supply_at: None,
            completed_at: None,
        }
    }

    /// The `loading` ledger entry written alongside this session.
    pub fn loading_transaction(&self) -> Transaction {
        let mut photos = Photos::new();
        if let Some(url) = &self.meter_reading_photo {
            photos.insert(photo_keys::METER_READING_PHOTO, url.clone());
        }
        Transaction {
            id: generate_record_id(),
            load_session_id: self.load_session_id.clone(),
            oil_type_id: self.oil_type_id.clone(),
            oil_type_name: self.oil_type_name.clone(),
            quantity: self.total_loaded_liters,
            driver_uid: Some(self.created_by.clone()),
            driver_name: None,
            photos,
            timestamp: self.timestamp,
            created_at: self.created_at,
            kind: TransactionKind::Loading(LoadingDetails {
                location_id: self.load_location_id.clone(),
                meter_reading: self.load_meter_reading,
            }),
        }
    }

    /// Derives the balance this session should have for a given supplied
    /// total. `completed_at` is only stamped on the first transition.
    pub fn reconcile(&self, total_supplied: f64, now: DateTime<Utc>) -> Reconciliation {
        let remaining = self.total_loaded_liters - total_supplied;
        let status = match self.status {
            LoadSessionStatus::Completed => LoadSessionStatus::Completed,
            LoadSessionStatus::Active => LoadSessionStatus::for_remaining(remaining),
        };
        let newly_completed = self.status == LoadSessionStatus::Active
            && status == LoadSessionStatus::Completed;
        let completed_at = if newly_completed {
            Some(now)
        } else {
            self.completed_at
        };
        let drifted = (self.remaining_liters - remaining).abs() > f64::EPSILON
            || (self.total_supplied - total_supplied).abs() > f64::EPSILON
            || self.status != status;

        Reconciliation {
            total_supplied,
            remaining_liters: remaining,
            status,
            completed_at,
            newly_completed,
            drifted,
        }
    }

    /// Applies a reconciliation result.
    pub fn apply(&mut self, rec: &Reconciliation, last_supply_at: Option<DateTime<Utc>>) {
        self.total_supplied = rec.total_supplied;
        self.remaining_liters = rec.remaining_liters;
        self.status = rec.status;
        self.completed_at = rec.completed_at;
        if last_supply_at.is_some() {
            self.last_supply_at = last_supply_at;
        }
    }

    pub fn is_over_delivered(&self) -> bool {
        self.remaining_liters < 0.0
    }
}

/// Outcome of re-deriving one session's balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    pub total_supplied: f64,
    pub remaining_liters: f64,
    pub status: LoadSessionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub newly_completed: bool,
    /// True when the stored balance disagreed with the log.
    pub drifted: bool,
}

/// Stored vs. log-derived balance for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SessionBalance {
    pub load_session_id: String,
    pub total_loaded_liters: f64,
    pub stored_remaining: f64,
    pub derived_remaining: f64,
    pub stored_status: LoadSessionStatus,
    pub derived_status: LoadSessionStatus,
    pub drifted: bool,
}

impl SessionBalance {
    pub fn audit(session: &LoadSession, total_supplied: f64, now: DateTime<Utc>) -> Self {
        let rec = session.reconcile(total_supplied, now);
        SessionBalance {
            load_session_id: session.load_session_id.clone(),
            total_loaded_liters: session.total_loaded_liters,
            stored_remaining: session.remaining_liters,
            derived_remaining: rec.remaining_liters,
            stored_status: session.status,
            derived_status: rec.status,
            drifted: rec.drifted,
        }
    }
}

/// Sums supply quantities for one session.
pub fn total_supplied<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    load_session_id: &str,
) -> f64 {
    transactions
        .into_iter()
        .filter(|t| t.load_session_id == load_session_id && t.is_supply())
        .map(|t| t.quantity)
        .sum()
}

// =============================================================================
// Transaction
// =============================================================================

/// Discriminant of a ledger entry, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Loading,
    Supply,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Loading => "loading",
            TransactionType::Supply => "supply",
        }
    }
}

/// Fields specific to a loading entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoadingDetails {
    pub location_id: Option<String>,
    pub meter_reading: Option<f64>,
}

/// Fields specific to a supply entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SupplyDetails {
    pub branch_id: String,
    pub branch_name: String,
    pub branch_address: String,
    pub delivery_order_id: String,
    pub start_meter_reading: Option<f64>,
    pub end_meter_reading: Option<f64>,
}

/// Type-specific payload, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    Loading(LoadingDetails),
    Supply(SupplyDetails),
}

/// Append-only ledger entry.
///
/// After creation only `photos` may change (watermark repair, photo purge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub load_session_id: String,
    pub oil_type_id: String,
    pub oil_type_name: String,
    /// Liters, always > 0.
    pub quantity: f64,
    pub driver_uid: Option<String>,
    /// Name captured on the form, if any. Used only as an enrichment fallback.
    pub driver_name: Option<String>,
    pub photos: Photos,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

impl Transaction {
    pub fn transaction_type(&self) -> TransactionType {
        match self.kind {
            TransactionKind::Loading(_) => TransactionType::Loading,
            TransactionKind::Supply(_) => TransactionType::Supply,
        }
    }

    pub fn is_supply(&self) -> bool {
        matches!(self.kind, TransactionKind::Supply(_))
    }

    pub fn supply(&self) -> Option<&SupplyDetails> {
        match &self.kind {
            TransactionKind::Supply(details) => Some(details),
            TransactionKind::Loading(_) => None,
        }
    }

    pub fn loading(&self) -> Option<&LoadingDetails> {
        match &self.kind {
            TransactionKind::Loading(details) => Some(details),
            TransactionKind::Supply(_) => None,
        }
    }

    pub fn branch_id(&self) -> Option<&str> {
        self.supply().map(|s| s.branch_id.as_str())
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Status of a delivery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    InProgress,
    Completed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::InProgress => "in-progress",
            DeliveryStatus::Completed => "completed",
        }
    }
}

/// Denormalized supply record, kept beside its mirrored supply transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: String,
    pub load_session_id: String,
    pub delivery_order_id: String,
    pub branch_id: String,
    pub branch_name: String,
    pub branch_address: String,
    pub oil_type_id: String,
    pub oil_type_name: String,
    pub delivered_liters: f64,
    pub start_meter_reading: Option<f64>,
    pub end_meter_reading: Option<f64>,
    pub photos: Photos,
    pub driver_uid: Option<String>,
    pub driver_name: Option<String>,
    pub status: DeliveryStatus,
    #[ts(as = "String")]
    pub completed_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input to `completeDelivery`.
///
/// Meter ordering is checked upstream on the supply form; this record only
/// guards the invariants the ledger itself depends on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub load_session_id: String,
    pub delivery_order_id: String,
    pub branch_id: String,
    pub branch_name: String,
    pub oil_type_id: String,
    pub oil_type_name: String,
    pub delivered_liters: f64,
    pub start_meter_reading: Option<f64>,
    pub end_meter_reading: Option<f64>,
    pub photos: Photos,
    pub driver_uid: Option<String>,
    pub driver_name: Option<String>,
}

impl DeliveryRecord {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_required("loadSessionId", &self.load_session_id)?;
        validate_required("branchId", &self.branch_id)?;
        validate_required("oilTypeId", &self.oil_type_id)?;
        validate_positive("deliveredLiters", self.delivered_liters)?;
        Ok(())
    }

    /// Materializes the delivery with a resolved branch address.
    pub fn into_delivery(self, branch_address: String, now: DateTime<Utc>) -> Delivery {
        Delivery {
            id: generate_record_id(),
            load_session_id: self.load_session_id,
            delivery_order_id: self.delivery_order_id,
            branch_id: self.branch_id,
            branch_name: self.branch_name,
            branch_address,
            oil_type_id: self.oil_type_id,
            oil_type_name: self.oil_type_name,
            delivered_liters: self.delivered_liters,
            start_meter_reading: self.start_meter_reading,
            end_meter_reading: self.end_meter_reading,
            photos: self.photos,
            driver_uid: self.driver_uid,
            driver_name: self.driver_name,
            status: DeliveryStatus::Completed,
            completed_at: now,
            timestamp: now,
            created_at: now,
        }
    }
}

impl Delivery {
    /// The `supply` ledger entry mirroring this delivery.
    pub fn supply_transaction(&self) -> Transaction {
        Transaction {
            id: generate_record_id(),
            load_session_id: self.load_session_id.clone(),
            oil_type_id: self.oil_type_id.clone(),
            oil_type_name: self.oil_type_name.clone(),
            quantity: self.delivered_liters,
            driver_uid: self.driver_uid.clone(),
            driver_name: self.driver_name.clone(),
            photos: self.photos.clone(),
            timestamp: self.timestamp,
            created_at: self.created_at,
            kind: TransactionKind::Supply(SupplyDetails {
                branch_id: self.branch_id.clone(),
                branch_name: self.branch_name.clone(),
                branch_address: self.branch_address.clone(),
                delivery_order_id: self.delivery_order_id.clone(),
                start_meter_reading: self.start_meter_reading,
                end_meter_reading: self.end_meter_reading,
            }),
        }
    }

    pub fn is_direct(&self) -> bool {
        is_direct_session(&self.load_session_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
