//! # Reporting View
//!
//! Joins ledger records against reference data and folds them into the
//! shapes dashboards and exports consume.
//!
//! ## Unified List
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  deliveries[]  ──map──► LedgerEntry { source: Delivery, kind: supply } │
//! │                                    │                                    │
//! │                                    ├──► concat (NO de-duplication)      │
//! │                                    │                                    │
//! │  transactions[] ─map──► LedgerEntry { source: Transaction, ... }       │
//! │                                                                         │
//! │  One physical supply appears twice: once per stream. Dashboards show   │
//! │  the streams in separate widgets; the combined export keeps both rows. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Name Resolution
//! | Field        | Fallback chain                                                     |
//! |--------------|--------------------------------------------------------------------|
//! | driver name  | driver.display_name → driver.email → record name → uid → `Unknown Driver` |
//! | branch name  | branch.name → record branch name → `Unknown Branch`                |
//! | oil type     | oil_type.name → record oil type name → `Unknown Oil Type`          |

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::{
    Delivery, LoadSession, LoadSessionStatus, Transaction, TransactionKind, TransactionType,
};
use crate::types::{Branch, Driver, OilType, Photos, Role};
use crate::workflow::{Complaint, ComplaintStatus, Task, TaskStatus};

pub const UNKNOWN_DRIVER: &str = "Unknown Driver";
pub const UNKNOWN_BRANCH: &str = "Unknown Branch";
pub const UNKNOWN_OIL_TYPE: &str = "Unknown Oil Type";

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Reference Index
// =============================================================================

/// In-memory lookup tables for enrichment.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    drivers: HashMap<String, Driver>,
    branches: HashMap<String, Branch>,
    oil_types: HashMap<String, OilType>,
}

impl ReferenceIndex {
    pub fn new(drivers: Vec<Driver>, branches: Vec<Branch>, oil_types: Vec<OilType>) -> Self {
        ReferenceIndex {
            drivers: drivers.into_iter().map(|d| (d.uid.clone(), d)).collect(),
            branches: branches.into_iter().map(|b| (b.id.clone(), b)).collect(),
            oil_types: oil_types.into_iter().map(|o| (o.id.clone(), o)).collect(),
        }
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branches.get(id)
    }

    pub fn driver_name(&self, uid: Option<&str>, recorded: Option<&str>) -> String {
        let driver = uid.and_then(|u| self.drivers.get(u));
        driver
            .and_then(|d| non_empty(d.display_name.as_deref()))
            .or_else(|| driver.and_then(|d| non_empty(Some(d.email.as_str()))))
            .or_else(|| non_empty(recorded))
            .or_else(|| non_empty(uid))
            .unwrap_or(UNKNOWN_DRIVER)
            .to_string()
    }

    pub fn branch_name(&self, id: &str, recorded: Option<&str>) -> String {
        self.branches
            .get(id)
            .and_then(|b| non_empty(Some(b.name.as_str())))
            .or_else(|| non_empty(recorded))
            .unwrap_or(UNKNOWN_BRANCH)
            .to_string()
    }

    pub fn oil_type_name(&self, id: &str, recorded: Option<&str>) -> String {
        self.oil_types
            .get(id)
            .and_then(|o| non_empty(Some(o.name.as_str())))
            .or_else(|| non_empty(recorded))
            .unwrap_or(UNKNOWN_OIL_TYPE)
            .to_string()
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// Which stream an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Delivery,
    Transaction,
}

/// One enriched row of the unified activity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub source: EntrySource,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub load_session_id: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub driver_uid: Option<String>,
    pub driver_name: String,
    pub oil_type_id: String,
    pub oil_type_name: String,
    pub quantity: f64,
    /// `None` for loading entries, which have no branch.
    pub branch_id: Option<String>,
    pub branch_name: Option<String>,
    pub start_meter_reading: Option<f64>,
    pub end_meter_reading: Option<f64>,
    pub delivery_order_id: Option<String>,
    pub photos: Photos,
    pub status: String,
}

impl LedgerEntry {
    /// Maps a legacy delivery onto the supply shape, folding its old photo
    /// slot names into the canonical ones.
    pub fn from_delivery(delivery: &Delivery, index: &ReferenceIndex) -> Self {
        LedgerEntry {
            id: delivery.id.clone(),
            source: EntrySource::Delivery,
            kind: TransactionType::Supply,
            load_session_id: delivery.load_session_id.clone(),
            timestamp: delivery.completed_at,
            driver_uid: delivery.driver_uid.clone(),
            driver_name: index
                .driver_name(delivery.driver_uid.as_deref(), delivery.driver_name.as_deref()),
            oil_type_id: delivery.oil_type_id.clone(),
            oil_type_name: index
                .oil_type_name(&delivery.oil_type_id, Some(delivery.oil_type_name.as_str())),
            quantity: delivery.delivered_liters,
            branch_id: Some(delivery.branch_id.clone()),
            branch_name: Some(
                index.branch_name(&delivery.branch_id, Some(delivery.branch_name.as_str())),
            ),
            start_meter_reading: delivery.start_meter_reading,
            end_meter_reading: delivery.end_meter_reading,
            delivery_order_id: Some(delivery.delivery_order_id.clone()),
            photos: delivery.photos.canonicalized(),
            status: delivery.status.as_str().to_string(),
        }
    }

    pub fn from_transaction(tx: &Transaction, index: &ReferenceIndex) -> Self {
        let (branch_id, branch_name, start, end, order) = match &tx.kind {
            TransactionKind::Supply(s) => (
                Some(s.branch_id.clone()),
                Some(index.branch_name(&s.branch_id, Some(s.branch_name.as_str()))),
                s.start_meter_reading,
                s.end_meter_reading,
                Some(s.delivery_order_id.clone()),
            ),
            TransactionKind::Loading(_) => (None, None, None, None, None),
        };

        LedgerEntry {
            id: tx.id.clone(),
            source: EntrySource::Transaction,
            kind: tx.transaction_type(),
            load_session_id: tx.load_session_id.clone(),
            timestamp: tx.timestamp,
            driver_uid: tx.driver_uid.clone(),
            driver_name: index.driver_name(tx.driver_uid.as_deref(), tx.driver_name.as_deref()),
            oil_type_id: tx.oil_type_id.clone(),
            oil_type_name: index.oil_type_name(&tx.oil_type_id, Some(tx.oil_type_name.as_str())),
            quantity: tx.quantity,
            branch_id,
            branch_name,
            start_meter_reading: start,
            end_meter_reading: end,
            delivery_order_id: order,
            photos: tx.photos.canonicalized(),
            status: "completed".to_string(),
        }
    }

    /// Type label as exports print it: delivery rows say `Supply`,
    /// transaction rows keep their stored tag.
    pub fn type_label(&self) -> &'static str {
        match self.source {
            EntrySource::Delivery => "Supply",
            EntrySource::Transaction => self.kind.as_str(),
        }
    }
}

/// Enriches a stream of deliveries.
pub fn delivery_entries(deliveries: &[Delivery], index: &ReferenceIndex) -> Vec<LedgerEntry> {
    deliveries
        .iter()
        .map(|d| LedgerEntry::from_delivery(d, index))
        .collect()
}

/// Enriches a stream of transactions.
pub fn transaction_entries(
    transactions: &[Transaction],
    index: &ReferenceIndex,
) -> Vec<LedgerEntry> {
    transactions
        .iter()
        .map(|t| LedgerEntry::from_transaction(t, index))
        .collect()
}

/// Deliveries followed by transactions, as the combined export wants them.
/// Nothing is de-duplicated.
pub fn unified_entries(
    deliveries: &[Delivery],
    transactions: &[Transaction],
    index: &ReferenceIndex,
) -> Vec<LedgerEntry> {
    let mut entries = delivery_entries(deliveries, index);
    entries.extend(transaction_entries(transactions, index));
    entries
}

// =============================================================================
// Daily Aggregation
// =============================================================================

/// Liters supplied today, by oil type name.
///
/// "Today" is compared as a calendar date in `tz`, so a supply at 23:30
/// local time counts for that local day even if UTC has rolled over.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use oiltrack_core::report::daily_totals_by_oil_type;
///
/// let totals = daily_totals_by_oil_type(&[], Utc::now().date_naive(), &Utc);
/// assert!(totals.is_empty());
/// ```
pub fn daily_totals_by_oil_type<Tz: TimeZone>(
    entries: &[LedgerEntry],
    today: NaiveDate,
    tz: &Tz,
) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for entry in entries
        .iter()
        .filter(|e| e.kind == TransactionType::Supply)
        .filter(|e| e.timestamp.with_timezone(tz).date_naive() == today)
    {
        *totals.entry(entry.oil_type_name.clone()).or_insert(0.0) += entry.quantity;
    }
    totals
}

// =============================================================================
// Dashboard Summary
// =============================================================================

/// Headline counters for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub completed_deliveries: usize,
    pub active_load_sessions: usize,
    pub open_complaints: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub active_drivers: usize,
    pub total_liters_delivered: f64,
}

impl DashboardSummary {
    pub fn compute(
        deliveries: &[Delivery],
        sessions: &[LoadSession],
        complaints: &[Complaint],
        tasks: &[Task],
        drivers: &[Driver],
    ) -> Self {
        let completed: Vec<&Delivery> = deliveries
            .iter()
            .filter(|d| d.status == crate::ledger::DeliveryStatus::Completed)
            .collect();
        DashboardSummary {
            completed_deliveries: completed.len(),
            active_load_sessions: sessions
                .iter()
                .filter(|s| s.status == LoadSessionStatus::Active)
                .count(),
            open_complaints: complaints
                .iter()
                .filter(|c| c.status == ComplaintStatus::Open)
                .count(),
            pending_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count(),
            in_progress_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count(),
            active_drivers: drivers
                .iter()
                .filter(|d| d.active && d.role == Role::Driver)
                .count(),
            total_liters_delivered: completed.iter().map(|d| d.delivered_liters).sum(),
        }
    }
}

// =============================================================================
// Store Usage & Photo Statistics
// =============================================================================

/// Approximate storage cost of one record.
pub const ESTIMATED_DOCUMENT_KB: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CollectionUsage {
    pub name: String,
    pub count: u64,
}

/// Record counts per collection, with a rough size estimate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StoreUsage {
    pub collections: Vec<CollectionUsage>,
    pub total_documents: u64,
    /// Kilobytes.
    pub estimated_size: u64,
}

impl StoreUsage {
    pub fn from_counts(counts: Vec<(String, u64)>) -> Self {
        let total_documents = counts.iter().map(|(_, c)| c).sum::<u64>();
        StoreUsage {
            collections: counts
                .into_iter()
                .map(|(name, count)| CollectionUsage { name, count })
                .collect(),
            total_documents,
            estimated_size: total_documents * ESTIMATED_DOCUMENT_KB,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PhotoStatistics {
    pub photo_count: usize,
    pub transaction_count: usize,
}

// =============================================================================
// Unit Tests
// =============================================================================
