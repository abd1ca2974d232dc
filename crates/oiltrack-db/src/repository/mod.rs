//! # Repository Module
//!
//! Database repository implementations for OilTrack.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories                                         │
//! │                                                                         │
//! │  Service call                                                          │
//! │       │  db.ledger().record_supply(&delivery, &supply_tx)              │
//! │       ▼                                                                 │
//! │  LedgerRepository                                                      │
//! │  ├── retry.run("record_supply", || ...)   ← transient errors retried   │
//! │  └── one SQLite transaction per attempt                                │
//! │       │                                                                 │
//! │       │  SQL (runtime-checked queries, *Row structs via FromRow)       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`oil_type::OilTypeRepository`] - Oil type CRUD, cascade delete
//! - [`branch::BranchRepository`] - Branch CRUD, cascade delete
//! - [`driver::DriverRepository`] - Driver directory (`users` table)
//! - [`load_session::LoadSessionRepository`] - Session reads
//! - [`transaction::TransactionRepository`] - Ledger reads, photo updates
//! - [`delivery::DeliveryRepository`] - Delivery reads
//! - [`ledger::LedgerRepository`] - Atomic ledger writes and reconciliation
//! - [`workflow::TaskRepository`], [`workflow::ComplaintRepository`]
//! - [`maintenance::MaintenanceRepository`] - Date-range purge, usage counts
//!
//! ## Column Encoding
//! Timestamps are stored as RFC 3339 UTC text with nanosecond digits, so
//! string comparison in SQL matches time order. JSON columns (`photos`,
//! `oil_tanks`) go through serde_json.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DbError, DbResult};

pub mod branch;
pub mod delivery;
pub mod driver;
pub mod ledger;
pub mod load_session;
pub mod maintenance;
pub mod oil_type;
pub mod transaction;
pub mod workflow;

// =============================================================================
// Column Codecs
// =============================================================================

/// Fixed-width timestamp text: `2024-03-10T22:30:05.000000000Z`.
pub(crate) fn encode_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn encode_opt_ts(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(encode_ts)
}

pub(crate) fn decode_ts(entity: &str, id: &str, raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DbError::corrupt(entity, id, format!("bad timestamp '{raw}': {e}")))
}

pub(crate) fn decode_opt_ts(
    entity: &str,
    id: &str,
    raw: Option<&str>,
) -> DbResult<Option<DateTime<Utc>>> {
    raw.map(|r| decode_ts(entity, id, r)).transpose()
}

pub(crate) fn encode_json<T: Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::Internal(e.to_string()))
}

pub(crate) fn decode_json<T: DeserializeOwned>(entity: &str, id: &str, raw: &str) -> DbResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| DbError::corrupt(entity, id, format!("bad JSON column: {e}")))
}

/// Outcome of a cascade delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub transactions: u64,
    pub deliveries: u64,
    pub load_sessions: u64,
}

impl CascadeReport {
    pub fn total_dependents(&self) -> u64 {
        self.transactions + self.deliveries + self.load_sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        let c = a + chrono::Duration::hours(5);
        assert!(encode_ts(a) < encode_ts(b));
        assert!(encode_ts(b) < encode_ts(c));
        assert_eq!(encode_ts(a).len(), encode_ts(c).len());
    }

    #[test]
    fn test_timestamp_round_trip_is_lossless() {
        let now = Utc::now();
        assert_eq!(decode_ts("Test", "1", &encode_ts(now)).unwrap(), now);
        assert!(decode_ts("Test", "1", "yesterday").is_err());
    }
}
