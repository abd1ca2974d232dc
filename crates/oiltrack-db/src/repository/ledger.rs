//! # Ledger Repository
//!
//! Multi-table writes that must land together.
//!
//! ## Supply Recording
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_supply(delivery, supply_tx)          one SQLite transaction     │
//! │                                                                         │
//! │  1. INSERT deliveries                                                   │
//! │  2. INSERT transactions (kind = supply)                                 │
//! │  3. Σ quantity WHERE load_session_id = ? AND kind = 'supply'            │
//! │  4. session found?  ── yes ──► reconcile + UPDATE load_sessions         │
//! │                     └─ no ───► skip (direct supply)                     │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Error at any step ──► ROLLBACK: no delivery, no tx, no balance change  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balances can still drift if rows are edited or purged out of band;
//! [`LedgerRepository::reconcile_all`] re-derives every session from the log.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use oiltrack_core::ledger::SessionBalance;
use oiltrack_core::{Delivery, LoadSession, Transaction};

use super::delivery::insert_delivery;
use super::load_session::{
    find_by_session_id, insert_session, update_balance, LoadSessionRow, SELECT_SESSION,
};
use super::transaction::{insert_transaction, supplied_total};
use crate::error::DbResult;
use crate::retry::RetryPolicy;

/// Result of a recorded supply.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyOutcome {
    /// The rebalanced session, or `None` when the supply has no session.
    pub session: Option<LoadSession>,
    /// True when this supply moved the session to completed.
    pub newly_completed: bool,
}

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        LedgerRepository { pool, retry }
    }

    /// Writes a new session together with its `loading` entry.
    ///
    /// ## Errors
    /// `UniqueViolation` when the `load_session_id` already exists; the
    /// caller generates a fresh id and tries again.
    pub async fn create_load_session(
        &self,
        session: &LoadSession,
        loading: &Transaction,
    ) -> DbResult<()> {
        self.retry
            .run("create_load_session", || self.create_once(session, loading))
            .await
    }

    async fn create_once(&self, session: &LoadSession, loading: &Transaction) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_session(&mut tx, session).await?;
        insert_transaction(&mut tx, loading).await?;
        tx.commit().await?;

        info!(
            load_session_id = %session.load_session_id,
            oil_type = %session.oil_type_name,
            liters = session.total_loaded_liters,
            created_by = %session.created_by,
            "Load session created"
        );
        Ok(())
    }

    /// Writes a delivery and its supply entry, then rebalances the session.
    pub async fn record_supply(
        &self,
        delivery: &Delivery,
        supply: &Transaction,
        now: DateTime<Utc>,
    ) -> DbResult<SupplyOutcome> {
        self.retry
            .run("record_supply", || self.record_supply_once(delivery, supply, now))
            .await
    }

    async fn record_supply_once(
        &self,
        delivery: &Delivery,
        supply: &Transaction,
        now: DateTime<Utc>,
    ) -> DbResult<SupplyOutcome> {
        let mut tx = self.pool.begin().await?;
        insert_delivery(&mut tx, delivery).await?;
        insert_transaction(&mut tx, supply).await?;

        let session_id = delivery.load_session_id.as_str();
        let supplied = supplied_total(&mut tx, session_id).await?;

        let outcome = match find_by_session_id(&mut tx, session_id).await? {
            Some(mut session) => {
                let rec = session.reconcile(supplied, now);
                session.apply(&rec, Some(now));
                update_balance(&mut tx, &session).await?;
                SupplyOutcome {
                    session: Some(session),
                    newly_completed: rec.newly_completed,
                }
            }
            None => {
                debug!(load_session_id = session_id, "No load session for supply, balance untouched");
                SupplyOutcome {
                    session: None,
                    newly_completed: false,
                }
            }
        };
        tx.commit().await?;

        info!(
            delivery_id = %delivery.id,
            load_session_id = session_id,
            branch = %delivery.branch_name,
            liters = delivery.delivered_liters,
            "Supply recorded"
        );
        if let Some(session) = &outcome.session {
            if session.is_over_delivered() {
                warn!(
                    load_session_id = session_id,
                    remaining = session.remaining_liters,
                    "Load session over-delivered"
                );
            } else if outcome.newly_completed {
                info!(load_session_id = session_id, "Load session completed");
            }
        }
        Ok(outcome)
    }

    /// Compares one session's stored balance with the log.
    pub async fn session_balance(
        &self,
        load_session_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SessionBalance>> {
        self.retry
            .run("session_balance", || async move {
                let mut conn = self.pool.acquire().await?;
                let Some(session) = find_by_session_id(&mut conn, load_session_id).await? else {
                    return Ok(None);
                };
                let supplied = supplied_total(&mut conn, load_session_id).await?;
                Ok(Some(SessionBalance::audit(&session, supplied, now)))
            })
            .await
    }

    /// Re-derives every session from the transaction log and fixes the ones
    /// that disagree. Returns the audit of each drifted session as it was
    /// before the fix; a second run returns nothing.
    pub async fn reconcile_all(&self, now: DateTime<Utc>) -> DbResult<Vec<SessionBalance>> {
        self.retry
            .run("reconcile_all", || self.reconcile_all_once(now))
            .await
    }

    async fn reconcile_all_once(&self, now: DateTime<Utc>) -> DbResult<Vec<SessionBalance>> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<LoadSessionRow> =
            sqlx::query_as(&format!("{SELECT_SESSION} ORDER BY created_at, rowid"))
                .fetch_all(&mut *tx)
                .await?;

        let mut drifted = Vec::new();
        let total = rows.len();
        for row in rows {
            let mut session = row.into_session()?;
            let supplied = supplied_total(&mut tx, &session.load_session_id).await?;
            let rec = session.reconcile(supplied, now);
            if !rec.drifted {
                continue;
            }
            drifted.push(SessionBalance::audit(&session, supplied, now));
            session.apply(&rec, None);
            update_balance(&mut tx, &session).await?;
            warn!(
                load_session_id = %session.load_session_id,
                remaining = session.remaining_liters,
                status = ?session.status,
                "Repaired drifted load session"
            );
        }
        tx.commit().await?;

        info!(sessions = total, repaired = drifted.len(), "Reconciliation finished");
        Ok(drifted)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
