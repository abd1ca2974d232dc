//! # Load Session Service
//!
//! Opens load sessions and audits their balances.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_load_session(1000 L)                                            │
//! │        │  writes session + `loading` entry in one transaction           │
//! │        ▼                                                                │
//! │  ┌──────────┐   supply 600 L    ┌──────────┐   supply 400 L  ┌────────┐ │
//! │  │ ACTIVE   │ ────────────────► │ ACTIVE   │ ──────────────► │COMPLETE│ │
//! │  │ rem 1000 │                   │ rem 400  │                 │ rem 0  │ │
//! │  └──────────┘                   └──────────┘                 └────────┘ │
//! │                                                                         │
//! │  Status never moves back. Further supplies keep lowering the balance   │
//! │  below zero (over-delivery is recorded, not refused).                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use oiltrack_core::ledger::{
    generate_load_session_id, LoadSession, NewLoadSession, SessionBalance,
};
use oiltrack_core::Transaction;
use oiltrack_db::DbError;

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};

/// Fresh ids tried before giving up on a session id collision.
const MAX_ID_ATTEMPTS: usize = 3;

pub struct LedgerService<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> LedgerService<'a> {
    pub(crate) fn new(ctx: &'a LedgerContext) -> Self {
        LedgerService { ctx }
    }

    /// Opens a brand-new active session and its `loading` entry.
    ///
    /// Never merges with an existing session; several active sessions per
    /// oil type are normal. `created_by` falls back to the signed-in user,
    /// then to `anonymous`.
    ///
    /// ## Errors
    /// - `Validation` when the oil type is missing or liters ≤ 0
    /// - `Database(UniqueViolation)` if every generated id collided
    pub async fn create_load_session(&self, request: NewLoadSession) -> LedgerResult<LoadSession> {
        self.create_load_session_with_ids(request, |now| {
            generate_load_session_id(now, &mut rand::thread_rng())
        })
        .await
    }

    async fn create_load_session_with_ids<F>(
        &self,
        request: NewLoadSession,
        mut next_id: F,
    ) -> LedgerResult<LoadSession>
    where
        F: FnMut(DateTime<Utc>) -> String,
    {
        request.validate()?;

        let created_by = request
            .created_by
            .clone()
            .filter(|uid| !uid.trim().is_empty())
            .unwrap_or_else(|| self.ctx.identity().user_or_anonymous());

        let mut last_err = None;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let now = Utc::now();
            let load_session_id = next_id(now);
            let session = LoadSession::open(request.clone(), load_session_id, created_by.clone(), now);

            match self
                .ctx
                .db()
                .ledger()
                .create_load_session(&session, &session.loading_transaction())
                .await
            {
                Ok(()) => {
                    info!(
                        load_session_id = %session.load_session_id,
                        oil_type = %session.oil_type_name,
                        liters = session.total_loaded_liters,
                        "Loading recorded"
                    );
                    return Ok(session);
                }
                Err(DbError::UniqueViolation { field, value }) if field.contains("load_session_id") => {
                    warn!(
                        attempt,
                        load_session_id = %session.load_session_id,
                        "Load session id collided, generating another"
                    );
                    last_err = Some(DbError::UniqueViolation { field, value });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| DbError::Internal("load session id generation failed".into()))
            .into())
    }

    /// Active sessions, newest first.
    pub async fn active_sessions(&self) -> LedgerResult<Vec<LoadSession>> {
        Ok(self.ctx.db().load_sessions().list_active().await?)
    }

    pub async fn all_sessions(&self) -> LedgerResult<Vec<LoadSession>> {
        Ok(self.ctx.db().load_sessions().list().await?)
    }

    pub async fn get_session(&self, load_session_id: &str) -> LedgerResult<LoadSession> {
        self.ctx
            .db()
            .load_sessions()
            .get(load_session_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Load session", load_session_id))
    }

    /// Loading and supply entries of one session, oldest first.
    pub async fn session_transactions(&self, load_session_id: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .ctx
            .db()
            .transactions()
            .list_for_session(load_session_id)
            .await?)
    }

    /// Stored balance next to the one derived from the log. Read-only.
    pub async fn session_balance(&self, load_session_id: &str) -> LedgerResult<SessionBalance> {
        self.ctx
            .db()
            .ledger()
            .session_balance(load_session_id, Utc::now())
            .await?
            .ok_or_else(|| LedgerError::not_found("Load session", load_session_id))
    }

    /// Repairs every session whose stored balance disagrees with the log.
    /// Returns what was wrong; an immediate second run returns nothing.
    pub async fn reconcile_all(&self) -> LedgerResult<Vec<SessionBalance>> {
        let drifted = self.ctx.db().ledger().reconcile_all(Utc::now()).await?;
        if drifted.is_empty() {
            info!("All load session balances match the ledger");
        } else {
            warn!(sessions = drifted.len(), "Repaired drifted load session balances");
        }
        Ok(drifted)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use oiltrack_core::ledger::{is_load_session_id, LoadSessionStatus};
    use oiltrack_core::{Role, TransactionType, ValidationError};

    use super::*;
    use crate::identity::StaticIdentity;
    use crate::testing;

    fn fixed_ids(ids: &[&str]) -> impl FnMut(DateTime<Utc>) -> String {
        let mut ids: Vec<String> = ids.iter().rev().map(|id| id.to_string()).collect();
        move |_| ids.pop().unwrap_or_else(|| "LS_EXHAUSTED".into())
    }

    #[tokio::test]
    async fn test_session_id_collision_retries_with_fresh_id() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let taken = "LS_1700000000000_abcd";

        ctx.ledger()
            .create_load_session_with_ids(testing::load_request(&diesel, 500.0), fixed_ids(&[taken]))
            .await
            .unwrap();

        let session = ctx
            .ledger()
            .create_load_session_with_ids(
                testing::load_request(&diesel, 800.0),
                fixed_ids(&[taken, "LS_1700000000001_wxyz"]),
            )
            .await
            .unwrap();

        assert_eq!(session.load_session_id, "LS_1700000000001_wxyz");
        assert_eq!(session.total_loaded_liters, 800.0);
        assert_eq!(ctx.ledger().all_sessions().await.unwrap().len(), 2);
        assert_eq!(
            ctx.ledger().get_session(taken).await.unwrap().total_loaded_liters,
            500.0
        );
    }

    #[tokio::test]
    async fn test_session_id_collision_gives_up_after_max_attempts() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let taken = "LS_1700000000000_abcd";

        ctx.ledger()
            .create_load_session_with_ids(testing::load_request(&diesel, 500.0), fixed_ids(&[taken]))
            .await
            .unwrap();

        let mut calls = 0;
        let err = ctx
            .ledger()
            .create_load_session_with_ids(testing::load_request(&diesel, 800.0), |_| {
                calls += 1;
                taken.to_string()
            })
            .await
            .unwrap_err();

        assert_eq!(calls, MAX_ID_ATTEMPTS);
        assert!(matches!(
            err,
            LedgerError::Database(DbError::UniqueViolation { .. })
        ));
        assert_eq!(ctx.ledger().all_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_writes_session_and_loading_entry() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;

        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 1000.0))
            .await
            .unwrap();

        assert!(is_load_session_id(&session.load_session_id));
        assert_eq!(session.remaining_liters, 1000.0);
        assert_eq!(session.load_count, 1);
        assert_eq!(session.status, LoadSessionStatus::Active);
        assert_eq!(session.created_by, "anonymous");

        let entries = ctx
            .ledger()
            .session_transactions(&session.load_session_id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_type(), TransactionType::Loading);
        assert_eq!(entries[0].quantity, 1000.0);
    }

    #[tokio::test]
    async fn test_created_by_defaults_to_identity() {
        let (ctx, _) = testing::ctx().await;
        let ctx = ctx.with_identity(Arc::new(StaticIdentity::new("driver-9", Role::Driver)));
        let diesel = testing::oil_type(&ctx, "Diesel").await;

        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 500.0))
            .await
            .unwrap();
        assert_eq!(session.created_by, "driver-9");

        let mut explicit = testing::load_request(&diesel, 500.0);
        explicit.created_by = Some("driver-2".into());
        let session = ctx.ledger().create_load_session(explicit).await.unwrap();
        assert_eq!(session.created_by, "driver-2");
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;

        let err = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::MustBePositive { .. })
        ));
        assert!(ctx.ledger().all_sessions().await.unwrap().is_empty());
        assert!(ctx.reporting().all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rapid_creation_never_collides() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;

        let mut ids = HashSet::new();
        for _ in 0..25 {
            let session = ctx
                .ledger()
                .create_load_session(testing::load_request(&diesel, 100.0))
                .await
                .unwrap();
            assert!(ids.insert(session.load_session_id));
        }

        // Many active sessions for one oil type are allowed.
        assert_eq!(ctx.ledger().active_sessions().await.unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_active_sessions_exclude_completed() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;

        let done = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 100.0))
            .await
            .unwrap();
        let open = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 100.0))
            .await
            .unwrap();
        ctx.deliveries()
            .complete_delivery(testing::record(&done.load_session_id, &branch, &diesel, 100.0))
            .await
            .unwrap();

        let active = ctx.ledger().active_sessions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].load_session_id, open.load_session_id);
        assert_eq!(
            ctx.ledger()
                .get_session(&done.load_session_id)
                .await
                .unwrap()
                .status,
            LoadSessionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_session_balance_and_reconcile() {
        let (ctx, _) = testing::ctx().await;
        let diesel = testing::oil_type(&ctx, "Diesel").await;
        let branch = testing::branch(&ctx, "North").await;
        let session = ctx
            .ledger()
            .create_load_session(testing::load_request(&diesel, 1000.0))
            .await
            .unwrap();
        ctx.deliveries()
            .complete_delivery(testing::record(&session.load_session_id, &branch, &diesel, 250.0))
            .await
            .unwrap();

        let balance = ctx
            .ledger()
            .session_balance(&session.load_session_id)
            .await
            .unwrap();
        assert!(!balance.drifted);
        assert_eq!(balance.stored_remaining, 750.0);

        // Knock the stored balance out of line with the log.
        sqlx::query("UPDATE load_sessions SET remaining_liters = 1000, total_supplied = 0 WHERE load_session_id = ?1")
            .bind(&session.load_session_id)
            .execute(ctx.db().pool())
            .await
            .unwrap();

        let drifted = ctx.ledger().reconcile_all().await.unwrap();
        assert_eq!(drifted.len(), 1);
        assert_eq!(drifted[0].stored_remaining, 1000.0);
        assert_eq!(drifted[0].derived_remaining, 750.0);
        assert!(ctx.ledger().reconcile_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (ctx, _) = testing::ctx().await;
        let err = ctx.ledger().session_balance("LS_1_ABCD").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
