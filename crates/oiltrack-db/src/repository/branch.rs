//! # Branch Repository
//!
//! Branches with their embedded tank list (`oil_tanks` JSON column).
//!
//! Deleting a branch removes its supply transactions and deliveries in the
//! same SQLite transaction. Load sessions are untouched: they belong to an
//! oil type, not a branch.

use sqlx::SqlitePool;
use tracing::{debug, info};

use oiltrack_core::{Branch, OilTank};

use super::{decode_json, decode_ts, encode_json, encode_ts, CascadeReport};
use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: String,
    name: String,
    address: String,
    contact_no: String,
    oil_tanks: String,
    active: bool,
    created_at: String,
}

impl BranchRow {
    fn into_branch(self) -> DbResult<Branch> {
        let oil_tanks: Vec<OilTank> = decode_json("Branch", &self.id, &self.oil_tanks)?;
        Ok(Branch {
            created_at: decode_ts("Branch", &self.id, &self.created_at)?,
            id: self.id,
            name: self.name,
            address: self.address,
            contact_no: self.contact_no,
            oil_tanks,
            active: self.active,
        })
    }
}

const SELECT_BRANCH: &str =
    "SELECT id, name, address, contact_no, oil_tanks, active, created_at FROM branches";

#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        BranchRepository { pool, retry }
    }

    /// All branches, oldest first.
    pub async fn list(&self) -> DbResult<Vec<Branch>> {
        self.retry.run("list_branches", || self.list_once()).await
    }

    async fn list_once(&self) -> DbResult<Vec<Branch>> {
        let rows: Vec<BranchRow> =
            sqlx::query_as(&format!("{SELECT_BRANCH} ORDER BY created_at, rowid"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(BranchRow::into_branch).collect()
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Branch>> {
        self.retry.run("get_branch", || self.get_once(id)).await
    }

    async fn get_once(&self, id: &str) -> DbResult<Option<Branch>> {
        let row: Option<BranchRow> = sqlx::query_as(&format!("{SELECT_BRANCH} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(BranchRow::into_branch).transpose()
    }

    pub async fn insert(&self, branch: &Branch) -> DbResult<()> {
        self.retry
            .run("insert_branch", || self.insert_once(branch))
            .await
    }

    async fn insert_once(&self, branch: &Branch) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO branches (id, name, address, contact_no, oil_tanks, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.contact_no)
        .bind(encode_json(&branch.oil_tanks)?)
        .bind(branch.active)
        .bind(encode_ts(branch.created_at))
        .execute(&self.pool)
        .await?;

        debug!(id = %branch.id, tanks = branch.oil_tanks.len(), "Inserted branch");
        Ok(())
    }

    pub async fn update(&self, branch: &Branch) -> DbResult<()> {
        self.retry
            .run("update_branch", || self.update_once(branch))
            .await
    }

    async fn update_once(&self, branch: &Branch) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE branches
            SET name = ?2, address = ?3, contact_no = ?4, oil_tanks = ?5, active = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.contact_no)
        .bind(encode_json(&branch.oil_tanks)?)
        .bind(branch.active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Branch", &branch.id));
        }
        Ok(())
    }

    /// Deletes the branch and its transactions and deliveries atomically.
    pub async fn delete_cascade(&self, id: &str) -> DbResult<CascadeReport> {
        self.retry
            .run("delete_branch", || self.delete_cascade_once(id))
            .await
    }

    async fn delete_cascade_once(&self, id: &str) -> DbResult<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let transactions = sqlx::query("DELETE FROM transactions WHERE branch_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deliveries = sqlx::query("DELETE FROM deliveries WHERE branch_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM branches WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Branch", id));
        }
        tx.commit().await?;

        info!(id, transactions, deliveries, "Deleted branch with dependents");
        Ok(CascadeReport {
            transactions,
            deliveries,
            load_sessions: 0,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
