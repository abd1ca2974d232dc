//! # Driver Repository
//!
//! The user directory lives in `users`; drivers are the rows with
//! `role = 'driver'`. Reporting reads every row for name enrichment, so
//! [`DriverRepository::list_users`] does not filter by role.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use oiltrack_core::{Driver, Role};

use super::{decode_opt_ts, decode_ts, encode_opt_ts, encode_ts};
use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    uid: String,
    email: String,
    display_name: Option<String>,
    role: Role,
    active: bool,
    emp_no: Option<String>,
    driver_licence_no: Option<String>,
    tanker_licence_no: Option<String>,
    licence_expiry_date: Option<NaiveDate>,
    created_at: String,
    updated_at: Option<String>,
    last_login_at: Option<String>,
}

impl UserRow {
    fn into_driver(self) -> DbResult<Driver> {
        let created_at = decode_ts("User", &self.uid, &self.created_at)?;
        let updated_at = decode_opt_ts("User", &self.uid, self.updated_at.as_deref())?;
        let last_login_at = decode_opt_ts("User", &self.uid, self.last_login_at.as_deref())?;
        Ok(Driver {
            uid: self.uid,
            email: self.email,
            display_name: self.display_name,
            role: self.role,
            active: self.active,
            emp_no: self.emp_no,
            driver_licence_no: self.driver_licence_no,
            tanker_licence_no: self.tanker_licence_no,
            licence_expiry_date: self.licence_expiry_date,
            created_at,
            updated_at,
            last_login_at,
        })
    }
}

const SELECT_USER: &str = r#"
    SELECT uid, email, display_name, role, active, emp_no, driver_licence_no,
           tanker_licence_no, licence_expiry_date, created_at, updated_at, last_login_at
    FROM users
"#;

#[derive(Debug, Clone)]
pub struct DriverRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl DriverRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        DriverRepository { pool, retry }
    }

    /// Users with the driver role, by display name.
    pub async fn list(&self) -> DbResult<Vec<Driver>> {
        self.retry
            .run("list_drivers", || self.list_where(Some(Role::Driver)))
            .await
    }

    /// Every user regardless of role.
    pub async fn list_users(&self) -> DbResult<Vec<Driver>> {
        self.retry
            .run("list_users", || self.list_where(None))
            .await
    }

    async fn list_where(&self, role: Option<Role>) -> DbResult<Vec<Driver>> {
        let rows: Vec<UserRow> = match role {
            Some(role) => {
                sqlx::query_as(&format!(
                    "{SELECT_USER} WHERE role = ?1 ORDER BY COALESCE(display_name, email)"
                ))
                .bind(role)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!("{SELECT_USER} ORDER BY created_at, rowid"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(UserRow::into_driver).collect()
    }

    pub async fn get(&self, uid: &str) -> DbResult<Option<Driver>> {
        self.retry.run("get_driver", || self.get_once(uid)).await
    }

    async fn get_once(&self, uid: &str) -> DbResult<Option<Driver>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE uid = ?1"))
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRow::into_driver).transpose()
    }

    /// `UniqueViolation` if the uid is already registered.
    pub async fn insert(&self, driver: &Driver) -> DbResult<()> {
        self.retry
            .run("insert_driver", || self.insert_once(driver))
            .await
    }

    async fn insert_once(&self, driver: &Driver) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                uid, email, display_name, role, active, emp_no, driver_licence_no,
                tanker_licence_no, licence_expiry_date, created_at, updated_at, last_login_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&driver.uid)
        .bind(&driver.email)
        .bind(&driver.display_name)
        .bind(driver.role)
        .bind(driver.active)
        .bind(&driver.emp_no)
        .bind(&driver.driver_licence_no)
        .bind(&driver.tanker_licence_no)
        .bind(driver.licence_expiry_date)
        .bind(encode_ts(driver.created_at))
        .bind(encode_opt_ts(driver.updated_at))
        .bind(encode_opt_ts(driver.last_login_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: driver.uid.clone(),
            },
            other => other,
        })?;

        debug!(uid = %driver.uid, role = %driver.role, "Inserted user");
        Ok(())
    }

    pub async fn update(&self, driver: &Driver) -> DbResult<()> {
        self.retry
            .run("update_driver", || self.update_once(driver))
            .await
    }

    async fn update_once(&self, driver: &Driver) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?2, display_name = ?3, role = ?4, active = ?5, emp_no = ?6,
                driver_licence_no = ?7, tanker_licence_no = ?8, licence_expiry_date = ?9,
                updated_at = ?10
            WHERE uid = ?1
            "#,
        )
        .bind(&driver.uid)
        .bind(&driver.email)
        .bind(&driver.display_name)
        .bind(driver.role)
        .bind(driver.active)
        .bind(&driver.emp_no)
        .bind(&driver.driver_licence_no)
        .bind(&driver.tanker_licence_no)
        .bind(driver.licence_expiry_date)
        .bind(encode_opt_ts(driver.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Driver", &driver.uid));
        }
        Ok(())
    }

    pub async fn record_login(&self, uid: &str, at: DateTime<Utc>) -> DbResult<()> {
        self.retry
            .run("record_login", || async move {
                sqlx::query("UPDATE users SET last_login_at = ?2 WHERE uid = ?1")
                    .bind(uid)
                    .bind(encode_ts(at))
                    .execute(&self.pool)
                    .await?;
                Ok(())
            })
            .await
    }

    /// Removes the user. Ledger rows keep the uid and fall back in reports.
    pub async fn delete(&self, uid: &str) -> DbResult<()> {
        self.retry
            .run("delete_driver", || async move {
                let result = sqlx::query("DELETE FROM users WHERE uid = ?1")
                    .bind(uid)
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::not_found("Driver", uid));
                }
                Ok(())
            })
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
