//! # Reference Data Service
//!
//! Oil types, branches and the driver directory.
//!
//! Deleting an oil type or a branch takes its ledger history with it, in one
//! store transaction. Deleting a driver does not: past entries keep the uid
//! and reports fall back to the recorded name.

use chrono::Utc;
use tracing::{info, warn};

use oiltrack_core::ledger::generate_record_id;
use oiltrack_core::validation::{validate_name, validate_positive, validate_required};
use oiltrack_core::{
    Branch, BranchPatch, Driver, DriverPatch, NewBranch, NewDriver, NewOilType, OilTank, OilType,
    OilTypePatch, Role, ValidationError,
};
use oiltrack_db::CascadeReport;

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};

/// Colour given to an oil type created without one.
pub const DEFAULT_OIL_COLOR: &str = "#f97316";

pub struct ReferenceService<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> ReferenceService<'a> {
    pub(crate) fn new(ctx: &'a LedgerContext) -> Self {
        ReferenceService { ctx }
    }

    // =========================================================================
    // Oil Types
    // =========================================================================

    pub async fn create_oil_type(&self, input: NewOilType) -> LedgerResult<OilType> {
        validate_name("name", &input.name)?;

        let color = match input.color.trim() {
            "" => DEFAULT_OIL_COLOR.to_string(),
            c => c.to_string(),
        };
        let oil_type = OilType {
            id: generate_record_id(),
            name: input.name.trim().to_string(),
            color,
            active: true,
            created_at: Utc::now(),
        };
        self.ctx.db().oil_types().insert(&oil_type).await?;

        info!(id = %oil_type.id, name = %oil_type.name, "Oil type created");
        Ok(oil_type)
    }

    pub async fn list_oil_types(&self) -> LedgerResult<Vec<OilType>> {
        Ok(self.ctx.db().oil_types().list().await?)
    }

    pub async fn get_oil_type(&self, id: &str) -> LedgerResult<OilType> {
        self.ctx
            .db()
            .oil_types()
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Oil type", id))
    }

    pub async fn update_oil_type(&self, id: &str, patch: OilTypePatch) -> LedgerResult<OilType> {
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }
        let mut oil_type = self.get_oil_type(id).await?;
        oil_type.apply(patch);
        self.ctx.db().oil_types().update(&oil_type).await?;
        Ok(oil_type)
    }

    /// Removes the oil type with every session, entry and delivery of it.
    pub async fn delete_oil_type(&self, id: &str) -> LedgerResult<CascadeReport> {
        let report = self.ctx.db().oil_types().delete_cascade(id).await?;
        if report.total_dependents() > 0 {
            warn!(
                id,
                load_sessions = report.load_sessions,
                transactions = report.transactions,
                deliveries = report.deliveries,
                "Oil type deleted together with its ledger history"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // Branches
    // =========================================================================

    pub async fn create_branch(&self, input: NewBranch) -> LedgerResult<Branch> {
        validate_name("name", &input.name)?;
        let oil_tanks = prepare_tanks(input.oil_tanks)?;

        let branch = Branch {
            id: generate_record_id(),
            name: input.name.trim().to_string(),
            address: input.address,
            contact_no: input.contact_no,
            oil_tanks,
            active: true,
            created_at: Utc::now(),
        };
        self.ctx.db().branches().insert(&branch).await?;

        info!(id = %branch.id, name = %branch.name, tanks = branch.oil_tanks.len(), "Branch created");
        Ok(branch)
    }

    pub async fn list_branches(&self) -> LedgerResult<Vec<Branch>> {
        Ok(self.ctx.db().branches().list().await?)
    }

    pub async fn get_branch(&self, id: &str) -> LedgerResult<Branch> {
        self.ctx
            .db()
            .branches()
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Branch", id))
    }

    /// A supplied tank list replaces the stored one.
    pub async fn update_branch(&self, id: &str, mut patch: BranchPatch) -> LedgerResult<Branch> {
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }
        if let Some(tanks) = patch.oil_tanks.take() {
            patch.oil_tanks = Some(prepare_tanks(tanks)?);
        }
        let mut branch = self.get_branch(id).await?;
        branch.apply(patch);
        self.ctx.db().branches().update(&branch).await?;
        Ok(branch)
    }

    /// Removes the branch with its supply entries and deliveries.
    pub async fn delete_branch(&self, id: &str) -> LedgerResult<CascadeReport> {
        let report = self.ctx.db().branches().delete_cascade(id).await?;
        if report.total_dependents() > 0 {
            warn!(
                id,
                transactions = report.transactions,
                deliveries = report.deliveries,
                "Branch deleted together with its ledger history"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // Drivers
    // =========================================================================

    /// Adds a driver to the directory. The uid is generated when the account
    /// does not exist yet.
    pub async fn register_driver(&self, input: NewDriver) -> LedgerResult<Driver> {
        validate_email(&input.email)?;

        let tanker_licence_no = input.effective_tanker_licence();
        let uid = input
            .uid
            .filter(|uid| !uid.trim().is_empty())
            .unwrap_or_else(generate_record_id);
        let driver = Driver {
            uid,
            email: input.email.trim().to_string(),
            display_name: input.display_name,
            role: Role::Driver,
            active: true,
            emp_no: input.emp_no,
            driver_licence_no: input.driver_licence_no,
            tanker_licence_no,
            licence_expiry_date: input.licence_expiry_date,
            created_at: Utc::now(),
            updated_at: None,
            last_login_at: None,
        };
        self.ctx.db().drivers().insert(&driver).await?;

        info!(uid = %driver.uid, "Driver registered");
        Ok(driver)
    }

    /// Users with the driver role.
    pub async fn list_drivers(&self) -> LedgerResult<Vec<Driver>> {
        Ok(self.ctx.db().drivers().list().await?)
    }

    /// Every user, for name lookups.
    pub async fn list_users(&self) -> LedgerResult<Vec<Driver>> {
        Ok(self.ctx.db().drivers().list_users().await?)
    }

    pub async fn get_driver(&self, uid: &str) -> LedgerResult<Driver> {
        self.ctx
            .db()
            .drivers()
            .get(uid)
            .await?
            .ok_or_else(|| LedgerError::not_found("Driver", uid))
    }

    pub async fn update_driver(&self, uid: &str, patch: DriverPatch) -> LedgerResult<Driver> {
        if let Some(email) = &patch.email {
            validate_email(email)?;
        }
        let mut driver = self.get_driver(uid).await?;
        driver.apply(patch, Utc::now());
        self.ctx.db().drivers().update(&driver).await?;
        Ok(driver)
    }

    pub async fn record_login(&self, uid: &str) -> LedgerResult<()> {
        Ok(self.ctx.db().drivers().record_login(uid, Utc::now()).await?)
    }

    pub async fn delete_driver(&self, uid: &str) -> LedgerResult<()> {
        self.ctx.db().drivers().delete(uid).await?;
        info!(uid, "Driver removed");
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    validate_required("email", email)?;
    if !email.contains('@') {
        return Err(ValidationError::InvalidFormat {
            field: "email".into(),
            reason: "missing '@'".into(),
        });
    }
    Ok(())
}

/// Checks tank figures and gives every tank an id.
fn prepare_tanks(tanks: Vec<OilTank>) -> Result<Vec<OilTank>, ValidationError> {
    tanks
        .into_iter()
        .map(|mut tank| {
            validate_required("oilTypeId", &tank.oil_type_id)?;
            validate_positive("capacity", tank.capacity)?;
            if tank.current_level < 0.0 || tank.current_level > tank.capacity {
                return Err(ValidationError::InvalidFormat {
                    field: "currentLevel".into(),
                    reason: format!("must be between 0 and {}", tank.capacity),
                });
            }
            if tank.id.trim().is_empty() {
                tank.id = generate_record_id();
            }
            Ok(tank)
        })
        .collect()
}
