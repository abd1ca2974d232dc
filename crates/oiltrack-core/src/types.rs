//! # Domain Types
//!
//! Reference data and shared value types used throughout OilTrack.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Reference Data                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    OilType      │   │     Branch      │   │     Driver      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  oil_tanks[]    │   │  uid            │       │
//! │  │  name           │   │  name, address  │   │  display_name   │       │
//! │  │  color          │   │  contact_no     │   │  email, role    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │          ▲                      ▲                     ▲                 │
//! │          │ by id                │ by id               │ by uid          │
//! │  ┌───────┴──────────────────────┴─────────────────────┴──────────┐     │
//! │  │   LoadSession / Transaction / Delivery  (see `ledger`)         │     │
//! │  └────────────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! References from the ledger are soft: nothing stops a transaction from
//! naming a branch that was since deleted, and reporting substitutes an
//! `Unknown X` label when the lookup misses.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Oil Type
// =============================================================================

/// A grade of oil the business loads and supplies (e.g. Diesel, Petrol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OilType {
    pub id: String,
    pub name: String,
    /// Display color used by dashboards (hex string).
    pub color: String,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating an oil type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewOilType {
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// Partial update for an oil type. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OilTypePatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub active: Option<bool>,
}

impl OilType {
    /// Applies a partial update in place.
    pub fn apply(&mut self, patch: OilTypePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
    }
}

// =============================================================================
// Branch
// =============================================================================

/// A storage tank at a branch, tied to exactly one oil type.
///
/// Levels are maintained by hand; deliveries do not move them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OilTank {
    pub id: String,
    pub capacity: f64,
    pub oil_type_id: String,
    pub oil_type_name: String,
    pub current_level: f64,
}

/// A customer site that receives supplies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub address: String,
    pub contact_no: String,
    pub oil_tanks: Vec<OilTank>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact_no: String,
    #[serde(default)]
    pub oil_tanks: Vec<OilTank>,
}

/// Partial update for a branch. A supplied `oil_tanks` replaces the whole list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BranchPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub contact_no: Option<String>,
    pub oil_tanks: Option<Vec<OilTank>>,
    pub active: Option<bool>,
}

impl Branch {
    /// Applies a partial update in place.
    pub fn apply(&mut self, patch: BranchPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(contact_no) = patch.contact_no {
            self.contact_no = contact_no;
        }
        if let Some(tanks) = patch.oil_tanks {
            self.oil_tanks = tanks;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
    }

    /// Total tank capacity for one oil type at this branch.
    pub fn capacity_for(&self, oil_type_id: &str) -> f64 {
        self.oil_tanks
            .iter()
            .filter(|t| t.oil_type_id == oil_type_id)
            .map(|t| t.capacity)
            .sum()
    }
}

// =============================================================================
// Role
// =============================================================================

/// User role. Gates dashboard access only; ledger logic never consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    User,
    Business,
}

impl Default for Role {
    fn default() -> Self {
        Role::Driver
    }
}

/// Dashboard areas behind role gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Admin,
    Driver,
    Business,
}

impl Role {
    /// Returns true if this role may open the given dashboard area.
    ///
    /// Admins see everything; drivers see the driver dashboard; business and
    /// plain users share the business view.
    pub fn can_access(&self, area: Area) -> bool {
        match (self, area) {
            (Role::Admin, _) => true,
            (Role::Driver, Area::Driver) => true,
            (Role::Business | Role::User, Area::Business) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::User => "user",
            Role::Business => "business",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            "user" => Ok(Role::User),
            "business" => Ok(Role::Business),
            _ => Err(ValidationError::NotAllowed {
                field: "role".into(),
                allowed: vec![
                    "admin".into(),
                    "driver".into(),
                    "user".into(),
                    "business".into(),
                ],
            }),
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

/// An entry in the user directory. Drivers are users with `Role::Driver`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub active: bool,
    pub emp_no: Option<String>,
    pub driver_licence_no: Option<String>,
    pub tanker_licence_no: Option<String>,
    #[ts(as = "Option<String>")]
    pub licence_expiry_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for registering a driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewDriver {
    /// Auth uid when the account already exists; generated otherwise.
    pub uid: Option<String>,
    pub email: String,
    pub display_name: Option<String>,
    pub emp_no: Option<String>,
    pub driver_licence_no: Option<String>,
    pub tanker_licence_no: Option<String>,
    #[ts(as = "Option<String>")]
    pub licence_expiry_date: Option<NaiveDate>,
}

impl NewDriver {
    /// Tanker licence number, falling back to the driving licence for
    /// records created before the two were tracked separately.
    pub fn effective_tanker_licence(&self) -> Option<String> {
        self.tanker_licence_no
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.driver_licence_no.clone())
    }
}

/// Partial update for a driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DriverPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub active: Option<bool>,
    pub emp_no: Option<String>,
    pub driver_licence_no: Option<String>,
    pub tanker_licence_no: Option<String>,
    #[ts(as = "Option<String>")]
    pub licence_expiry_date: Option<NaiveDate>,
}

impl Driver {
    /// Applies a partial update in place and stamps `updated_at`.
    pub fn apply(&mut self, patch: DriverPatch, now: DateTime<Utc>) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(name) = patch.display_name {
            self.display_name = Some(name);
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(emp_no) = patch.emp_no {
            self.emp_no = Some(emp_no);
        }
        if let Some(licence) = patch.driver_licence_no {
            self.driver_licence_no = Some(licence);
        }
        if let Some(licence) = patch.tanker_licence_no {
            self.tanker_licence_no = Some(licence);
        }
        if let Some(expiry) = patch.licence_expiry_date {
            self.licence_expiry_date = Some(expiry);
        }
        self.updated_at = Some(now);
    }

    /// True once the licence expiry date has passed.
    pub fn licence_expired(&self, today: NaiveDate) -> bool {
        self.licence_expiry_date.is_some_and(|d| d < today)
    }
}

// =============================================================================
// Photos
// =============================================================================

/// Well-known photo slots.
pub mod photo_keys {
    /// Tank level before a supply.
    pub const TANK_LEVEL_BEFORE: &str = "tankLevelBefore";
    /// Hose hooked up to the branch tank.
    pub const HOSE_CONNECTION: &str = "hoseConnection";
    /// Tank level after a supply.
    pub const TANK_LEVEL_AFTER: &str = "tankLevelAfter";
    /// Loading meter reading.
    pub const METER_READING_PHOTO: &str = "meterReadingPhoto";

    /// Legacy names still present on older delivery records, with the
    /// canonical slot each one maps onto.
    pub const LEGACY_ALIASES: &[(&str, &str)] = &[
        ("tankLevel", TANK_LEVEL_BEFORE),
        ("tankLevelPhoto", TANK_LEVEL_BEFORE),
        ("hoseConnectionPhoto", HOSE_CONNECTION),
        ("finalTankLevel", TANK_LEVEL_AFTER),
        ("finalTankLevelPhoto", TANK_LEVEL_AFTER),
        ("meterReading", METER_READING_PHOTO),
        ("loadPhoto", METER_READING_PHOTO),
    ];
}

/// Photo slot name → blob URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct Photos(BTreeMap<String, String>);

impl Photos {
    pub fn new() -> Self {
        Photos(BTreeMap::new())
    }

    /// Sets a slot. Empty URLs are ignored.
    pub fn insert(&mut self, key: impl Into<String>, url: impl Into<String>) {
        let url = url.into();
        if !url.is_empty() {
            self.0.insert(key.into(), url);
        }
    }

    /// Builder-style `insert`.
    pub fn with(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.insert(key, url);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|s| !s.is_empty())
    }

    /// First non-empty URL among the given slots.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with every legacy slot folded into its canonical name.
    /// A canonical slot that is already set wins over its legacy alias.
    pub fn canonicalized(&self) -> Photos {
        let mut out = BTreeMap::new();
        for (key, url) in &self.0 {
            if url.is_empty() {
                continue;
            }
            let canonical = photo_keys::LEGACY_ALIASES
                .iter()
                .find(|(legacy, _)| legacy == key)
                .map(|(_, canonical)| *canonical);
            match canonical {
                Some(name) => {
                    out.entry(name.to_string()).or_insert_with(|| url.clone());
                }
                None => {
                    out.insert(key.clone(), url.clone());
                }
            }
        }
        Photos(out)
    }
}

impl FromIterator<(String, String)> for Photos {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut photos = Photos::new();
        for (k, v) in iter {
            photos.insert(k, v);
        }
        photos
    }
}

// =============================================================================
// Collections
// =============================================================================

/// Record collections addressable by the bulk date-range purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Deliveries,
    Complaints,
    Branches,
    OilTypes,
    Tasks,
    LoadSessions,
    Transactions,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Users,
        Collection::Deliveries,
        Collection::Complaints,
        Collection::Branches,
        Collection::OilTypes,
        Collection::Tasks,
        Collection::LoadSessions,
        Collection::Transactions,
    ];

    /// Name as the dashboard addresses it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Deliveries => "deliveries",
            Collection::Complaints => "complaints",
            Collection::Branches => "branches",
            Collection::OilTypes => "oilTypes",
            Collection::Tasks => "tasks",
            Collection::LoadSessions => "loadSessions",
            Collection::Transactions => "transactions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::error::CoreError::UnknownCollection(s.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gating() {
        assert!(Role::Admin.can_access(Area::Driver));
        assert!(Role::Driver.can_access(Area::Driver));
        assert!(!Role::Driver.can_access(Area::Admin));
        assert!(Role::Business.can_access(Area::Business));
        assert!(!Role::User.can_access(Area::Admin));
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_photos_skip_empty_urls() {
        let photos = Photos::new()
            .with(photo_keys::TANK_LEVEL_BEFORE, "")
            .with(photo_keys::HOSE_CONNECTION, "https://cdn/x.jpg");
        assert_eq!(photos.len(), 1);
        assert_eq!(photos.get(photo_keys::TANK_LEVEL_BEFORE), None);
    }

    #[test]
    fn test_photos_canonicalize_legacy_keys() {
        let photos = Photos::new()
            .with("tankLevel", "a")
            .with("finalTankLevel", "b")
            .with(photo_keys::TANK_LEVEL_AFTER, "c")
            .with("meterReading", "d");

        let canonical = photos.canonicalized();
        assert_eq!(canonical.get(photo_keys::TANK_LEVEL_BEFORE), Some("a"));
        // canonical slot already present wins
        assert_eq!(canonical.get(photo_keys::TANK_LEVEL_AFTER), Some("c"));
        assert_eq!(canonical.get(photo_keys::METER_READING_PHOTO), Some("d"));
        assert_eq!(canonical.get("tankLevel"), None);
    }

    #[test]
    fn test_collection_names() {
        assert_eq!("oilTypes".parse::<Collection>().unwrap(), Collection::OilTypes);
        assert_eq!(Collection::LoadSessions.to_string(), "loadSessions");
        assert!("widgets".parse::<Collection>().is_err());
    }

    #[test]
    fn test_tanker_licence_falls_back() {
        let driver = NewDriver {
            email: "d@example.com".into(),
            driver_licence_no: Some("DL-1".into()),
            ..Default::default()
        };
        assert_eq!(driver.effective_tanker_licence().as_deref(), Some("DL-1"));
    }

    #[test]
    fn test_branch_patch_merges() {
        let mut branch = Branch {
            id: "b1".into(),
            name: "North".into(),
            address: "1 Road".into(),
            contact_no: "555".into(),
            oil_tanks: vec![],
            active: true,
            created_at: Utc::now(),
        };
        branch.apply(BranchPatch {
            address: Some("2 Road".into()),
            ..Default::default()
        });
        assert_eq!(branch.name, "North");
        assert_eq!(branch.address, "2 Road");
    }
}
