//! # OilTrack Configuration
//!
//! Settings for the store, retry policy, photo storage and reporting.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     OILTRACK_DB_PATH=/var/lib/oiltrack/oiltrack.db                     │
//! │     OILTRACK_UTC_OFFSET_MINUTES=300                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/oiltrack/oiltrack.toml (Linux)                           │
//! │     ~/Library/Application Support/com.oiltrack.oiltrack/ (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/oiltrack/oiltrack.db"
//! max_connections = 5
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 1000
//! multiplier = 2.0
//!
//! [photos]
//! root = "/var/lib/oiltrack/photos"
//! delivery_folder = "delivery-photos/"
//! loading_folder = "loading-photos/"
//!
//! [reporting]
//! utc_offset_minutes = 300  # omit to use the machine's local offset
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use oiltrack_db::{DbConfig, RetryPolicy};

use crate::error::{LedgerError, LedgerResult};
use crate::photos::{DELIVERY_PHOTOS_FOLDER, LOADING_PHOTOS_FOLDER};

/// Largest real-world UTC offset, in minutes.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "oiltrack", "oiltrack")
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first connect.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    data_dir().join("oiltrack.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Backoff for transient store failures. Base 1s, doubling, 3 attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    1000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

// =============================================================================
// Photo Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSettings {
    /// Root directory of the local photo store.
    #[serde(default = "default_photo_root")]
    pub root: PathBuf,

    #[serde(default = "default_delivery_folder")]
    pub delivery_folder: String,

    #[serde(default = "default_loading_folder")]
    pub loading_folder: String,
}

fn default_photo_root() -> PathBuf {
    data_dir().join("photos")
}

fn default_delivery_folder() -> String {
    DELIVERY_PHOTOS_FOLDER.to_string()
}

fn default_loading_folder() -> String {
    LOADING_PHOTOS_FOLDER.to_string()
}

impl Default for PhotoSettings {
    fn default() -> Self {
        PhotoSettings {
            root: default_photo_root(),
            delivery_folder: default_delivery_folder(),
            loading_folder: default_loading_folder(),
        }
    }
}

impl PhotoSettings {
    /// True if `url` points into the delivery or loading folder, the only
    /// places the photo purge may delete from.
    pub fn is_managed(&self, url: &str) -> bool {
        let Some((_, key)) = url.split_once("://") else {
            return false;
        };
        [&self.delivery_folder, &self.loading_folder]
            .iter()
            .any(|folder| key.starts_with(folder.trim_start_matches('/')))
    }
}

// =============================================================================
// Reporting Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportingSettings {
    /// Offset used for "today", CSV dates and watermark text.
    /// `None` means the machine's local offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OilTrackConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub photos: PhotoSettings,

    #[serde(default)]
    pub reporting: ReportingSettings,
}

impl OilTrackConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (oiltrack.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(LedgerError::InvalidConfig("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(LedgerError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(LedgerError::InvalidConfig(
                "retry.multiplier must be at least 1.0".into(),
            ));
        }
        for (name, folder) in [
            ("photos.delivery_folder", &self.photos.delivery_folder),
            ("photos.loading_folder", &self.photos.loading_folder),
        ] {
            if folder.trim_matches('/').is_empty() || !folder.ends_with('/') {
                return Err(LedgerError::InvalidConfig(format!(
                    "{name} must be a non-empty folder name ending in '/', got: '{folder}'"
                )));
            }
        }
        if let Some(minutes) = self.reporting.utc_offset_minutes {
            if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(LedgerError::InvalidConfig(format!(
                    "reporting.utc_offset_minutes out of range: {minutes}"
                )));
            }
        }
        Ok(())
    }

    /// Applies `OILTRACK_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("OILTRACK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("OILTRACK_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid OILTRACK_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(attempts) = var("OILTRACK_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse::<u32>() {
                self.retry.max_attempts = n;
            }
        }

        if let Some(backoff) = var("OILTRACK_RETRY_INITIAL_BACKOFF_MS") {
            if let Ok(ms) = backoff.parse::<u64>() {
                self.retry.initial_backoff_ms = ms;
            }
        }

        if let Some(root) = var("OILTRACK_PHOTO_ROOT") {
            debug!(root = %root, "Overriding photo root from environment");
            self.photos.root = PathBuf::from(root);
        }

        if let Some(offset) = var("OILTRACK_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => self.reporting.utc_offset_minutes = Some(minutes),
                Err(_) => warn!(value = %offset, "Ignoring invalid OILTRACK_UTC_OFFSET_MINUTES"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("oiltrack.toml"))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .max_attempts(self.retry.max_attempts)
            .initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .multiplier(self.retry.multiplier)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .retry(self.retry_policy())
    }

    /// Offset that local dates and times are rendered in.
    pub fn reporting_offset(&self) -> FixedOffset {
        self.reporting
            .utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or_else(|| *Local::now().offset())
    }
}
