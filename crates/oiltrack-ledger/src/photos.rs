//! # Photo Storage
//!
//! Blob storage and watermarking boundaries for delivery and loading photos.
//!
//! ## URL Scheme
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MemoryPhotoStore   memory://delivery-photos/<uuid>.jpg                 │
//! │  LocalPhotoStore    local://loading-photos/<uuid>.jpg                   │
//! │                          └──── folder ───┘└ object ┘                    │
//! │                                                                         │
//! │  Only objects under the configured delivery and loading folders are  │
//! │  ever deleted by the photo purge.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pixel-level rendering is not done here; a [`Watermarker`] receives the
//! bytes and the caption and returns the stamped image.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Folder for supply photos.
pub const DELIVERY_PHOTOS_FOLDER: &str = "delivery-photos/";

/// Folder for loading photos.
pub const LOADING_PHOTOS_FOLDER: &str = "loading-photos/";

const MEMORY_SCHEME: &str = "memory://";
const LOCAL_SCHEME: &str = "local://";

/// `MM/DD/YYYY, hh:mm:ss AM` like the dashboard's local time strings.
const WATERMARK_TIME_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Photo not found: {0}")]
    NotFound(String),

    /// URL not understood by this store, or pointing outside it.
    #[error("Invalid photo URL: {0}")]
    InvalidUrl(String),

    #[error("Watermark failed: {0}")]
    Watermark(String),

    #[error("Photo I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PhotoResult<T> = Result<T, PhotoError>;

/// Caption stamped onto a repaired photo: `<branch> | <local timestamp>`.
pub fn watermark_text<Tz: TimeZone>(branch_name: &str, at: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} | {}",
        branch_name,
        at.with_timezone(tz).format(WATERMARK_TIME_FORMAT)
    )
}

fn object_key(folder: &str) -> String {
    format!("{}/{}.jpg", folder.trim_matches('/'), Uuid::new_v4())
}

// =============================================================================
// Traits
// =============================================================================

/// Blob storage for photos.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Stores `bytes` under `folder` and returns the download URL.
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> PhotoResult<String>;

    async fn fetch(&self, url: &str) -> PhotoResult<Vec<u8>>;

    async fn delete(&self, url: &str) -> PhotoResult<()>;
}

/// Stamps a caption onto an image.
pub trait Watermarker: Send + Sync {
    fn watermark(&self, image: &[u8], text: &str) -> PhotoResult<Vec<u8>>;
}

/// Returns the image untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughWatermarker;

impl Watermarker for PassthroughWatermarker {
    fn watermark(&self, image: &[u8], _text: &str) -> PhotoResult<Vec<u8>> {
        Ok(image.to_vec())
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryPhotoStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.blobs.read().await.contains_key(url)
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> PhotoResult<String> {
        let url = format!("{MEMORY_SCHEME}{}", object_key(folder));
        self.blobs.write().await.insert(url.clone(), bytes);
        debug!(url = %url, "Photo stored in memory");
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> PhotoResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| PhotoError::NotFound(url.to_string()))
    }

    async fn delete(&self, url: &str) -> PhotoResult<()> {
        self.blobs
            .write()
            .await
            .remove(url)
            .map(|_| ())
            .ok_or_else(|| PhotoError::NotFound(url.to_string()))
    }
}

// =============================================================================
// Local Filesystem Store
// =============================================================================

/// Stores photos as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalPhotoStore {
    root: PathBuf,
}

impl LocalPhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalPhotoStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a `local://` URL onto a file below the root. Rejects anything
    /// that could escape it.
    fn resolve(&self, url: &str) -> PhotoResult<PathBuf> {
        let key = url
            .strip_prefix(LOCAL_SCHEME)
            .ok_or_else(|| PhotoError::InvalidUrl(url.to_string()))?;
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(PhotoError::InvalidUrl(url.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or_io(err: std::io::Error, url: &str) -> PhotoError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PhotoError::NotFound(url.to_string())
    } else {
        PhotoError::Io(err)
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> PhotoResult<String> {
        let url = format!("{LOCAL_SCHEME}{}", object_key(folder));
        let path = self.resolve(&url)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(url = %url, ?path, "Photo written");
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> PhotoResult<Vec<u8>> {
        let path = self.resolve(url)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, url))
    }

    async fn delete(&self, url: &str) -> PhotoResult<()> {
        let path = self.resolve(url)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryPhotoStore::new();
        let url = store
            .upload(b"jpeg".to_vec(), DELIVERY_PHOTOS_FOLDER)
            .await
            .unwrap();
        assert!(url.starts_with("memory://delivery-photos/"));
        assert!(url.ends_with(".jpg"));
        assert_eq!(store.fetch(&url).await.unwrap(), b"jpeg");

        store.delete(&url).await.unwrap();
        assert!(matches!(store.fetch(&url).await, Err(PhotoError::NotFound(_))));
        assert!(matches!(store.delete(&url).await, Err(PhotoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path());

        let url = store
            .upload(b"loading".to_vec(), LOADING_PHOTOS_FOLDER)
            .await
            .unwrap();
        assert!(url.starts_with("local://loading-photos/"));
        assert!(dir.path().join("loading-photos").is_dir());
        assert_eq!(store.fetch(&url).await.unwrap(), b"loading");

        store.delete(&url).await.unwrap();
        assert!(matches!(store.fetch(&url).await, Err(PhotoError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_store_rejects_escaping_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path());

        for url in [
            "local://../secret.jpg",
            "local:///etc/passwd",
            "local://",
            "https://example.com/a.jpg",
        ] {
            assert!(
                matches!(store.fetch(url).await, Err(PhotoError::InvalidUrl(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_watermark_text_uses_local_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 17, 30, 5).unwrap();
        let pkt = FixedOffset::east_opt(5 * 3600).unwrap();
        assert_eq!(
            watermark_text("North Depot", at, &pkt),
            "North Depot | 03/10/2024, 10:30:05 PM"
        );
    }
}
