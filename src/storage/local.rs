//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── links/
//!     └── {sha256(item_url)}.json   # one immutable record per story
//! ```
//!
//! A record is written to a private temp file and then hard-linked into
//! place. Linking never replaces an existing file, so concurrent claimers
//! (threads or separate processes sharing the directory) race on the link
//! and exactly one wins.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::{Link, LinkRecord};
use crate::storage::{DedupStore, key_digest};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Record path for a key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir
            .join("links")
            .join(format!("{}.json", key_digest(key)))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write the record unless one is already in place.
    async fn put(&self, link: &Link) -> Result<bool> {
        let path = self.path(link.key());
        self.ensure_dir(&path).await?;

        let bytes = serde_json::to_vec_pretty(&LinkRecord::new(link.clone()))?;
        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        match stage_and_link(&tmp, &path, &bytes).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("Lost claim race for {}", link.key());
                Ok(false)
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Write `bytes` to `tmp`, then hard-link it to `path`.
///
/// `tmp` is removed afterwards whatever happened, including a failed write.
async fn stage_and_link(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let linked = match write_synced(tmp, bytes).await {
        Ok(()) => tokio::fs::hard_link(tmp, path).await,
        Err(e) => Err(e),
    };
    match tokio::fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", tmp.display(), e),
    }
    linked
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl DedupStore for LocalStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        match tokio::fs::metadata(self.path(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn load(&self, key: &str) -> Result<Option<Link>> {
        match self.read_bytes(&self.path(key)).await? {
            Some(bytes) => {
                let record: LinkRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(record.link))
            }
            None => Ok(None),
        }
    }

    async fn claim(&self, link: &Link) -> Result<bool> {
        if self.exists(link.key()).await? {
            return Ok(false);
        }
        self.put(link).await
    }
}
