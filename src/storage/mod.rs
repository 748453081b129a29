//! Storage abstractions for "seen" markers.
//!
//! One immutable record per discussion URL ever matched. The only write is
//! [`DedupStore::claim`], an atomic check-and-insert: for a given key at most
//! one caller ever sees `true`, no matter how many polls overlap.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: process-local, for tests and dry runs
//! - [`LocalStore`]: one JSON file per key, no-clobber link as the conditional write
//! - `S3Store` (feature `s3`): `PutObject` with `If-None-Match: *`

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{Link, StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Trait for dedup store backends.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether a record exists for `key`. Absence is not an error.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch the stored record for `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<Link>>;

    /// Store `link` under its key unless a record is already there.
    ///
    /// Returns `true` only for the caller whose write created the record.
    async fn claim(&self, link: &Link) -> Result<bool>;
}

/// Stable object name for a key. Item URLs contain `?` and `/`, which make
/// poor file or object names.
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Open the backend selected in configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn DedupStore>> {
    let store: Arc<dyn DedupStore> = match config.backend {
        StorageBackend::Local => Arc::new(LocalStore::new(&config.dir)),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Arc::new(S3Store::from_config(config).await),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => {
            return Err(crate::error::AppError::config(
                "storage.backend = \"s3\" requires the `s3` feature",
            ));
        }
    };
    Ok(store)
}
