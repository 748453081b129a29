//! In-process storage implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Link;
use crate::storage::DedupStore;

/// Dedup store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    links: Mutex<HashMap<String, Link>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Link>> {
        // A poisoned map is still a consistent map: inserts are single calls.
        self.links.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock().contains_key(key))
    }

    async fn load(&self, key: &str) -> Result<Option<Link>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn claim(&self, link: &Link) -> Result<bool> {
        let mut links = self.lock();
        if links.contains_key(link.key()) {
            return Ok(false);
        }
        links.insert(link.key().to_string(), link.clone());
        Ok(true)
    }
}
