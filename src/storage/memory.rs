//! In-memory TTL store for development, tests and single-instance deployments
//!
//! Expiry is checked on read, so a key is never reported after its deadline
//! even if the background sweep has not run yet.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::traits::PresenceStore;
use crate::error::{HubError, Result};

/// In-memory presence storage
pub struct MemoryPresenceStore {
    // key -> expiry deadline
    entries: Arc<RwLock<HashMap<String, Instant>>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start background sweep of expired keys.
    ///
    /// The task only holds a weak reference and exits once the store is dropped.
    pub fn start_cleanup_task(self: Arc<Self>, sweep_interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(&self);
        drop(self);
        tokio::spawn(async move {
            // tokio intervals need a non-zero period
            let mut interval = tokio::time::interval(sweep_interval.max(Duration::from_millis(1)));
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    log::debug!("Presence store dropped, stopping sweep");
                    break;
                };
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => log::debug!("Purged {} expired presence keys", removed),
                    Err(e) => log::error!("Failed to purge expired presence keys: {}", e),
                }
            }
        })
    }

    /// Number of stored keys, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryPresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(ttl).ok_or_else(|| {
            HubError::PresenceError(format!("ttl {:?} for key {} is out of range", ttl, key))
        })?;
        self.entries.write().await.insert(key.to_string(), deadline);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.entries.write().await.remove(key);
        Ok(removed.map_or(false, |deadline| deadline > Instant::now()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .map_or(false, |deadline| *deadline > Instant::now()))
    }

    async fn exists_many(&self, keys: &[String]) -> Result<Vec<bool>> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| entries.get(key).map_or(false, |deadline| *deadline > now))
            .collect())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, deadline| *deadline > now);
        Ok(before - entries.len())
    }
}
