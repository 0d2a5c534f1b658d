//! Abstract storage interfaces for pluggable backends
//!
//! Presence lives in a TTL key-value store rather than in hub memory so that
//! it can be answered by any process sharing the store. Implementations wrap
//! whatever provides "set with expiry", "delete" and "exists" semantics.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// TTL key-value store used for presence keys
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Create or refresh `key`, expiring after `ttl`
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Remove `key`; returns whether it existed and was unexpired
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Whether `key` exists and has not expired
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Batched `exists`, answers in the order of `keys`
    async fn exists_many(&self, keys: &[String]) -> Result<Vec<bool>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            found.push(self.exists(key).await?);
        }
        Ok(found)
    }

    /// Drop expired keys, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}
