//! TTL-based online status, independent of the hub's connection registry
//!
//! A user is online while their presence key exists. Heartbeats refresh it,
//! logout deletes it, and a silent disconnect simply lets it expire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::PRESENCE_KEY_PREFIX;
use crate::error::{HubError, Result};
use crate::storage::PresenceStore;

#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
    ttl: Duration,
}

fn presence_key(user_id: &str) -> Result<String> {
    if user_id.is_empty() {
        return Err(HubError::ValidationError("user id must not be empty".to_string()));
    }
    Ok(format!("{}{}", PRESENCE_KEY_PREFIX, user_id))
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn PresenceStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// (Re)set the user's liveness key for another TTL window
    pub async fn touch(&self, user_id: &str) -> Result<()> {
        let key = presence_key(user_id)?;
        self.store.set_with_ttl(&key, self.ttl).await
    }

    /// Logout fast-path: forget the user immediately
    pub async fn set_offline(&self, user_id: &str) -> Result<()> {
        let key = presence_key(user_id)?;
        self.store.delete(&key).await?;
        Ok(())
    }

    /// An `Err` means the status is unknown, not that the user is offline
    pub async fn is_online(&self, user_id: &str) -> Result<bool> {
        let key = presence_key(user_id)?;
        self.store.exists(&key).await
    }

    /// Batched status lookup
    pub async fn online_statuses(&self, user_ids: &[String]) -> Result<HashMap<String, bool>> {
        let keys = user_ids
            .iter()
            .map(|id| presence_key(id))
            .collect::<Result<Vec<_>>>()?;
        let found = self.store.exists_many(&keys).await?;
        Ok(user_ids.iter().cloned().zip(found).collect())
    }
}
