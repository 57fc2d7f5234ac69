pub mod disk;
pub mod memory;
pub mod model;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time;
use tracing::{debug, warn};

pub use self::disk::RedbStore;
pub use self::memory::MemoryStore;
pub use self::model::StoredEntry;

/// Key-value store with native expiry.
///
/// `take` must be atomic: of any number of concurrent `take` calls for one
/// key, at most one observes the value.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Insert or overwrite `key`, expiring it after `ttl`.
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Read a live value without removing it.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Returns true if a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove `key` and return its value if it was live.
    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Drop every expired entry. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

/// Spawn a background Tokio task that calls `purge_expired()` every `interval`.
pub fn spawn_sweep(store: Arc<dyn KvStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.tick().await; // skip first immediate tick
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "sweep purged expired secrets"),
                Err(e) => warn!(error = %e, "background sweep error"),
            }
        }
    });
}
