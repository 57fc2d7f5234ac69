use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use zeroize::Zeroizing;

use super::KvStore;

struct MemoryEntry {
    value: Zeroizing<Vec<u8>>,
    deadline: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// In-process store. Contents are lost on restart.
///
/// Deadlines use the tokio clock, so paused-time tests can drive expiry.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let entry = MemoryEntry {
            value: Zeroizing::new(value.to_vec()),
            deadline: Instant::now() + ttl,
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.to_vec()));
            }
        }
        // The shard guard from `get` must be released before removing.
        self.entries.remove_if(key, |_, e| e.is_expired(now));
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, e)| !e.is_expired(now)))
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, mut entry)) if !entry.is_expired(now) => {
                Ok(Some(std::mem::take(&mut *entry.value)))
            }
            _ => Ok(None),
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = !e.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn take_is_destructive() {
        let s = MemoryStore::new();
        s.set_with_expiry("k", b"once", HOUR).await.unwrap();
        assert_eq!(s.get("k").await.unwrap(), Some(b"once".to_vec()));
        assert_eq!(s.take("k").await.unwrap(), Some(b"once".to_vec()));
        assert_eq!(s.take("k").await.unwrap(), None);
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn delete_reports_live_entries_only() {
        let s = MemoryStore::new();
        s.set_with_expiry("k", b"v", HOUR).await.unwrap();
        assert!(s.delete("k").await.unwrap());
        assert!(!s.delete("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_on_the_tokio_clock() {
        let s = MemoryStore::new();
        s.set_with_expiry("k", b"v", HOUR).await.unwrap();

        tokio::time::advance(HOUR - Duration::from_secs(1)).await;
        assert_eq!(s.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(s.get("k").await.unwrap(), None);
        // lazily evicted by the read
        assert!(s.is_empty());
        assert_eq!(s.take("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let s = MemoryStore::new();
        s.set_with_expiry("short", b"v", Duration::from_secs(10)).await.unwrap();
        s.set_with_expiry("long", b"v", HOUR).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(s.purge_expired().await.unwrap(), 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.take("long").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_take_yields_value_once() {
        let s = MemoryStore::new();
        for i in 0..100 {
            let key = format!("k{i}");
            s.set_with_expiry(&key, b"v", HOUR).await.unwrap();

            let (a, b) = tokio::join!(
                tokio::spawn({
                    let (s, key) = (s.clone(), key.clone());
                    async move { s.take(&key).await.unwrap() }
                }),
                tokio::spawn({
                    let (s, key) = (s.clone(), key.clone());
                    async move { s.take(&key).await.unwrap() }
                }),
            );
            let hits = [a.unwrap(), b.unwrap()]
                .iter()
                .filter(|r| r.is_some())
                .count();
            assert_eq!(hits, 1);
        }
    }
}
