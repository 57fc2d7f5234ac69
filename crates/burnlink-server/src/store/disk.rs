use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info};

use super::model::StoredEntry;
use super::KvStore;

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Thread-safe handle to the redb store.
///
/// Every mutation runs in a redb write transaction. redb admits one writer
/// at a time, which is what makes `take` atomic.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).context("open redb database")?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(ENTRIES)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = Self::now();
        let entry = StoredEntry {
            value: value.to_vec(),
            created_at: now,
            expires_at: now.saturating_add(ttl.as_secs() as i64),
        };

        let bytes = encode(&entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(ENTRIES)?;
            let raw_bytes: Option<Vec<u8>> = table.get(key)?.map(|guard| guard.value().to_vec());
            raw_bytes.map(|bytes| decode(&bytes)).transpose()?
        };

        match entry {
            None => Ok(None),
            Some(entry) if entry.is_expired(Self::now()) => {
                if self.evict_expired(key)? {
                    debug!("lazy-evicted expired entry");
                }
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.into_value())),
        }
    }

    /// Remove `key` if it is still expired; a concurrent overwrite survives.
    fn evict_expired(&self, key: &str) -> Result<bool> {
        let now = Self::now();
        let write_txn = self.db.begin_write()?;
        let evicted = {
            let mut table = write_txn.open_table(ENTRIES)?;
            let expired = match table.get(key)? {
                Some(guard) => decode(guard.value())?.is_expired(now),
                None => false,
            };
            if expired {
                table.remove(key)?;
            }
            expired
        };
        write_txn.commit()?;
        Ok(evicted)
    }

    fn remove(&self, key: &str) -> Result<Option<StoredEntry>> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(ENTRIES)?;
            // Copy out of the guard so the borrow on `table` ends here.
            let raw_bytes: Option<Vec<u8>> =
                table.remove(key)?.map(|guard| guard.value().to_vec());
            raw_bytes.map(|bytes| decode(&bytes)).transpose()?
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn purge(&self) -> Result<usize> {
        let now = Self::now();

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(ENTRIES)?;
            let mut expired_keys = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                if decode(v.value())?.is_expired(now) {
                    expired_keys.push(k.value().to_owned());
                }
            }
            for key in &expired_keys {
                table.remove(key.as_str())?;
            }
            expired_keys.len()
        };
        write_txn.commit()?;

        if removed > 0 {
            info!(removed, "pruned expired secrets");
        }
        Ok(removed)
    }
}

#[async_trait]
impl KvStore for RedbStore {
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.put(key, value, ttl).context("store entry")?;
        debug!(ttl_secs = ttl.as_secs(), "stored entry");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read(key).context("read entry")
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.remove(key).context("delete entry")?;
        Ok(removed.is_some_and(|entry| !entry.is_expired(Self::now())))
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.remove(key).context("take entry")? {
            Some(entry) if entry.is_expired(Self::now()) => {
                debug!("lazy-evicted expired entry");
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.into_value())),
            None => Ok(None),
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.purge().context("purge expired entries")
    }
}

fn encode(entry: &StoredEntry) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(entry, bincode::config::standard()).context("bincode encode")
}

fn decode(bytes: &[u8]) -> Result<StoredEntry> {
    let (entry, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .context("bincode decode")?;
    Ok(entry)
}
