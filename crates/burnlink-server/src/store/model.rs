use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// Stored in redb as bincode-encoded bytes.
/// Expiry metadata sits next to the value so the sweep can evict without
/// touching anything else.
#[derive(Debug, Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct StoredEntry {
    /// The raw secret payload.
    pub value: Vec<u8>,
    /// Unix timestamp (seconds) when the entry was written.
    pub created_at: i64,
    /// Unix timestamp (seconds) at or after which the entry is dead.
    pub expires_at: i64,
}

impl StoredEntry {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Move the payload out, leaving an empty buffer to be zeroized on drop.
    pub fn into_value(mut self) -> Vec<u8> {
        std::mem::take(&mut self.value)
    }
}
