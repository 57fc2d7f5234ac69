use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info};

use crate::error::{SecretError, SecretResult};
use crate::store::KvStore;
use crate::ttl::Ttl;

/// Bytes of OS randomness behind each key (hex-encoded to 32 chars).
pub const KEY_BYTES: usize = 16;

/// Default cap on a single secret payload.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 1_048_576;

/// Limits applied by [`SecretManager`].
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub max_value_bytes: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

/// Generate an unguessable key from the OS CSPRNG.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Creates secrets and hands each one out at most once.
#[derive(Clone)]
pub struct SecretManager {
    store: Arc<dyn KvStore>,
    config: LifecycleConfig,
}

impl SecretManager {
    pub fn new(store: Arc<dyn KvStore>, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    pub fn max_value_bytes(&self) -> usize {
        self.config.max_value_bytes
    }

    /// Store `value` under a fresh key that expires after `ttl`.
    pub async fn create(&self, value: &[u8], ttl: Ttl) -> SecretResult<String> {
        if value.is_empty() {
            return Err(SecretError::validation("value must not be empty"));
        }
        if value.len() > self.config.max_value_bytes {
            return Err(SecretError::validation(format!(
                "value exceeds {} byte limit",
                self.config.max_value_bytes
            )));
        }

        let key = generate_key();
        self.store
            .set_with_expiry(&key, value, ttl.as_duration())
            .await?;

        info!(ttl = %ttl, bytes = value.len(), "secret created");
        Ok(key)
    }

    /// Destructive read: return the value and remove it in one store call.
    pub async fn consume(&self, key: &str) -> SecretResult<Vec<u8>> {
        if key.is_empty() {
            return Err(SecretError::validation("key must not be empty"));
        }

        match self.store.take(key).await? {
            Some(value) => {
                info!("secret consumed");
                Ok(value)
            }
            None => {
                debug!("secret not found or expired");
                Err(SecretError::NotFound)
            }
        }
    }

    /// Request-surface form of [`create`](Self::create): the ttl arrives as a label.
    pub async fn submit(&self, value: &str, ttl_label: &str) -> SecretResult<String> {
        let ttl: Ttl = ttl_label.parse()?;
        self.create(value.as_bytes(), ttl).await
    }

    /// Request-surface form of [`consume`](Self::consume) for text secrets.
    pub async fn retrieve(&self, key: &str) -> SecretResult<String> {
        let bytes = self.consume(key).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
