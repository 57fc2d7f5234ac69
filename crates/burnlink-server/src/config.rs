use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::lifecycle::{LifecycleConfig, DEFAULT_MAX_VALUE_BYTES};

/// Environment variable naming an optional config file.
pub const CONFIG_FILE_ENV: &str = "BURNLINK_CONFIG";

/// Which [`KvStore`](crate::store::KvStore) implementation backs the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Persistent redb file under the data directory.
    #[default]
    Redb,
    /// Process memory; everything is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Where `burnlink.db` lives. Falls back to the platform data directory.
    pub data_dir: Option<PathBuf>,
    /// How often expired entries are swept out of the store.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: None,
            sweep_interval_secs: 300,
        }
    }
}

/// Everything the server needs, assembled once at startup and passed down.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Emit `http://` share links instead of `https://`.
    pub no_ssl: bool,
    /// Base URL for share links. Derived from the request `Host` (or
    /// `X-Forwarded-Host`) when unset; set it when running behind a proxy.
    pub public_url: Option<String>,
    /// Comma-separated list of allowed CORS origins. Any origin when unset.
    pub cors_origins: Option<String>,
    pub max_value_bytes: usize,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            no_ssl: false,
            public_url: None,
            cors_origins: None,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from an optional file, then overlay `BURNLINK_*` environment
    /// variables (`__` separates nested keys, e.g. `BURNLINK_STORE__BACKEND`).
    ///
    /// With no explicit `path`, the file named by `BURNLINK_CONFIG` is used
    /// if set.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));
        Self::load_from(file.as_deref(), env_source())
    }

    fn load_from(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder.add_source(env).build()?.try_deserialize()
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            max_value_bytes: self.max_value_bytes,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval_secs.max(1))
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("BURNLINK")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();
        env_source().source(Some(map))
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = ServerConfig::load_from(None, env(&[])).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.no_ssl);
        assert_eq!(cfg.max_value_bytes, DEFAULT_MAX_VALUE_BYTES);
        assert_eq!(cfg.store.backend, StoreBackend::Redb);
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn env_vars_are_typed_and_nested() {
        let cfg = ServerConfig::load_from(
            None,
            env(&[
                ("BURNLINK_PORT", "9000"),
                ("BURNLINK_NO_SSL", "true"),
                ("BURNLINK_STORE__BACKEND", "memory"),
                ("BURNLINK_STORE__SWEEP_INTERVAL_SECS", "30"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert!(cfg.no_ssl);
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burnlink.toml");
        std::fs::write(
            &path,
            "port = 7000\npublic_url = \"https://share.example.com\"\n\n[store]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let cfg = ServerConfig::load_from(Some(&path), env(&[("BURNLINK_PORT", "7100")])).unwrap();
        assert_eq!(cfg.port, 7100);
        assert_eq!(
            cfg.public_url.as_deref(),
            Some("https://share.example.com")
        );
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(ServerConfig::load_from(Some(&path), env(&[])).is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(ServerConfig::load_from(None, env(&[("BURNLINK_STORE__BACKEND", "redis")])).is_err());
    }
}
