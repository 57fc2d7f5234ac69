pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod ttl;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub secrets: lifecycle::SecretManager,
    /// Base URL for share links, if configured.
    pub public_url: Option<String>,
    /// Emit `http://` share links.
    pub no_ssl: bool,
}

pub use crate::config::{ServerConfig, StoreBackend, StoreConfig};
pub use error::{SecretError, SecretResult};
pub use lifecycle::{LifecycleConfig, SecretManager};
pub use server::{open_store, router, run};
pub use ttl::Ttl;
