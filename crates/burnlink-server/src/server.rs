use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use directories::ProjectDirs;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    config::{ServerConfig, StoreBackend, StoreConfig},
    handlers::{health, retrieve_secret, submit_secret},
    lifecycle::SecretManager,
    store::{self, KvStore, MemoryStore, RedbStore},
    AppState,
};

/// Slack for the JSON envelope around the value (field names, ttl label).
const BODY_ENVELOPE_BYTES: usize = 4096;

/// Worst-case JSON growth of one payload byte (`\u00XX`).
const JSON_ESCAPE_FACTOR: usize = 6;

/// Platform-specific app data dir (`~/.local/share/burnlink/`, etc.).
fn platform_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "burnlink")
        .map(|dirs| dirs.data_dir().to_owned())
        .context("could not determine platform data directory")
}

/// Resolve the data directory (configured, else platform default), creating it.
pub fn resolve_data_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(d) => d.clone(),
        None => platform_data_dir()?,
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create data dir: {}", dir.display()))?;
    Ok(dir)
}

/// Open the store backend named by `cfg`.
pub fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn KvStore>> {
    match cfg.backend {
        StoreBackend::Memory => {
            info!("using in-memory store; secrets will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redb => {
            let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
            let db_path = data_dir.join("burnlink.db");
            info!(path = %db_path.display(), "using redb store");
            let store = RedbStore::open(&db_path).context("open store")?;
            Ok(Arc::new(store))
        }
    }
}

/// Largest request body accepted for a secret of `max_value_bytes`.
pub fn body_limit(max_value_bytes: usize) -> usize {
    max_value_bytes
        .saturating_mul(JSON_ESCAPE_FACTOR)
        .saturating_add(BODY_ENVELOPE_BYTES)
}

/// Routes without the outer CORS/trace layers.
pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.secrets.max_value_bytes());
    Router::new()
        .route("/health", get(health))
        .route("/secrets", post(submit_secret))
        .route("/secrets/{key}", get(retrieve_secret))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let store = open_store(&cfg.store)?;
    store::spawn_sweep(store.clone(), cfg.sweep_interval());

    let state = AppState {
        secrets: SecretManager::new(store, cfg.lifecycle()),
        public_url: cfg.public_url.clone(),
        no_ssl: cfg.no_ssl,
    };

    let app = router(state)
        .layer(build_cors(cfg.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "burnlink server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

/// Split a comma-separated origin list, skipping (and reporting) bad entries.
fn parse_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %s.escape_debug(), error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(Any);

    match origins {
        Some(o) => cors.allow_origin(parse_origins(o)),
        None => cors.allow_origin(Any),
    }
}
