use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use burnlink_server::{handlers::SubmitResponse, ServerConfig, Ttl};
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "burnlink", about = "burnlink: share a secret through a link that works once", version)]
struct Cli {
    /// burnlink server URL (default: http://localhost:8080 or $BURNLINK_SERVER)
    #[arg(long, env = "BURNLINK_SERVER", default_value = "http://localhost:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the burnlink HTTP server
    Serve {
        /// Config file (TOML, YAML or JSON); $BURNLINK_CONFIG if unset
        #[arg(long, env = "BURNLINK_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Store a secret and print its one-time link
    Push {
        /// The secret, or `-` to read it from stdin
        value: String,
        /// How long the link stays valid: hour, day or week
        #[arg(long, default_value = "day", value_parser = parse_ttl)]
        ttl: Ttl,
    },
    /// Fetch (and burn) a secret by key or link
    Get {
        /// Secret key or the full link printed by `push`
        target: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BURNLINK_LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Serve { config } => cmd_serve(config).await,
        Commands::Push { value, ttl } => cmd_push(&cli.server, &value, ttl).await,
        Commands::Get { target } => cmd_get(&cli.server, &target).await,
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(config: Option<PathBuf>) -> Result<()> {
    let cfg = ServerConfig::load(config.as_deref()).context("load configuration")?;
    debug!(
        host = %cfg.host,
        port = cfg.port,
        backend = ?cfg.store.backend,
        "configuration loaded"
    );
    burnlink_server::run(cfg).await
}

async fn cmd_push(server: &str, value: &str, ttl: Ttl) -> Result<()> {
    let value = if value == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read secret from stdin")?;
        buf.trim_end_matches(['\n', '\r']).to_owned()
    } else {
        value.to_owned()
    };

    let created = submit(&Client::new(), server, &value, ttl).await?;
    println!("{}", created.link);
    eprintln!("link is valid for one {ttl} unless opened first");
    Ok(())
}

async fn cmd_get(server: &str, target: &str) -> Result<()> {
    let key = key_from_target(target);
    match retrieve(&Client::new(), server, key).await? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => anyhow::bail!("not found or expired"),
    }
}

// ── HTTP client ───────────────────────────────────────────────────────────────

async fn submit(client: &Client, server: &str, value: &str, ttl: Ttl) -> Result<SubmitResponse> {
    let body = serde_json::json!({
        "value": value,
        "ttl": ttl.label(),
    });

    debug!(server, ttl = %ttl, bytes = value.len(), "submitting secret");
    let resp = client
        .post(format!("{}/secrets", server.trim_end_matches('/')))
        .json(&body)
        .send()
        .await
        .context("HTTP request failed")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let json: Value = resp.json().await.unwrap_or_default();
        anyhow::bail!(
            "server returned {status}: {}",
            json["error"].as_str().unwrap_or("")
        );
    }
    resp.json().await.context("parse response")
}

/// `Ok(None)` when the secret is gone; that is an answer, not a failure.
async fn retrieve(client: &Client, server: &str, key: &str) -> Result<Option<String>> {
    let resp = client
        .get(format!("{}/secrets/{}", server.trim_end_matches('/'), key))
        .send()
        .await
        .context("HTTP request failed")?;

    let status = resp.status();
    debug!(server, %status, "retrieve response");
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let json: Value = resp.json().await.context("parse response")?;
    if !status.is_success() {
        let error = json["error"].as_str().unwrap_or("unknown error");
        anyhow::bail!("server returned {status}: {error}");
    }
    let value = json["value"]
        .as_str()
        .context("response has no value")?
        .to_owned();
    Ok(Some(value))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_ttl(s: &str) -> Result<Ttl, String> {
    s.parse().map_err(|e: burnlink_server::SecretError| e.to_string())
}

/// Accept either a bare key or a link ending in `/secrets/<key>`.
fn key_from_target(target: &str) -> &str {
    let target = target.trim().trim_end_matches('/');
    target.rsplit('/').next().unwrap_or(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn key_from_bare_key_or_link() {
        assert_eq!(key_from_target("abc123"), "abc123");
        assert_eq!(
            key_from_target("https://share.example.com/secrets/abc123"),
            "abc123"
        );
        assert_eq!(key_from_target(" http://localhost:8080/secrets/abc123/ "), "abc123");
    }

    #[test]
    fn ttl_flag_uses_fixed_labels() {
        assert_eq!(parse_ttl("week").unwrap(), Ttl::Week);
        assert!(parse_ttl("10m").is_err());
    }

    #[tokio::test]
    async fn submit_posts_value_and_label() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/secrets"))
            .and(body_json(json!({"value": "hunter2", "ttl": "hour"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "key": "k1",
                "link": "https://x/secrets/k1",
                "ttl": "hour",
                "expires_in_secs": 3600
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let created = submit(&Client::new(), &mock.uri(), "hunter2", Ttl::Hour)
            .await
            .unwrap();
        assert_eq!(created.key, "k1");
        assert_eq!(created.link, "https://x/secrets/k1");
        assert_eq!(created.ttl, Ttl::Hour);
    }

    #[tokio::test]
    async fn submit_surfaces_server_errors() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/secrets"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "value must not be empty"})),
            )
            .mount(&mock)
            .await;

        let err = submit(&Client::new(), &mock.uri(), "", Ttl::Day)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("value must not be empty"));
    }

    #[tokio::test]
    async fn retrieve_returns_value_then_none() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/k1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key": "k1", "value": "hunter2"})),
            )
            .up_to_n_times(1)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/secrets/k1"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "not found or expired"})),
            )
            .mount(&mock)
            .await;

        let client = Client::new();
        assert_eq!(
            retrieve(&client, &mock.uri(), "k1").await.unwrap().as_deref(),
            Some("hunter2")
        );
        assert_eq!(retrieve(&client, &mock.uri(), "k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn retrieve_fails_on_store_outage() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/k1"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"error": "store unavailable"})),
            )
            .mount(&mock)
            .await;

        let err = retrieve(&Client::new(), &mock.uri(), "k1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("store unavailable"));
    }
}
