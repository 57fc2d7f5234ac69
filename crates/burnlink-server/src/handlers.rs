use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{error::SecretError, ttl::Ttl, AppState};

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Submit ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(alias = "password")]
    pub value: Option<String>,
    pub ttl: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub key: String,
    pub link: String,
    pub ttl: Ttl,
    pub expires_in_secs: u64,
}

pub async fn submit_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Response, SecretError> {
    // Keep the rejection's own status so an over-limit body stays a 413.
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection.status();
            return Ok((status, Json(json!({"error": rejection.body_text()}))).into_response());
        }
    };

    let value = body
        .value
        .ok_or_else(|| SecretError::validation("value is required"))?;
    let ttl: Ttl = body
        .ttl
        .ok_or_else(|| SecretError::validation("ttl is required"))?
        .parse()?;

    let key = state.secrets.create(value.as_bytes(), ttl).await?;
    let link = share_link(&state, &headers, &key);

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            key,
            link,
            ttl,
            expires_in_secs: ttl.as_secs(),
        }),
    )
        .into_response())
}

// ── Retrieve ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub key: String,
    pub value: String,
}

pub async fn retrieve_secret(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, SecretError> {
    let value = state.secrets.retrieve(&key).await?;
    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(RetrieveResponse { key, value }),
    )
        .into_response())
}

// ── Links ─────────────────────────────────────────────────────────────────────

/// Build the one-time URL for `key`.
///
/// Uses the configured public URL when present; otherwise the forwarded or
/// direct `Host` header, with `https` unless `no_ssl` is set.
///
/// `X-Forwarded-Host` is client-controlled unless a proxy rewrites it.
/// Deployments behind a proxy should set `public_url` so links never depend
/// on request headers.
pub fn share_link(state: &AppState, headers: &HeaderMap, key: &str) -> String {
    let base = match state.public_url.as_deref() {
        Some(url) => url.trim_end_matches('/').to_owned(),
        None => {
            let host = header_value(headers, "x-forwarded-host")
                .or_else(|| header_value(headers, header::HOST.as_str()))
                .unwrap_or("localhost");
            let scheme = if state.no_ssl { "http" } else { "https" };
            format!("{scheme}://{host}")
        }
    };
    format!("{base}/secrets/{key}")
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
