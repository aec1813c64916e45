// src/ingest/providers/http.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

/// Per-request bound for upstream fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .connect_timeout(Duration::from_secs(10))
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("building collector http client")
}

/// GET `url` and return the body text; non-2xx is an error.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let rsp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} non-2xx"))?;
    rsp.text().await.with_context(|| format!("reading body of {url}"))
}

/// RFC 3339 (`Z` or offset) -> UTC. Missing or unparseable values map to now.
pub fn parse_datetime(value: Option<&str>) -> DateTime<Utc> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
