// src/ingest/providers/github_releases.rs
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::ingest::providers::http::{parse_datetime, FETCH_TIMEOUT};
use crate::ingest::types::{RawRecord, Source};

const MAX_RELEASES: usize = 10;

#[derive(Debug, Deserialize)]
struct Release {
    name: Option<String>,
    tag_name: Option<String>,
    html_url: Option<String>,
    body: Option<String>,
    published_at: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Parse a releases listing (JSON array) into raw records.
pub fn parse_releases(json: &str, source: &Source) -> Result<Vec<RawRecord>> {
    let releases: Vec<Release> =
        serde_json::from_str(json).with_context(|| format!("parsing releases of {}", source.id))?;

    Ok(releases
        .into_iter()
        .take(MAX_RELEASES)
        .map(|rel| RawRecord {
            source_id: source.id.to_string(),
            service: source.service,
            published_at: parse_datetime(rel.published_at.as_deref()),
            title: non_empty(rel.name)
                .or_else(|| non_empty(rel.tag_name))
                .unwrap_or_else(|| "Release".to_string()),
            url: non_empty(rel.html_url).unwrap_or_else(|| source.url.to_string()),
            body: rel.body.unwrap_or_default(),
        })
        .collect())
}

pub async fn collect(client: &Client, source: &Source) -> Result<Vec<RawRecord>> {
    let json = client
        .get(source.url)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("GET {}", source.url))?
        .error_for_status()
        .with_context(|| format!("GET {} non-2xx", source.url))?
        .text()
        .await
        .context("releases body")?;
    parse_releases(&json, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Service, SourceKind};
    use chrono::{TimeZone, Utc};

    const SRC: Source = Source {
        id: "codex_releases",
        service: Service::OpenAi,
        label: "Codex Releases",
        kind: SourceKind::GithubReleases,
        url: "https://api.github.com/repos/openai/codex/releases",
    };

    #[test]
    fn maps_fields_with_fallbacks() {
        let json = r#"[
            {"name": "v1.2.0", "tag_name": "v1.2.0", "html_url": "https://github.com/x/r/v1.2.0",
             "body": "Notes", "published_at": "2026-02-07T09:22:00Z"},
            {"name": "", "tag_name": "v1.1.0", "html_url": null, "body": null, "published_at": null},
            {}
        ]"#;
        let out = parse_releases(json, &SRC).unwrap();
        assert_eq!(out.len(), 3);

        assert_eq!(out[0].title, "v1.2.0");
        assert_eq!(out[0].url, "https://github.com/x/r/v1.2.0");
        assert_eq!(
            out[0].published_at,
            Utc.with_ymd_and_hms(2026, 2, 7, 9, 22, 0).unwrap()
        );
        assert_eq!(out[0].service, Service::OpenAi);

        assert_eq!(out[1].title, "v1.1.0");
        assert_eq!(out[1].url, SRC.url);
        assert_eq!(out[1].body, "");

        assert_eq!(out[2].title, "Release");
    }

    #[test]
    fn caps_at_ten_releases() {
        let one = r#"{"name":"r","body":"b","published_at":"2026-01-01T00:00:00Z"}"#;
        let json = format!("[{}]", vec![one; 15].join(","));
        assert_eq!(parse_releases(&json, &SRC).unwrap().len(), 10);
    }

    #[test]
    fn non_array_is_an_error() {
        assert!(parse_releases(r#"{"message":"rate limited"}"#, &SRC).is_err());
    }
}
