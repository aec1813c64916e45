// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream product a source (and every item it yields) belongs to.
/// Used for webhook routing and digest grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    OpenAi,
    Gemini,
    Claude,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::OpenAi, Service::Gemini, Service::Claude];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::OpenAi => "openai",
            Service::Gemini => "gemini",
            Service::Claude => "claude",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Service::OpenAi),
            "gemini" => Ok(Service::Gemini),
            "claude" => Ok(Service::Claude),
            other => anyhow::bail!("unknown service: {other}"),
        }
    }
}

/// Collection strategy tag. Closed set: a new strategy means a new variant
/// plus its handler in `providers::HttpCollector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Heading-delimited HTML page (release notes, changelogs).
    Html,
    /// GitHub-style releases listing (JSON array).
    GithubReleases,
}

/// A monitored endpoint. Defined statically, see `ingest::sources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: &'static str,
    pub service: Service,
    pub label: &'static str,
    pub kind: SourceKind,
    pub url: &'static str,
}

/// Record as produced by a collector, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub source_id: String,
    pub service: Service,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub body: String,
}

/// Normalized record; `fingerprint` is the sole dedup identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub source_id: String,
    pub service: Service,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub body: String,
    pub fingerprint: String,
}

/// Produces raw records for one source. Errors are source-local; the
/// orchestrator logs them and moves on to the next source.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, source: &Source) -> Result<Vec<RawRecord>>;
}
