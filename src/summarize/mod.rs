//! Summarizer: remote LLM provider with a deterministic local fallback.
//!
//! The public boundary (`Summarizer::summarize`) never fails. A missing
//! credential skips the network entirely; any remote error, bad status or
//! malformed payload resolves to the same fallback summary.

pub mod gemini;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::ai::{ProviderKind, SummarizerConfig};
use crate::ingest::types::NormalizedItem;

/// Per-request bound for summarization calls.
pub const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Body chars sent to the provider.
const PROMPT_BODY_CHARS: usize = 4000;

pub const DEFAULT_TOPIC: &str = "release-note";

const HIGH_TERMS: [&str; 6] = ["breaking", "deprec", "price", "billing", "security", "removed"];
const MEDIUM_TERMS: [&str; 5] = ["new", "release", "model", "cli", "api"];

/// Ordered low < medium < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
}

impl Importance {
    /// Threshold rank: low=1, medium=2, high=3.
    pub fn rank(self) -> u8 {
        match self {
            Importance::Low => 1,
            Importance::Medium => 2,
            Importance::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Importance::Low),
            "medium" => Ok(Importance::Medium),
            "high" => Ok(Importance::High),
            other => anyhow::bail!("unknown importance: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub headline: String,
    pub bullets: Vec<String>,
    pub importance: Importance,
    pub topic: String,
}

/// Keyword heuristic over `title + " " + body`, case-insensitive substring match.
pub fn heuristic_importance(title: &str, body: &str) -> Importance {
    let t = format!("{title} {body}").to_lowercase();
    if HIGH_TERMS.iter().any(|k| t.contains(k)) {
        Importance::High
    } else if MEDIUM_TERMS.iter().any(|k| t.contains(k)) {
        Importance::Medium
    } else {
        Importance::Low
    }
}

fn fallback_bullets(item: &NormalizedItem) -> Vec<String> {
    let text: String = if item.body.is_empty() {
        item.title.clone()
    } else {
        item.body.chars().take(700).collect()
    };
    let excerpt: String = text.chars().take(120).collect();
    vec![
        format!("Source: {}", item.source_id),
        format!("Summary: {excerpt}..."),
        format!("Published: {}", item.published_at.date_naive().format("%Y-%m-%d")),
    ]
}

/// Deterministic local summary; always exactly three bullets.
pub fn fallback_summary(item: &NormalizedItem) -> Summary {
    Summary {
        headline: item.title.clone(),
        bullets: fallback_bullets(item),
        importance: heuristic_importance(&item.title, &item.body),
        topic: DEFAULT_TOPIC.to_string(),
    }
}

/// Provider payload as returned; every field is untrusted.
/// A field of the wrong JSON type reads as absent instead of failing the
/// whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSummary {
    #[serde(default, deserialize_with = "lenient_string")]
    pub headline: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub bullets: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub importance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub topic: Option<String>,
}

fn lenient_string<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Array: keep the string elements. Bare string: one bullet.
fn lenient_strings<'de, D>(de: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) => Some(vec![s]),
        _ => None,
    })
}

impl RemoteSummary {
    /// Validate against the item, filling gaps from the local fallback.
    pub fn into_summary(self, item: &NormalizedItem) -> Summary {
        let headline = self
            .headline
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| item.title.clone());

        let mut bullets: Vec<String> = self
            .bullets
            .unwrap_or_default()
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .take(3)
            .collect();
        if bullets.is_empty() {
            bullets = fallback_bullets(item);
        }

        let importance = self
            .importance
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| heuristic_importance(&item.title, &item.body));

        let topic = self
            .topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        Summary {
            headline,
            bullets,
            importance,
            topic,
        }
    }
}

/// Parse the model's text output. Tolerates a surrounding ```json fence.
pub fn parse_remote_json(text: &str) -> Result<RemoteSummary> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).context("summary payload is not the expected JSON object")
}

/// Instruction + item fields sent to every provider.
pub fn build_prompt(item: &NormalizedItem) -> String {
    let body: String = item.body.chars().take(PROMPT_BODY_CHARS).collect();
    format!(
        "Summarize the following product update. Reply with strict JSON only.\n\
         Schema: {{headline: string, bullets: [string, string, string], importance: high|medium|low, topic: string}}.\n\
         Use importance=high for breaking changes, deprecations, pricing/billing or security news.\n\
         title: {}\n\
         url: {}\n\
         published_at: {}\n\
         body: {}",
        item.title,
        item.url,
        item.published_at.to_rfc3339(),
        body
    )
}

/// Low-level remote call. Separated so the fallback wrapper stays provider-agnostic.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn fetch(&self, item: &NormalizedItem) -> Result<RemoteSummary>;
    fn name(&self) -> &'static str;
}

/// Orchestrator seam. Implementations must not fail.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, item: &NormalizedItem) -> Summary;
}

/// Remote provider when a credential is configured, fallback otherwise.
pub struct AiSummarizer {
    provider: Option<Box<dyn Provider>>,
}

impl AiSummarizer {
    /// Builds the selected provider only if its API key is present.
    pub fn from_config(cfg: &SummarizerConfig) -> Result<Self> {
        let Some(key) = cfg.api_key.clone() else {
            tracing::info!(provider = %cfg.provider, "no API key; using local fallback summaries");
            return Ok(Self::disabled());
        };
        let provider: Box<dyn Provider> = match cfg.provider {
            ProviderKind::OpenAi => Box::new(openai::OpenAiProvider::new(key, cfg.model.clone())?),
            ProviderKind::Gemini => Box::new(gemini::GeminiProvider::new(key, cfg.model.clone())?),
        };
        Ok(Self {
            provider: Some(provider),
        })
    }

    pub fn with_provider(provider: Box<dyn Provider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.as_ref().map_or("fallback", |p| p.name())
    }
}

#[async_trait]
impl Summarizer for AiSummarizer {
    async fn summarize(&self, item: &NormalizedItem) -> Summary {
        let Some(provider) = &self.provider else {
            return fallback_summary(item);
        };
        match provider.fetch(item).await {
            Ok(remote) => remote.into_summary(item),
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    provider = provider.name(),
                    fingerprint = %item.fingerprint,
                    "summarization failed; using fallback"
                );
                fallback_summary(item)
            }
        }
    }
}
