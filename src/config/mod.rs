// src/config/mod.rs
//! Process configuration, read once from the environment in `main` and then
//! passed by reference to every component.

pub mod ai;

use anyhow::Result;
use std::path::PathBuf;

use crate::ingest::types::Service;
use crate::summarize::Importance;
use ai::SummarizerConfig;

pub const DEFAULT_DB_PATH: &str = "data/updates.db";
pub const DEFAULT_USER_AGENT: &str = "ai-updates/0.1 (+local)";

/// Discord webhook destinations. All optional.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Webhooks {
    pub openai: Option<String>,
    pub gemini: Option<String>,
    pub claude: Option<String>,
    /// Combined digest destination; when set, digests go here only.
    pub digest: Option<String>,
}

impl Webhooks {
    pub fn for_service(&self, service: Service) -> Option<&str> {
        match service {
            Service::OpenAi => self.openai.as_deref(),
            Service::Gemini => self.gemini.as_deref(),
            Service::Claude => self.claude.as_deref(),
        }
    }
}

// Webhook URLs embed their token; only report which ones are set.
impl std::fmt::Debug for Webhooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webhooks")
            .field("openai", &self.openai.is_some())
            .field("gemini", &self.gemini.is_some())
            .field("claude", &self.claude.is_some())
            .field("digest", &self.digest.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub user_agent: String,
    pub summarizer: SummarizerConfig,
    pub webhooks: Webhooks,
    /// Items ranked below this go to the digest only.
    pub immediate_min_importance: Importance,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let immediate_min_importance = match get("IMMEDIATE_MIN_IMPORTANCE") {
            None => Importance::High,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unrecognized IMMEDIATE_MIN_IMPORTANCE; using high");
                Importance::High
            }),
        };

        Ok(Self {
            db_path: PathBuf::from(get("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string())),
            user_agent: get("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            summarizer: SummarizerConfig::from_lookup(&get)?,
            webhooks: Webhooks {
                openai: get("DISCORD_WEBHOOK_OPENAI"),
                gemini: get("DISCORD_WEBHOOK_GEMINI"),
                claude: get("DISCORD_WEBHOOK_CLAUDE"),
                digest: get("DISCORD_WEBHOOK_DIGEST"),
            },
            immediate_min_importance,
        })
    }
}
