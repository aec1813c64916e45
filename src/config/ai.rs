// src/config/ai.rs
use anyhow::Result;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        })
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    /// Case-insensitive; anything but "openai" / "gemini" is a config error.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            other => anyhow::bail!("Unsupported summarizer provider: {other}"),
        }
    }
}

/// Selected provider with its credential and model resolved.
/// `api_key == None` means summaries come from the local fallback.
#[derive(Clone, PartialEq, Eq)]
pub struct SummarizerConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
}

// Hand-written so the key never ends up in logs.
impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("provider", &self.provider)
            .field("api_key_len", &self.api_key.as_ref().map(String::len))
            .field("model", &self.model)
            .finish()
    }
}

impl SummarizerConfig {
    /// Resolve key + model for the provider named by `SUMMARIZER_PROVIDER`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider: ProviderKind = lookup("SUMMARIZER_PROVIDER")
            .as_deref()
            .unwrap_or("openai")
            .parse()?;

        let (key_var, model_var, default_model) = match provider {
            ProviderKind::OpenAi => ("OPENAI_API_KEY", "OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            ProviderKind::Gemini => ("GEMINI_API_KEY", "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        };

        Ok(Self {
            provider,
            api_key: lookup(key_var),
            model: lookup(model_var).unwrap_or_else(|| default_model.to_string()),
        })
    }
}
