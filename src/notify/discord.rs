use super::Notifier;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord rejects `content` longer than 2000 chars; keep headroom.
pub const DISCORD_MAX_CONTENT: usize = 1900;

/// Fire-and-forget POST to a Discord incoming webhook. Non-2xx is an error.
#[derive(Clone)]
pub struct DiscordWebhook {
    client: Client,
    timeout: Duration,
}

impl DiscordWebhook {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl Default for DiscordWebhook {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload<'a> {
    content: &'a str,
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn post(&self, webhook: &str, content: &str) -> Result<()> {
        self.client
            .post(webhook)
            .timeout(self.timeout)
            .json(&DiscordWebhookPayload { content })
            .send()
            .await
            .context("Discord webhook request failed")?
            .error_for_status()
            .context("Discord webhook HTTP error")?;
        Ok(())
    }

    fn max_content_chars(&self) -> usize {
        DISCORD_MAX_CONTENT
    }
}
