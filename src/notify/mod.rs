// src/notify/mod.rs
pub mod discord;
pub mod format;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::types::NormalizedItem;
use crate::summarize::Summary;

/// Webhook transport: POST `content` to `webhook`. No retries; the caller
/// decides what a failure means.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, webhook: &str, content: &str) -> Result<()>;

    /// Largest message the destination accepts.
    fn max_content_chars(&self) -> usize {
        discord::DISCORD_MAX_CONTENT
    }
}

/// Single-item notification.
pub async fn send_immediate(
    notifier: &dyn Notifier,
    webhook: &str,
    item: &NormalizedItem,
    summary: &Summary,
) -> Result<()> {
    notifier
        .post(webhook, &format::format_item(item, summary))
        .await
        .with_context(|| format!("immediate notification for {}", item.fingerprint))
}

/// Outcome of a chunked digest post. Chunks go out in order and sending
/// stops at the first failure, so `delivered` holds exactly the rows of the
/// chunks that reached the destination.
#[derive(Debug, Default)]
pub struct DigestDelivery {
    pub chunks_total: usize,
    pub chunks_sent: usize,
    pub delivered: Vec<String>,
    pub error: Option<anyhow::Error>,
}

impl DigestDelivery {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Multi-line digest, split into as many messages as the destination needs.
pub async fn send_digest(
    notifier: &dyn Notifier,
    webhook: &str,
    lines: &[format::DigestLine],
) -> DigestDelivery {
    let chunks = format::chunk_digest(lines, notifier.max_content_chars());
    let mut out = DigestDelivery {
        chunks_total: chunks.len(),
        ..Default::default()
    };
    for (i, chunk) in chunks.into_iter().enumerate() {
        if let Err(e) = notifier.post(webhook, &chunk.content).await {
            out.error = Some(e.context(format!("digest chunk {}/{}", i + 1, out.chunks_total)));
            break;
        }
        out.chunks_sent += 1;
        out.delivered.extend(chunk.fingerprints);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        posts: Mutex<Vec<String>>,
        max: usize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn post(&self, _webhook: &str, content: &str) -> Result<()> {
            let mut posts = self.posts.lock().unwrap();
            if Some(posts.len()) == self.fail_on {
                anyhow::bail!("HTTP 429");
            }
            posts.push(content.to_string());
            Ok(())
        }
        fn max_content_chars(&self) -> usize {
            self.max
        }
    }

    fn entry_line(fp: &str, text: &str) -> format::DigestLine {
        format::DigestLine {
            text: text.to_string(),
            fingerprint: Some(fp.to_string()),
        }
    }

    #[tokio::test]
    async fn digest_is_chunked_per_destination_limit() {
        let rec = Recorder {
            posts: Mutex::new(vec![]),
            max: 12,
            fail_on: None,
        };
        let lines = vec![
            format::DigestLine::plain("aaaaa"),
            entry_line("b", "bbbbb"),
            entry_line("c", "ccccc"),
        ];
        let out = send_digest(&rec, "https://discord.test/x", &lines).await;
        assert!(out.is_complete());
        assert_eq!(out.chunks_sent, 2);
        assert_eq!(out.delivered, vec!["b", "c"]);
        let posts = rec.posts.lock().unwrap();
        assert_eq!(*posts, vec!["aaaaa\nbbbbb".to_string(), "ccccc".to_string()]);
    }

    #[tokio::test]
    async fn digest_stops_at_first_failed_chunk() {
        let rec = Recorder {
            posts: Mutex::new(vec![]),
            max: 5,
            fail_on: Some(1),
        };
        let lines = vec![
            entry_line("a", "aaaaa"),
            entry_line("b", "bbbbb"),
            entry_line("c", "ccccc"),
        ];
        let out = send_digest(&rec, "https://discord.test/x", &lines).await;
        assert!(!out.is_complete());
        assert_eq!(out.chunks_total, 3);
        assert_eq!(out.chunks_sent, 1);
        assert_eq!(out.delivered, vec!["a"]);
        assert_eq!(rec.posts.lock().unwrap().len(), 1);
    }
}
