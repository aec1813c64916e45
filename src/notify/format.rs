// src/notify/format.rs
//! Message layouts. Pure functions; the transport lives in `discord`.

use chrono::{DateTime, FixedOffset, Utc};

use crate::ingest::types::{NormalizedItem, Service};
use crate::store::DigestEntry;
use crate::summarize::Summary;

/// Max bullets shown in a single-item notification.
pub const MAX_BULLETS: usize = 3;
/// Max lines per service in a digest.
pub const MAX_DIGEST_LINES_PER_SERVICE: usize = 20;

const NO_BULLETS: &str = "See the source link for details.";

/// Display timezone for notifications (JST, UTC+9).
fn display_tz() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// `2026-02-07 18:22 JST`
pub fn format_published_at(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&display_tz())
        .format("%Y-%m-%d %H:%M JST")
        .to_string()
}

/// Single-item layout: bold headline with time, up to three bullets, source link.
pub fn format_item(item: &NormalizedItem, summary: &Summary) -> String {
    let title = format!("{} ({})", summary.headline, format_published_at(item.published_at));
    let bullets = if summary.bullets.is_empty() {
        format!("• {NO_BULLETS}")
    } else {
        summary
            .bullets
            .iter()
            .take(MAX_BULLETS)
            .map(|b| format!("• {b}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("**{title}**\n{bullets}\nSource: {}", item.url)
}

/// One rendered digest line and the row it stands for. Headers carry no
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLine {
    pub text: String,
    pub fingerprint: Option<String>,
}

impl DigestLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fingerprint: None,
        }
    }

    /// `- [openai] Headline (high)` + indented link.
    pub fn entry(entry: &DigestEntry) -> Self {
        Self {
            text: format!(
                "- [{}] {} ({})\n  {}",
                entry.service, entry.summary.headline, entry.summary.importance, entry.url
            ),
            fingerprint: Some(entry.fingerprint.clone()),
        }
    }
}

/// One message of a digest and the rows fully contained in it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestChunk {
    pub content: String,
    pub fingerprints: Vec<String>,
}

/// All services in one message.
pub fn combined_digest(groups: &[(Service, Vec<&DigestEntry>)]) -> Vec<DigestLine> {
    let mut lines = vec![DigestLine::plain("**AI Updates Daily Digest**")];
    for (service, entries) in groups {
        lines.push(DigestLine::plain(format!("\n## {service}")));
        lines.extend(entries.iter().map(|e| DigestLine::entry(e)));
    }
    lines
}

/// One service's message.
pub fn service_digest(service: Service, entries: &[&DigestEntry]) -> Vec<DigestLine> {
    let mut lines = vec![DigestLine::plain(format!("**Daily Digest: {service}**"))];
    lines.extend(entries.iter().map(|e| DigestLine::entry(e)));
    lines
}

/// Pack lines (newline-joined) into messages of at most `max_chars`.
/// A single over-long line is hard-split; its row belongs to the chunk
/// holding its last piece.
pub fn chunk_digest(lines: &[DigestLine], max_chars: usize) -> Vec<DigestChunk> {
    let mut chunks = Vec::new();
    let mut current = DigestChunk::default();
    let mut current_len = 0usize;

    for line in lines {
        let pieces: Vec<String> = if line.text.chars().count() > max_chars {
            line.text
                .chars()
                .collect::<Vec<_>>()
                .chunks(max_chars)
                .map(|c| c.iter().collect())
                .collect()
        } else {
            vec![line.text.clone()]
        };

        for piece in pieces {
            let piece_len = piece.chars().count();
            let needed = if current.content.is_empty() {
                piece_len
            } else {
                current_len + 1 + piece_len
            };
            if needed > max_chars && !current.content.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.content.is_empty() {
                current.content.push('\n');
                current_len += 1;
            }
            current.content.push_str(&piece);
            current_len += piece_len;
        }
        if let Some(fp) = &line.fingerprint {
            current.fingerprints.push(fp.clone());
        }
    }
    if !current.content.is_empty() {
        chunks.push(current);
    }
    chunks
}
