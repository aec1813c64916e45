// src/ingest/mod.rs
pub mod providers;
pub mod sources;
pub mod types;

use crate::ingest::types::{Collector, NormalizedItem, RawRecord, Source};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

/// Upper bound on records taken from a single source per run.
pub const MAX_RECORDS_PER_SOURCE: usize = 20;

/// Number of (lower-cased) body chars that participate in the fingerprint.
const FINGERPRINT_BODY_CHARS: usize = 500;

/// Normalize text: collapse whitespace runs (newlines included) to one space, trim.
pub fn normalize_text(s: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(s, " ").trim().to_string()
}

/// SHA-256 over `source_id|title|url|body[..500]`, lower-case hex.
///
/// Title and body are expected already normalized; both are lower-cased here.
/// The URL is used exactly as given: changing that would shift the identity of
/// every row already stored.
pub fn fingerprint(source_id: &str, title: &str, url: &str, body: &str) -> String {
    let body_head: String = body.chars().take(FINGERPRINT_BODY_CHARS).collect();
    let base = format!(
        "{}|{}|{}|{}",
        source_id,
        title.to_lowercase(),
        url,
        body_head.to_lowercase()
    );
    let digest = Sha256::digest(base.as_bytes());
    format!("{digest:x}")
}

/// Pure: raw record -> normalized item with fingerprint.
pub fn normalize(raw: &RawRecord) -> NormalizedItem {
    let title = normalize_text(&raw.title);
    let body = normalize_text(&raw.body);
    let fingerprint = fingerprint(&raw.source_id, &title, &raw.url, &body);
    NormalizedItem {
        source_id: raw.source_id.clone(),
        service: raw.service,
        title,
        url: raw.url.clone(),
        published_at: raw.published_at,
        body,
        fingerprint,
    }
}

/// Records gathered from every source plus the ids of sources that failed.
#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<RawRecord>,
    pub failed_sources: Vec<&'static str>,
}

/// Collect from each source in order. A failing source is logged and skipped;
/// it never stops the remaining sources.
pub async fn collect_all(collector: &dyn Collector, sources: &[Source]) -> Collected {
    let mut out = Collected::default();
    for source in sources {
        match collector.collect(source).await {
            Ok(mut v) => {
                v.truncate(MAX_RECORDS_PER_SOURCE);
                tracing::debug!(source = source.id, records = v.len(), "source collected");
                out.records.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = ?e, source = source.id, "source collection failed");
                out.failed_sources.push(source.id);
            }
        }
    }
    out
}
