// tests/common/mod.rs
#![allow(dead_code)]

use ai_updates::config::AppConfig;
use ai_updates::ingest::types::{Collector, NormalizedItem, RawRecord, Service, Source, SourceKind};
use ai_updates::notify::Notifier;
use ai_updates::summarize::{Importance, Summarizer, Summary};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn source(id: &'static str, service: Service) -> Source {
    Source {
        id,
        service,
        label: id,
        kind: SourceKind::Html,
        url: "https://changelog.test/",
    }
}

pub fn record(source: &Source, title: &str, day: u32) -> RawRecord {
    RawRecord {
        source_id: source.id.to_string(),
        service: source.service,
        title: title.to_string(),
        url: format!("{}#{}", source.url, title.to_lowercase().replace(' ', "-")),
        published_at: Utc.with_ymd_and_hms(2026, 2, day, 12, 0, 0).unwrap(),
        body: format!("{title} details"),
    }
}

pub fn config(pairs: &[(&str, &str)]) -> AppConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|k| map.get(k).cloned()).unwrap()
}

/// Returns canned records per source id; ids not listed fail.
#[derive(Default)]
pub struct MockCollector {
    pub records: HashMap<&'static str, Vec<RawRecord>>,
}

#[async_trait]
impl Collector for MockCollector {
    async fn collect(&self, source: &Source) -> Result<Vec<RawRecord>> {
        match self.records.get(source.id) {
            Some(r) => Ok(r.clone()),
            None => anyhow::bail!("connection refused: {}", source.url),
        }
    }
}

/// Importance chosen by keyword in the title.
pub struct KeywordSummarizer;

#[async_trait]
impl Summarizer for KeywordSummarizer {
    async fn summarize(&self, item: &NormalizedItem) -> Summary {
        let importance = if item.title.contains("Breaking") {
            Importance::High
        } else if item.title.contains("Model") {
            Importance::Medium
        } else {
            Importance::Low
        };
        Summary {
            headline: item.title.clone(),
            bullets: vec![format!("about {}", item.title)],
            importance,
            topic: "release-note".to_string(),
        }
    }
}

/// Records posts. Webhooks listed in `failing` return an error, as does the
/// post numbered `fail_at` (0-based) when set.
pub struct RecordingNotifier {
    pub posts: Mutex<Vec<(String, String)>>,
    pub failing: Vec<String>,
    pub fail_at: Option<usize>,
    pub max_chars: usize,
    pub attempts: Mutex<usize>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            posts: Mutex::new(vec![]),
            failing: vec![],
            fail_at: None,
            max_chars: 1900,
            attempts: Mutex::new(0),
        }
    }
}

impl RecordingNotifier {
    pub fn failing_on(webhooks: &[&str]) -> Self {
        Self {
            failing: webhooks.iter().map(|w| w.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, webhook: &str, content: &str) -> Result<()> {
        let attempt = {
            let mut n = self.attempts.lock().unwrap();
            *n += 1;
            *n - 1
        };
        if self.failing.iter().any(|w| w == webhook) || self.fail_at == Some(attempt) {
            anyhow::bail!("HTTP 429 from {webhook}");
        }
        self.posts
            .lock()
            .unwrap()
            .push((webhook.to_string(), content.to_string()));
        Ok(())
    }

    fn max_content_chars(&self) -> usize {
        self.max_chars
    }
}
