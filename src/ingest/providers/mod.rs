// src/ingest/providers/mod.rs
pub mod github_releases;
pub mod html_page;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::ingest::types::{Collector, RawRecord, Source, SourceKind};

/// Production collector: one handler per `SourceKind`.
pub struct HttpCollector {
    client: Client,
}

impl HttpCollector {
    pub fn new(user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: http::build_client(user_agent)?,
        })
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn collect(&self, source: &Source) -> Result<Vec<RawRecord>> {
        match source.kind {
            SourceKind::Html => html_page::collect(&self.client, source).await,
            SourceKind::GithubReleases => github_releases::collect(&self.client, source).await,
        }
    }
}
