//! Orchestrator: ingest run, digest run, maintenance and preview.
//!
//! Per item: collected -> normalized -> seen? skip -> stored -> summarized ->
//! (gated) notified. Each arrow after `normalized` is its own commit. Any
//! failure is logged and confined to its source or item.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::ingest::types::{Collector, NormalizedItem, RawRecord, Service, Source};
use crate::ingest::{collect_all, normalize};
use crate::notify::{self, format, Notifier};
use crate::store::{DigestEntry, Store};
use crate::summarize::{Importance, Summarizer, Summary};

/// Rows read per digest run.
pub const DIGEST_FETCH_LIMIT: u32 = 150;

/// Where one item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Fingerprint already stored; nothing done.
    Duplicate,
    /// Stored and summarized; left for the digest.
    Stored,
    /// Stored, summarized and sent immediately.
    SentImmediate,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub collected: usize,
    pub duplicates: usize,
    pub stored: usize,
    pub sent_immediate: usize,
    pub failed_items: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub rows: usize,
    pub groups_sent: usize,
    pub groups_failed: usize,
    /// Per-service groups with no destination configured.
    pub groups_skipped: usize,
    pub chunks_sent: usize,
    pub stamped: usize,
}

/// Collaborators for an ingest run. All borrowed; nothing here owns state.
pub struct Pipeline<'a> {
    pub cfg: &'a AppConfig,
    pub store: &'a Store,
    pub collector: &'a dyn Collector,
    pub summarizer: &'a dyn Summarizer,
    pub notifier: &'a dyn Notifier,
}

impl<'a> Pipeline<'a> {
    /// Immediate send requires rank >= threshold and a destination for the service.
    pub fn immediate_webhook(&self, service: Service, importance: Importance) -> Option<&'a str> {
        if importance.rank() < self.cfg.immediate_min_importance.rank() {
            return None;
        }
        self.cfg.webhooks.for_service(service)
    }

    /// Ingest every source once.
    pub async fn run_once(&self, sources: &[Source]) -> RunReport {
        let collected = collect_all(self.collector, sources).await;
        let mut report = RunReport {
            sources_failed: collected.failed_sources.len(),
            sources_ok: sources.len() - collected.failed_sources.len(),
            collected: collected.records.len(),
            ..Default::default()
        };

        for raw in &collected.records {
            match self.process_item(raw).await {
                Ok(ItemOutcome::Duplicate) => report.duplicates += 1,
                Ok(ItemOutcome::Stored) => report.stored += 1,
                Ok(ItemOutcome::SentImmediate) => {
                    report.stored += 1;
                    report.sent_immediate += 1;
                }
                Err(e) => {
                    warn!(
                        error = ?e,
                        source = %raw.source_id,
                        fingerprint = %normalize(raw).fingerprint,
                        url = %raw.url,
                        "item abandoned"
                    );
                    report.failed_items += 1;
                }
            }
        }

        info!(
            sources_ok = report.sources_ok,
            sources_failed = report.sources_failed,
            collected = report.collected,
            duplicates = report.duplicates,
            stored = report.stored,
            sent_immediate = report.sent_immediate,
            failed_items = report.failed_items,
            "run finished"
        );
        report
    }

    /// One record through the pipeline. Stops at the first failing step;
    /// earlier steps stay committed.
    pub async fn process_item(&self, raw: &RawRecord) -> Result<ItemOutcome> {
        let item = normalize(raw);
        let fp = item.fingerprint.as_str();

        if self.store.is_seen(fp).await.context("dedup check")? {
            return Ok(ItemOutcome::Duplicate);
        }
        self.store.add_update(&item).await.context("store update")?;

        let summary = self.summarizer.summarize(&item).await;
        self.store
            .add_summary(fp, &summary)
            .await
            .context("store summary")?;

        let Some(webhook) = self.immediate_webhook(item.service, summary.importance) else {
            return Ok(ItemOutcome::Stored);
        };
        notify::send_immediate(self.notifier, webhook, &item, &summary).await?;
        self.store
            .mark_immediate_sent(fp)
            .await
            .context("stamp immediate")?;
        info!(fingerprint = %fp, service = %item.service, importance = %summary.importance, "sent immediately");
        Ok(ItemOutcome::SentImmediate)
    }
}

/// Group by service (stable service order), newest first within a group,
/// at most `MAX_DIGEST_LINES_PER_SERVICE` entries each.
pub fn group_for_digest(rows: &[DigestEntry]) -> Vec<(Service, Vec<&DigestEntry>)> {
    let mut grouped: BTreeMap<Service, Vec<&DigestEntry>> = BTreeMap::new();
    for row in rows {
        let entries = grouped.entry(row.service).or_default();
        if entries.len() < format::MAX_DIGEST_LINES_PER_SERVICE {
            entries.push(row);
        }
    }
    grouped.into_iter().collect()
}

async fn stamp_digest(store: &Store, fingerprints: &[String]) -> usize {
    let mut stamped = 0;
    for fp in fingerprints {
        match store.mark_digest_sent(fp).await {
            Ok(()) => stamped += 1,
            Err(err) => warn!(error = ?err, fingerprint = %fp, "digest stamp failed"),
        }
    }
    stamped
}

/// Post one digest and stamp the rows whose chunk went through. Returns the
/// delivery when some chunk failed.
async fn deliver_digest(
    store: &Store,
    notifier: &dyn Notifier,
    webhook: &str,
    lines: &[format::DigestLine],
    report: &mut DigestReport,
) -> Option<notify::DigestDelivery> {
    let delivery = notify::send_digest(notifier, webhook, lines).await;
    report.chunks_sent += delivery.chunks_sent;
    report.stamped += stamp_digest(store, &delivery.delivered).await;
    if delivery.is_complete() {
        None
    } else {
        Some(delivery)
    }
}

/// Send everything not yet digested, either as one combined message or one
/// message per service. A row is stamped once the chunk carrying it has
/// posted; rows in unsent chunks stay eligible for the next digest.
pub async fn run_digest(
    cfg: &AppConfig,
    store: &Store,
    notifier: &dyn Notifier,
) -> Result<DigestReport> {
    let rows = store
        .unsent_digest_items(DIGEST_FETCH_LIMIT)
        .await
        .context("reading unsent digest items")?;
    let mut report = DigestReport {
        rows: rows.len(),
        ..Default::default()
    };
    if rows.is_empty() {
        info!("digest: nothing to send");
        return Ok(report);
    }

    let groups = group_for_digest(&rows);

    if let Some(webhook) = cfg.webhooks.digest.as_deref() {
        let lines = format::combined_digest(&groups);
        match deliver_digest(store, notifier, webhook, &lines, &mut report).await {
            None => report.groups_sent = groups.len(),
            Some(failed) => {
                warn!(
                    error = ?failed.error,
                    chunks_sent = failed.chunks_sent,
                    chunks_total = failed.chunks_total,
                    "combined digest failed"
                );
                report.groups_failed = groups.len();
            }
        }
    } else {
        for (service, entries) in &groups {
            let Some(webhook) = cfg.webhooks.for_service(*service) else {
                warn!(service = %service, "no webhook for service; digest group left unsent");
                report.groups_skipped += 1;
                continue;
            };
            let lines = format::service_digest(*service, entries);
            match deliver_digest(store, notifier, webhook, &lines, &mut report).await {
                None => report.groups_sent += 1,
                Some(failed) => {
                    warn!(
                        error = ?failed.error,
                        service = %service,
                        chunks_sent = failed.chunks_sent,
                        chunks_total = failed.chunks_total,
                        "digest group failed"
                    );
                    report.groups_failed += 1;
                }
            }
        }
    }

    info!(
        rows = report.rows,
        groups_sent = report.groups_sent,
        groups_failed = report.groups_failed,
        groups_skipped = report.groups_skipped,
        chunks_sent = report.chunks_sent,
        stamped = report.stamped,
        "digest finished"
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Clear all state.
    Reset,
    /// Drop records never included in a digest.
    PruneUnsent,
}

impl FromStr for MaintenanceAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(MaintenanceAction::Reset),
            "prune-unsent" => Ok(MaintenanceAction::PruneUnsent),
            other => anyhow::bail!(
                "unknown maintenance action '{other}' (expected: reset, prune-unsent)"
            ),
        }
    }
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MaintenanceAction::Reset => "reset",
            MaintenanceAction::PruneUnsent => "prune-unsent",
        })
    }
}

/// Returns the number of update records removed.
pub async fn run_maintenance(store: &Store, action: MaintenanceAction) -> Result<u64> {
    let removed = match action {
        MaintenanceAction::Reset => {
            let before = store.count_updates().await?;
            store.reset_all().await?;
            u64::try_from(before).unwrap_or_default()
        }
        MaintenanceAction::PruneUnsent => store.delete_unsent_digest_items().await?,
    };
    info!(action = %action, removed, "maintenance finished");
    Ok(removed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewTarget {
    All,
    Service(Service),
    Digest,
}

impl FromStr for PreviewTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(PreviewTarget::All),
            "digest" => Ok(PreviewTarget::Digest),
            other => other.parse().map(PreviewTarget::Service),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn preview_link(service: Service) -> &'static str {
    match service {
        Service::OpenAi => "https://platform.openai.com/docs/overview",
        Service::Gemini => "https://ai.google.dev/gemini-api/docs",
        Service::Claude => "https://docs.anthropic.com/",
    }
}

/// Sample item + summary used to eyeball the single-item layout.
pub fn preview_item(service: Service) -> (NormalizedItem, Summary) {
    let now = Utc::now();
    let item = NormalizedItem {
        source_id: format!("preview_{service}"),
        service,
        title: format!("[Preview] {service} notification layout test"),
        url: preview_link(service).to_string(),
        published_at: now,
        body: "Sample used to check how notifications render.".to_string(),
        fingerprint: format!("preview-{service}-{}", now.to_rfc3339()),
    };
    let summary = Summary {
        headline: format!("[Layout check] {service} sample headline"),
        bullets: vec![
            "Point 1: the gist fits on one line".to_string(),
            "Point 2: three bullets stay readable".to_string(),
            "Point 3: the source link comes last".to_string(),
        ],
        importance: Importance::Medium,
        topic: "preview".to_string(),
    };
    (item, summary)
}

fn preview_digest_lines() -> Vec<format::DigestLine> {
    [
        "**AI Updates Daily Digest (preview)**",
        "",
        "## preview",
        "- [openai] Layout sample (link check)",
        "- [gemini] Layout sample (readability check)",
        "- [claude] Layout sample (wording check)",
    ]
    .into_iter()
    .map(format::DigestLine::plain)
    .collect()
}

/// Post sample notifications without touching the store. An unknown target
/// is reported and ignored.
pub async fn run_preview(cfg: &AppConfig, notifier: &dyn Notifier, target: &str) -> PreviewReport {
    let mut report = PreviewReport::default();
    let target: PreviewTarget = match target.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!(preview_target = %target, "invalid preview target");
            return report;
        }
    };

    let services: Vec<Service> = match target {
        PreviewTarget::All => Service::ALL.to_vec(),
        PreviewTarget::Service(s) => vec![s],
        PreviewTarget::Digest => vec![],
    };

    for service in services {
        let Some(webhook) = cfg.webhooks.for_service(service) else {
            warn!(service = %service, "webhook not set for service");
            report.skipped += 1;
            continue;
        };
        let (item, summary) = preview_item(service);
        match notify::send_immediate(notifier, webhook, &item, &summary).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!(error = ?e, service = %service, "preview send failed");
                report.failed += 1;
            }
        }
    }

    if matches!(target, PreviewTarget::All | PreviewTarget::Digest) {
        match cfg.webhooks.digest.as_deref() {
            None => {
                warn!("webhook not set for digest");
                report.skipped += 1;
            }
            Some(webhook) => {
                let delivery = notify::send_digest(notifier, webhook, &preview_digest_lines()).await;
                match delivery.error {
                    None => report.sent += 1,
                    Some(e) => {
                        warn!(error = ?e, "preview digest failed");
                        report.failed += 1;
                    }
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Service;
    use chrono::TimeZone;

    fn entry(fp: &str, service: Service) -> DigestEntry {
        DigestEntry {
            fingerprint: fp.into(),
            source_id: "src".into(),
            service,
            title: "t".into(),
            url: format!("https://example.com/{fp}"),
            published_at: Utc.with_ymd_and_hms(2026, 2, 7, 0, 0, 0).unwrap(),
            summary: Summary {
                headline: format!("H {fp}"),
                bullets: vec!["a".into()],
                importance: Importance::Low,
                topic: "release-note".into(),
            },
        }
    }

    #[test]
    fn grouping_orders_services_and_caps_groups() {
        let mut rows = vec![entry("c1", Service::Claude), entry("o1", Service::OpenAi)];
        rows.extend((0..25).map(|i| entry(&format!("g{i}"), Service::Gemini)));
        let groups = group_for_digest(&rows);
        let services: Vec<_> = groups.iter().map(|(s, _)| *s).collect();
        assert_eq!(services, vec![Service::OpenAi, Service::Gemini, Service::Claude]);
        assert_eq!(groups[1].1.len(), format::MAX_DIGEST_LINES_PER_SERVICE);
        assert_eq!(groups[1].1[0].fingerprint, "g0");
    }

    #[test]
    fn maintenance_actions_parse() {
        assert_eq!("reset".parse::<MaintenanceAction>().unwrap(), MaintenanceAction::Reset);
        assert_eq!(
            " Prune-Unsent ".parse::<MaintenanceAction>().unwrap(),
            MaintenanceAction::PruneUnsent
        );
        assert!("vacuum".parse::<MaintenanceAction>().is_err());
    }

    #[test]
    fn preview_targets_parse() {
        assert_eq!("ALL".parse::<PreviewTarget>().unwrap(), PreviewTarget::All);
        assert_eq!("digest".parse::<PreviewTarget>().unwrap(), PreviewTarget::Digest);
        assert_eq!(
            "gemini".parse::<PreviewTarget>().unwrap(),
            PreviewTarget::Service(Service::Gemini)
        );
        assert!("slack".parse::<PreviewTarget>().is_err());
    }

    #[test]
    fn preview_item_has_three_bullets() {
        let (item, summary) = preview_item(Service::Claude);
        assert_eq!(summary.bullets.len(), 3);
        assert!(item.fingerprint.starts_with("preview-claude-"));
        assert_eq!(item.url, "https://docs.anthropic.com/");
    }
}
