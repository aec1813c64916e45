//! Durable state: one SQLite file holding every fingerprint ever seen, its
//! lifecycle timestamps and the generated summary.
//!
//! Every mutation commits on its own. A crash mid-run keeps what was already
//! written, so `is_seen` is the only idempotency boundary across restarts.

mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::ingest::types::{NormalizedItem, Service};
use crate::summarize::Summary;

#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

/// Full `seen_updates` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub fingerprint: String,
    pub source_id: String,
    pub service: Service,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub body: String,
    pub first_seen_at: DateTime<Utc>,
    pub summarized_at: Option<DateTime<Utc>>,
    pub sent_immediate_at: Option<DateTime<Utc>>,
    pub sent_digest_at: Option<DateTime<Utc>>,
}

/// Not-yet-digested update joined with its summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub fingerprint: String,
    pub source_id: String,
    pub service: Service,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub summary: Summary,
}

#[derive(sqlx::FromRow)]
struct UpdateRow {
    fingerprint: String,
    source_id: String,
    service: String,
    title: String,
    url: String,
    published_at: String,
    body: String,
    first_seen_at: String,
    summarized_at: Option<String>,
    sent_immediate_at: Option<String>,
    sent_digest_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DigestRow {
    fingerprint: String,
    source_id: String,
    service: String,
    title: String,
    url: String,
    published_at: String,
    headline: String,
    bullets_json: String,
    importance: String,
    topic: String,
}

/// Fixed-width UTC RFC 3339, so text order equals time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("bad timestamp in store: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

impl TryFrom<UpdateRow> for UpdateRecord {
    type Error = anyhow::Error;

    fn try_from(r: UpdateRow) -> Result<Self> {
        Ok(Self {
            service: Service::from_str(&r.service)?,
            published_at: parse_ts(&r.published_at)?,
            first_seen_at: parse_ts(&r.first_seen_at)?,
            summarized_at: parse_opt_ts(r.summarized_at)?,
            sent_immediate_at: parse_opt_ts(r.sent_immediate_at)?,
            sent_digest_at: parse_opt_ts(r.sent_digest_at)?,
            fingerprint: r.fingerprint,
            source_id: r.source_id,
            title: r.title,
            url: r.url,
            body: r.body,
        })
    }
}

impl TryFrom<DigestRow> for DigestEntry {
    type Error = anyhow::Error;

    fn try_from(r: DigestRow) -> Result<Self> {
        let bullets: Vec<String> = serde_json::from_str(&r.bullets_json)
            .with_context(|| format!("bad bullets_json for {}", r.fingerprint))?;
        Ok(Self {
            service: Service::from_str(&r.service)?,
            published_at: parse_ts(&r.published_at)?,
            summary: Summary {
                headline: r.headline,
                bullets,
                importance: r.importance.parse()?,
                topic: r.topic,
            },
            fingerprint: r.fingerprint,
            source_id: r.source_id,
            title: r.title,
            url: r.url,
        })
    }
}

impl Store {
    /// Open (creating file, parent directories and schema as needed).
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        info!(target: "db", path = %path.display(), "opening store");
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);
        Self::connect(opts).await
    }

    /// Private in-memory database; lives as long as this `Store`.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        Self::connect(opts).await
    }

    async fn connect(opts: SqliteConnectOptions) -> Result<Self> {
        // One connection: the run is sequential and the file has a single writer.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .context("connecting to sqlite store")?;
        let store = Store { pool };
        store.initialize_schema().await.context("initializing schema")?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Release the file. Further calls on this store fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn is_seen(&self, fingerprint: &str) -> Result<bool> {
        let hit = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM seen_updates WHERE fingerprint = ? LIMIT 1",
        )
        .bind(fingerprint)
        .fetch_optional(self.pool())
        .await?;
        Ok(hit.is_some())
    }

    /// Insert-if-absent. Returns `false` (no error) when the fingerprint exists.
    pub async fn add_update(&self, item: &NormalizedItem) -> Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT OR IGNORE INTO seen_updates (
                fingerprint, source_id, service, title, url, published_at, body, first_seen_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.fingerprint)
        .bind(&item.source_id)
        .bind(item.service.as_str())
        .bind(&item.title)
        .bind(&item.url)
        .bind(ts(item.published_at))
        .bind(&item.body)
        .bind(ts(Utc::now()))
        .execute(self.pool())
        .await
        .with_context(|| format!("inserting update {}", item.fingerprint))?;
        Ok(res.rows_affected() == 1)
    }

    /// Upsert (full replace) the summary and stamp `summarized_at` on the parent.
    /// The parent row must already exist.
    pub async fn add_summary(&self, fingerprint: &str, summary: &Summary) -> Result<()> {
        let now = ts(Utc::now());
        let bullets = serde_json::to_string(&summary.bullets)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO summaries (
                fingerprint, headline, bullets_json, importance, topic, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(fingerprint)
        .bind(&summary.headline)
        .bind(bullets)
        .bind(summary.importance.as_str())
        .bind(&summary.topic)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upserting summary {fingerprint}"))?;
        sqlx::query("UPDATE seen_updates SET summarized_at = ? WHERE fingerprint = ?")
            .bind(&now)
            .bind(fingerprint)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_immediate_sent(&self, fingerprint: &str) -> Result<()> {
        self.stamp("sent_immediate_at", fingerprint).await
    }

    pub async fn mark_digest_sent(&self, fingerprint: &str) -> Result<()> {
        self.stamp("sent_digest_at", fingerprint).await
    }

    async fn stamp(&self, column: &'static str, fingerprint: &str) -> Result<()> {
        let sql = format!("UPDATE seen_updates SET {column} = ? WHERE fingerprint = ?");
        sqlx::query(&sql)
            .bind(ts(Utc::now()))
            .bind(fingerprint)
            .execute(self.pool())
            .await
            .with_context(|| format!("stamping {column} on {fingerprint}"))?;
        Ok(())
    }

    /// Summarized records without a digest stamp, newest published first.
    pub async fn unsent_digest_items(&self, limit: u32) -> Result<Vec<DigestEntry>> {
        let rows = sqlx::query_as::<_, DigestRow>(
            r#"
            SELECT u.fingerprint, u.source_id, u.service, u.title, u.url, u.published_at,
                   s.headline, s.bullets_json, s.importance, s.topic
            FROM seen_updates u
            JOIN summaries s ON s.fingerprint = u.fingerprint
            WHERE u.sent_digest_at IS NULL
            ORDER BY u.published_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(DigestEntry::try_from).collect()
    }

    /// Delete every not-yet-digested record and its summary. Returns records removed.
    pub async fn delete_unsent_digest_items(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            DELETE FROM summaries WHERE fingerprint IN (
                SELECT fingerprint FROM seen_updates WHERE sent_digest_at IS NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;
        let res = sqlx::query("DELETE FROM seen_updates WHERE sent_digest_at IS NULL")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected())
    }

    /// Unconditionally clear all state.
    pub async fn reset_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM summaries").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM seen_updates").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_update(&self, fingerprint: &str) -> Result<Option<UpdateRecord>> {
        let row = sqlx::query_as::<_, UpdateRow>("SELECT * FROM seen_updates WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(self.pool())
            .await?;
        row.map(UpdateRecord::try_from).transpose()
    }

    pub async fn get_summary(&self, fingerprint: &str) -> Result<Option<Summary>> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT headline, bullets_json, importance, topic FROM summaries WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(self.pool())
        .await?;
        row.map(|(headline, bullets_json, importance, topic)| -> Result<Summary> {
            Ok(Summary {
                headline,
                bullets: serde_json::from_str(&bullets_json)?,
                importance: importance.parse()?,
                topic,
            })
        })
        .transpose()
    }

    pub async fn count_updates(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM seen_updates")
            .fetch_one(self.pool())
            .await?)
    }

    pub async fn count_summaries(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM summaries")
            .fetch_one(self.pool())
            .await?)
    }
}
