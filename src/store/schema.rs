use tracing::debug;

use super::Store;

impl Store {
    /// Idempotent: safe on every open.
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS seen_updates (
                fingerprint TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                service TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                published_at TEXT NOT NULL,
                body TEXT NOT NULL,
                first_seen_at TEXT NOT NULL,
                summarized_at TEXT,
                sent_immediate_at TEXT,
                sent_digest_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_seen_updates_sent_digest_at
                ON seen_updates (sent_digest_at);

            CREATE TABLE IF NOT EXISTS summaries (
                fingerprint TEXT PRIMARY KEY,
                headline TEXT NOT NULL,
                bullets_json TEXT NOT NULL,
                importance TEXT NOT NULL,
                topic TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (fingerprint) REFERENCES seen_updates (fingerprint)
            );
            "#,
        )
        .execute(self.pool())
        .await?;

        debug!(target: "db", "schema ready");
        Ok(())
    }
}
