// tests/pipeline_digest.rs
mod common;

use ai_updates::ingest::normalize;
use ai_updates::ingest::types::{RawRecord, Service};
use ai_updates::pipeline::{run_digest, run_maintenance, run_preview, MaintenanceAction};
use ai_updates::store::Store;
use ai_updates::summarize::{Importance, Summary};
use common::*;

async fn seed(store: &Store, raw: &RawRecord) -> String {
    let item = normalize(raw);
    store.add_update(&item).await.unwrap();
    store
        .add_summary(
            &item.fingerprint,
            &Summary {
                headline: format!("H {}", item.title),
                bullets: vec!["b".into()],
                importance: Importance::Low,
                topic: "release-note".into(),
            },
        )
        .await
        .unwrap();
    item.fingerprint
}

#[tokio::test]
async fn combined_digest_sends_once_and_stamps_everything() {
    let store = Store::open_in_memory().await.unwrap();
    let o = source("o", Service::OpenAi);
    let c = source("c", Service::Claude);
    seed(&store, &record(&o, "Alpha", 1)).await;
    seed(&store, &record(&c, "Beta", 2)).await;

    let cfg = config(&[("DISCORD_WEBHOOK_DIGEST", "https://discord.test/digest")]);
    let notifier = RecordingNotifier::default();
    let report = run_digest(&cfg, &store, &notifier).await.unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.stamped, 2);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    let body = &posts[0].1;
    assert!(body.starts_with("**AI Updates Daily Digest**"));
    let openai_at = body.find("## openai").unwrap();
    let claude_at = body.find("## claude").unwrap();
    assert!(openai_at < claude_at);

    // Nothing left for the next digest.
    let again = run_digest(&cfg, &store, &notifier).await.unwrap();
    assert_eq!(again.rows, 0);
    assert_eq!(notifier.posts().len(), 1);
}

#[tokio::test]
async fn failed_group_stays_eligible() {
    let store = Store::open_in_memory().await.unwrap();
    let o = source("o", Service::OpenAi);
    let g = source("g", Service::Gemini);
    let o_fp = seed(&store, &record(&o, "Alpha", 1)).await;
    let g_fp = seed(&store, &record(&g, "Gamma", 2)).await;

    let cfg = config(&[
        ("DISCORD_WEBHOOK_OPENAI", "https://discord.test/openai"),
        ("DISCORD_WEBHOOK_GEMINI", "https://discord.test/gemini"),
    ]);
    let notifier = RecordingNotifier::failing_on(&["https://discord.test/gemini"]);
    let report = run_digest(&cfg, &store, &notifier).await.unwrap();
    assert_eq!(report.groups_sent, 1);
    assert_eq!(report.groups_failed, 1);
    assert_eq!(report.stamped, 1);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.starts_with("**Daily Digest: openai**"));

    assert!(store.get_update(&o_fp).await.unwrap().unwrap().sent_digest_at.is_some());
    assert!(store.get_update(&g_fp).await.unwrap().unwrap().sent_digest_at.is_none());
    let left = store.unsent_digest_items(150).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].fingerprint, g_fp);
}

#[tokio::test]
async fn service_without_webhook_is_skipped() {
    let store = Store::open_in_memory().await.unwrap();
    let c = source("c", Service::Claude);
    seed(&store, &record(&c, "Delta", 3)).await;

    let cfg = config(&[]);
    let notifier = RecordingNotifier::default();
    let report = run_digest(&cfg, &store, &notifier).await.unwrap();
    assert_eq!(report.groups_skipped, 1);
    assert_eq!(report.stamped, 0);
    assert!(notifier.posts().is_empty());
}

#[tokio::test]
async fn groups_cap_at_twenty_lines() {
    let store = Store::open_in_memory().await.unwrap();
    let o = source("o", Service::OpenAi);
    for i in 0..25u32 {
        seed(&store, &record(&o, &format!("Item {i}"), 1 + i)).await;
    }
    let cfg = config(&[("DISCORD_WEBHOOK_OPENAI", "https://discord.test/openai")]);
    let notifier = RecordingNotifier::default();
    let report = run_digest(&cfg, &store, &notifier).await.unwrap();
    assert_eq!(report.rows, 25);
    assert_eq!(report.stamped, 20);
    // The five oldest remain.
    assert_eq!(store.unsent_digest_items(150).await.unwrap().len(), 5);
}

#[tokio::test]
async fn prune_unsent_keeps_digested_rows() {
    let store = Store::open_in_memory().await.unwrap();
    let o = source("o", Service::OpenAi);
    let sent = seed(&store, &record(&o, "Sent", 1)).await;
    seed(&store, &record(&o, "Pending", 2)).await;
    store.mark_digest_sent(&sent).await.unwrap();

    let removed = run_maintenance(&store, MaintenanceAction::PruneUnsent)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count_updates().await.unwrap(), 1);
    assert_eq!(store.count_summaries().await.unwrap(), 1);

    let removed = run_maintenance(&store, MaintenanceAction::Reset).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count_updates().await.unwrap(), 0);
}

#[tokio::test]
async fn preview_skips_missing_webhooks_and_ignores_bad_targets() {
    let cfg = config(&[
        ("DISCORD_WEBHOOK_OPENAI", "https://discord.test/openai"),
        ("DISCORD_WEBHOOK_DIGEST", "https://discord.test/digest"),
    ]);
    let notifier = RecordingNotifier::default();

    let report = run_preview(&cfg, &notifier, "all").await;
    assert_eq!(report.sent, 2);
    assert_eq!(report.skipped, 2);

    let bad = run_preview(&cfg, &notifier, "telegram").await;
    assert_eq!(bad.sent + bad.skipped + bad.failed, 0);
    assert_eq!(notifier.posts().len(), 2);
}

#[tokio::test]
async fn failed_chunk_only_keeps_its_own_rows_unsent() {
    let store = Store::open_in_memory().await.unwrap();
    let o = source("o", Service::OpenAi);
    let mut fps = Vec::new();
    for i in 0..6u32 {
        fps.push(seed(&store, &record(&o, &format!("Headline number {i}"), 1 + i)).await);
    }

    let cfg = config(&[("DISCORD_WEBHOOK_DIGEST", "https://discord.test/digest")]);
    let notifier = RecordingNotifier {
        max_chars: 200,
        fail_at: Some(1),
        ..Default::default()
    };
    let report = run_digest(&cfg, &store, &notifier).await.unwrap();
    assert_eq!(report.groups_failed, 1);
    assert_eq!(report.chunks_sent, 1);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    let delivered = &posts[0].1;

    let mut stamped = 0;
    for fp in &fps {
        let rec = store.get_update(fp).await.unwrap().unwrap();
        let in_first_chunk = delivered.contains(&format!("{}\n", rec.url))
            || delivered.ends_with(&rec.url);
        assert_eq!(rec.sent_digest_at.is_some(), in_first_chunk, "{}", rec.title);
        if in_first_chunk {
            stamped += 1;
        }
    }
    assert!(stamped > 0 && stamped < fps.len());
    assert_eq!(report.stamped, stamped);

    // Next digest sends only what was not delivered.
    let left = store.unsent_digest_items(150).await.unwrap();
    assert_eq!(left.len(), fps.len() - stamped);
    let next = RecordingNotifier::default();
    let again = run_digest(&cfg, &store, &next).await.unwrap();
    assert_eq!(again.stamped, fps.len() - stamped);
    let resent = &next.posts()[0].1;
    for line in delivered.lines().filter(|l| l.starts_with("  https://")) {
        assert!(!resent.contains(&format!("{line}\n")) && !resent.ends_with(line));
    }
}
