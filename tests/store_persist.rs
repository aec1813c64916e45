// tests/store_persist.rs
use ai_updates::ingest::normalize;
use ai_updates::ingest::types::{RawRecord, Service};
use ai_updates::store::Store;
use chrono::{TimeZone, Utc};

fn raw() -> RawRecord {
    RawRecord {
        source_id: "gemini_api_changelog".into(),
        service: Service::Gemini,
        title: "Model update | Gemini API".into(),
        url: "https://ai.google.dev/gemini-api/docs/changelog#model-update-1".into(),
        published_at: Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap(),
        body: "New model available.".into(),
    }
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("updates.db");
    let item = normalize(&raw());

    let store = Store::open(&path).await.unwrap();
    assert!(store.add_update(&item).await.unwrap());
    store.close().await;

    let store = Store::open(&path).await.unwrap();
    assert!(store.is_seen(&item.fingerprint).await.unwrap());
    assert!(!store.add_update(&item).await.unwrap());
    let rec = store.get_update(&item.fingerprint).await.unwrap().unwrap();
    assert_eq!(rec.service, Service::Gemini);
    assert_eq!(rec.published_at, item.published_at);
    store.close().await;
}
