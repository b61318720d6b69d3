use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use quickurl::clock::ManualClock;
use quickurl::geo::RedirectContext;
use quickurl::logger::{ActivityLog, LogLevel};
use quickurl::models::ShortUrlRecord;
use quickurl::registry::UrlRegistry;
use quickurl::store::{KeyValueStore, MemoryStore, SqliteStore, STORAGE_KEY};
use tempfile::TempDir;

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap(),
    ))
}

#[tokio::test]
async fn test_reload_round_trip_from_sqlite_file() {
    let dir = TempDir::new().unwrap();
    let database_url = format!(
        "sqlite:{}?mode=rwc",
        dir.path().join("quickurl.db").display()
    );
    let clock = fixed_clock();

    let before: Vec<ShortUrlRecord> = {
        let store = SqliteStore::connect(&database_url).await.unwrap();
        let registry = UrlRegistry::builder(Arc::new(store))
            .clock(clock.clone())
            .load()
            .await;

        registry
            .create("https://example.com/docs", Some("docs"), Some(45.0))
            .await
            .unwrap();
        clock.advance(Duration::seconds(3));
        registry
            .create("https://example.com/blog", None, None)
            .await
            .unwrap();
        registry
            .redirect(
                "docs",
                RedirectContext {
                    referrer: Some("https://search.example".into()),
                    user_agent: Some("test-agent".into()),
                    coordinates: None,
                },
            )
            .await
            .unwrap();

        registry.list_all().await
    };

    let store = SqliteStore::connect(&database_url).await.unwrap();
    let reloaded = UrlRegistry::builder(Arc::new(store))
        .clock(clock)
        .load()
        .await;

    assert_eq!(reloaded.list_all().await, before);
    let docs = reloaded.lookup("docs").await.unwrap();
    assert_eq!(docs.clicks.len(), 1);
    assert_eq!(docs.clicks[0].referrer, "https://search.example");
}

#[tokio::test]
async fn test_every_mutation_rewrites_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let registry = UrlRegistry::builder(store.clone())
        .clock(fixed_clock())
        .load()
        .await;
    assert_eq!(store.raw(STORAGE_KEY), None);

    registry
        .create("https://example.com", Some("one"), None)
        .await
        .unwrap();
    registry
        .create("https://example.com", Some("two"), None)
        .await
        .unwrap();

    let stored: Vec<ShortUrlRecord> =
        serde_json::from_str(&store.raw(STORAGE_KEY).unwrap()).unwrap();
    assert_eq!(stored.len(), 2);

    registry.delete("one").await;
    let stored: Vec<ShortUrlRecord> =
        serde_json::from_str(&store.raw(STORAGE_KEY).unwrap()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].short_code, "two");
}

#[tokio::test]
async fn test_snapshot_uses_camel_case_and_rfc3339() {
    let store = Arc::new(MemoryStore::new());
    let registry = UrlRegistry::builder(store.clone())
        .clock(fixed_clock())
        .load()
        .await;
    registry
        .create("https://example.com", Some("fmt"), Some(30.0))
        .await
        .unwrap();

    let blob: serde_json::Value = serde_json::from_str(&store.raw(STORAGE_KEY).unwrap()).unwrap();
    let entry = &blob[0];
    assert_eq!(entry["shortCode"], "fmt");
    assert_eq!(entry["isCustom"], true);
    assert_eq!(entry["isExpired"], false);
    assert_eq!(entry["createdAt"], "2024-03-15T08:00:00Z");
    assert_eq!(entry["expiresAt"], "2024-03-15T08:30:00Z");
    assert!(entry["clicks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_flag_survives_reload() {
    let store = Arc::new(MemoryStore::new());
    let clock = fixed_clock();
    let registry = UrlRegistry::builder(store.clone())
        .clock(clock.clone())
        .load()
        .await;
    registry
        .create("https://example.com", Some("stale"), Some(1.0))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));
    let _ = registry
        .redirect("stale", RedirectContext::default())
        .await;

    // Roll the clock back: the persisted flag must stick regardless.
    clock.advance(Duration::minutes(-2));
    let blob = store.raw(STORAGE_KEY).unwrap();
    let reloaded = UrlRegistry::builder(Arc::new(MemoryStore::with_value(STORAGE_KEY, &blob)))
        .clock(clock)
        .load()
        .await;
    assert!(reloaded.lookup("stale").await.unwrap().is_expired);
}

#[tokio::test]
async fn test_listing_does_not_persist_expiry() {
    let store = Arc::new(MemoryStore::new());
    let clock = fixed_clock();
    let registry = UrlRegistry::builder(store.clone())
        .clock(clock.clone())
        .load()
        .await;
    registry
        .create("https://example.com", Some("lazy"), Some(1.0))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));

    assert!(registry.list_all().await[0].is_expired);

    let stored: Vec<ShortUrlRecord> =
        serde_json::from_str(&store.raw(STORAGE_KEY).unwrap()).unwrap();
    assert!(!stored[0].is_expired);
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let store = Arc::new(MemoryStore::with_value(STORAGE_KEY, "{not json"));
    let log = Arc::new(ActivityLog::new());
    let registry = UrlRegistry::builder(store)
        .log(log.clone())
        .load()
        .await;

    assert!(registry.list_all().await.is_empty());
    assert!(log
        .entries()
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message == "Failed to load URLs from storage"));

    registry
        .create("https://example.com", Some("fresh"), None)
        .await
        .unwrap();
    assert!(registry.lookup("fresh").await.is_some());
}

#[tokio::test]
async fn test_unreadable_store_starts_empty() {
    let seeded = r#"[{"id":"1","originalUrl":"https://example.com","shortCode":"old","shortUrl":"http://localhost:3000/old","createdAt":"2024-03-15T08:00:00Z","expiresAt":"2024-03-15T08:30:00Z","isCustom":true,"clicks":[],"isExpired":false}]"#;
    let store = Arc::new(MemoryStore::with_value(STORAGE_KEY, seeded));
    store.set_fail_reads(true);
    let log = Arc::new(ActivityLog::new());

    let registry = UrlRegistry::builder(store.clone())
        .clock(fixed_clock())
        .log(log.clone())
        .load()
        .await;

    assert!(registry.list_all().await.is_empty());
    let failure = log
        .entries()
        .into_iter()
        .find(|e| e.message == "Failed to load URLs from storage")
        .unwrap();
    assert_eq!(failure.level, LogLevel::Error);
    assert!(failure.data.unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("store is unreachable"));

    // The slot itself is untouched until the first mutation.
    assert_eq!(store.raw(STORAGE_KEY).as_deref(), Some(seeded));
}

#[tokio::test]
async fn test_sqlite_slot_holds_single_blob() {
    let store = SqliteStore::in_memory().await.unwrap();
    let shared = Arc::new(store.clone());
    let registry = UrlRegistry::builder(shared).load().await;

    for code in ["a1", "b2", "c3"] {
        registry
            .create("https://example.com", Some(code), None)
            .await
            .unwrap();
    }

    let blob = store.get(STORAGE_KEY).await.unwrap().unwrap();
    let stored: Vec<ShortUrlRecord> = serde_json::from_str(&blob).unwrap();
    assert_eq!(stored.len(), 3);
}
