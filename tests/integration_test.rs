use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use lastfm_archiver_rs::client::{ApiError, ApiRequest, ApiResponse, Transport};
use lastfm_archiver_rs::storage::MemoryObjectStore;
use lastfm_archiver_rs::{AppConfig, EnrichmentPipeline, Track};

/// Fails with 503 a scripted number of times, then succeeds.
struct ScriptedTransport {
    calls: AtomicU32,
    failures_before_success: u32,
}

impl ScriptedTransport {
    fn new(failures_before_success: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures_before_success,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, _request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(ApiError::Status(503))
        } else {
            Ok(ApiResponse {
                status: 200,
                body: b"{\"toptags\":{\"tag\":[{\"name\":\"idm\"}]}}".to_vec(),
            })
        }
    }
}

/// Records the dispatch time of every call it receives.
struct RecordingTransport {
    timestamps: Mutex<Vec<tokio::time::Instant>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn fetch(&self, _request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.timestamps
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        Ok(ApiResponse {
            status: 200,
            body: b"{}".to_vec(),
        })
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.batch.destination = "data/testuser/tracks.json".to_string();
    config
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_enrichment_and_archive() {
    let config = test_config();
    let transport = Arc::new(ScriptedTransport::new(2));
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = EnrichmentPipeline::new(&config, transport.clone(), store.clone());

    // Upstream overloaded twice, then recovers: the caller sees the value
    let request = ApiRequest::artist_top_tags(&config.api, "Autechre");
    let body = pipeline
        .client()
        .fetch_cached("tagAutechre", &request)
        .await
        .unwrap();
    assert!(!body.is_empty());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

    // The response was cached: a repeat lookup makes no further calls
    pipeline
        .client()
        .fetch_cached("tagAutechre", &request)
        .await
        .unwrap();
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

    // Accumulate enriched records, one of them a duplicate
    let newest = Track::new("Autechre", "Bike")
        .with_scrobble_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_user("testuser");
    let older = Track::new("Autechre", "Cipater")
        .with_scrobble_time(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        .with_user("testuser");
    let untimed = Track::new("Autechre", "Gantz Graf").with_user("testuser");

    let accepted = pipeline.add_tracks(vec![
        newest.clone(),
        older.clone(),
        untimed.clone(),
        newest.clone(),
    ]);
    assert_eq!(accepted, 3);
    assert_eq!(pipeline.pending(), 3);

    // Finalize: sorted newest-first with untimed records last
    let uploaded = pipeline.finish().await.unwrap();
    assert_eq!(uploaded, 3);
    assert_eq!(pipeline.pending(), 0);

    let payload = store.object("data/testuser/tracks.json").unwrap();
    let archived: Vec<Track> = serde_json::from_slice(&payload).unwrap();
    assert_eq!(archived[0].title, "Bike");
    assert_eq!(archived[1].title, "Cipater");
    assert_eq!(archived[2].title, "Gantz Graf");
}

#[tokio::test(start_paused = true)]
async fn test_empty_run_uploads_nothing() {
    let config = test_config();
    let transport = Arc::new(ScriptedTransport::new(0));
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = EnrichmentPipeline::new(&config, transport, store.clone());

    let uploaded = pipeline.finish().await.unwrap();

    assert_eq!(uploaded, 0);
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_respect_dispatch_spacing() {
    let mut config = test_config();
    config.api.requests_per_second = 10;

    let transport = Arc::new(RecordingTransport {
        timestamps: Mutex::new(Vec::new()),
    });
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = Arc::new(EnrichmentPipeline::new(&config, transport.clone(), store));

    let mut handles = Vec::new();
    for i in 0..6 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("corrArtist{}", i);
            let request = ApiRequest::new("https://upstream.test/");
            pipeline.client().fetch_cached(&key, &request).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut timestamps = transport.timestamps.lock().unwrap().clone();
    timestamps.sort();
    assert_eq!(timestamps.len(), 6);
    for pair in timestamps.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_permanent_upstream_failure_is_not_fatal_to_the_batch() {
    let config = test_config();

    struct AlwaysNotFound;
    #[async_trait]
    impl Transport for AlwaysNotFound {
        async fn fetch(&self, _request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            Err(ApiError::Status(404))
        }
    }

    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = EnrichmentPipeline::new(&config, Arc::new(AlwaysNotFound), store.clone());

    // Enrichment lookup fails; the record is archived without it
    let request = ApiRequest::new("https://upstream.test/");
    let result = pipeline.client().fetch_cached("corrUnknown", &request).await;
    assert!(matches!(result, Err(ApiError::Status(404))));

    pipeline.add_tracks(vec![Track::new("Unknown Artist", "Untitled")]);
    let uploaded = pipeline.finish().await.unwrap();
    assert_eq!(uploaded, 1);
    assert!(store.object("data/testuser/tracks.json").is_some());
}
