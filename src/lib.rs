// Resilient enrichment and archival pipeline for scrobble records
use std::num::NonZeroU32;
use std::sync::Arc;

pub mod rate_limit;
pub mod retry;
pub mod cache;
pub mod batch;
pub mod client;
pub mod storage;
pub mod record;
pub mod config;
pub mod logging;

pub use batch::{BatchAccumulator, BatchRecord, BatchUploader};
pub use cache::BoundedCache;
pub use client::{ApiError, ApiRequest, HttpTransport, ResilientClient, Transport};
pub use config::AppConfig;
pub use rate_limit::RateLimiter;
pub use record::Track;
pub use retry::{RetryPolicy, Retryable};
pub use storage::{ObjectStore, StorageError};

/// The full enrichment path, explicitly constructed and owned by the run:
/// a resilient upstream client feeding a deduplicating accumulator, drained
/// into durable storage by the uploader.
pub struct EnrichmentPipeline<T, S> {
    client: ResilientClient<T>,
    accumulator: BatchAccumulator<Track>,
    uploader: BatchUploader<S>,
}

impl<T: Transport, S: ObjectStore> EnrichmentPipeline<T, S> {
    pub fn new(config: &AppConfig, transport: Arc<T>, store: Arc<S>) -> Self {
        let requests_per_second =
            NonZeroU32::new(config.api.requests_per_second).unwrap_or(NonZeroU32::MIN);

        let client = ResilientClient::new(
            transport,
            BoundedCache::new(config.cache.clone()),
            RateLimiter::new(requests_per_second),
            RetryPolicy::new(config.retry.clone()),
        );
        let uploader = BatchUploader::new(
            store,
            &config.batch.destination,
            RetryPolicy::new(config.retry.clone()),
        );

        Self {
            client,
            accumulator: BatchAccumulator::new(),
            uploader,
        }
    }

    /// The cached, paced, retrying upstream client.
    pub fn client(&self) -> &ResilientClient<T> {
        &self.client
    }

    /// Feed enriched records into the batch. Duplicates are absorbed.
    pub fn add_tracks<I>(&self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        self.accumulator.add(tracks)
    }

    pub fn pending(&self) -> usize {
        self.accumulator.len()
    }

    /// Sort, serialize and durably upload everything accumulated so far.
    pub async fn finish(&self) -> Result<usize, StorageError> {
        self.uploader.finalize(&self.accumulator).await
    }

    /// Drop the accumulated batch without uploading.
    pub fn discard(&self) {
        self.accumulator.clear();
    }
}
