// Deduplicating batch accumulation and durable upload
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, error, info};

use crate::retry::RetryPolicy;
use crate::storage::{ObjectStore, StorageError};

/// Batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub destination: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            destination: "data/tracks.json".to_string(),
        }
    }
}

/// Destination key for a per-user archive.
pub fn user_destination(user: &str) -> String {
    format!("data/{}/tracks.json", user)
}

/// What the batching layer needs from a record: a duplicate-detection key
/// and an optional ordering timestamp. Everything else is opaque.
pub trait BatchRecord: Serialize + Send + Sync {
    fn identity_key(&self) -> String;
    fn scrobble_time(&self) -> Option<DateTime<Utc>>;
}

struct AccumulatorInner<R> {
    seen_keys: HashSet<String>,
    buffer: Vec<R>,
}

/// Accumulates records across concurrent producers, keeping at most one
/// record per identity key. Duplicates are absorbed silently; they are not
/// errors. Buffer order under concurrency is unspecified — ordering is
/// fixed by the sort in `BatchUploader::finalize`.
pub struct BatchAccumulator<R> {
    inner: Mutex<AccumulatorInner<R>>,
}

impl<R: BatchRecord> BatchAccumulator<R> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(AccumulatorInner {
                seen_keys: HashSet::new(),
                buffer: Vec::new(),
            }),
        }
    }

    /// Add records, dropping duplicates and records without an identity key.
    /// Check-and-insert is atomic per key: one lock covers the whole call.
    /// Returns how many records were accepted.
    pub fn add<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = R>,
    {
        let mut inner = self.inner.lock().unwrap();
        let mut accepted = 0;

        for record in records {
            let key = record.identity_key();
            if key.is_empty() {
                debug!("Dropping record without a usable identity key");
                continue;
            }
            if inner.seen_keys.insert(key) {
                inner.buffer.push(record);
                accepted += 1;
            }
        }

        accepted
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().buffer.is_empty()
    }

    /// Drop all buffered records and seen keys. Idempotent, and a no-op
    /// after `finalize` has drained the buffer.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.seen_keys.clear();
        inner.buffer.clear();
    }

    /// Drain the buffer for finalization, resetting the accumulator.
    fn take(&self) -> Vec<R> {
        let mut inner = self.inner.lock().unwrap();
        inner.seen_keys.clear();
        std::mem::take(&mut inner.buffer)
    }
}

impl<R: BatchRecord> Default for BatchAccumulator<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts, serializes and durably uploads an accumulated batch, wrapping the
/// storage sink in the retry policy.
pub struct BatchUploader<S> {
    store: Arc<S>,
    destination: String,
    retry: RetryPolicy,
}

impl<S: ObjectStore> BatchUploader<S> {
    pub fn new(store: Arc<S>, destination: &str, retry: RetryPolicy) -> Self {
        Self {
            store,
            destination: destination.to_string(),
            retry,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Sort the accumulated batch descending by scrobble time (records
    /// without a timestamp sort last), serialize it as a JSON array and
    /// upload it. An empty batch is an informational no-op. Upload failure
    /// after retries is propagated: swallowing it would silently lose the
    /// whole batch.
    pub async fn finalize<R: BatchRecord>(
        &self,
        accumulator: &BatchAccumulator<R>,
    ) -> Result<usize, StorageError> {
        let mut records = accumulator.take();

        if records.is_empty() {
            info!("No records to upload to {}", self.destination);
            return Ok(0);
        }

        records.sort_by(|a, b| b.scrobble_time().cmp(&a.scrobble_time()));
        let payload = serde_json::to_vec_pretty(&records)?;

        let result = self
            .retry
            .execute_with_retry(
                || self.store.put_object(&self.destination, &payload),
                "upload batch",
            )
            .await;

        match result {
            Ok(()) => {
                info!(
                    "Successfully uploaded {} records to {}",
                    records.len(),
                    self.destination
                );
                Ok(records.len())
            }
            Err(err) => {
                error!("Failed to upload batch to {}: {}", self.destination, err);
                Err(err)
            }
        }
    }
}
