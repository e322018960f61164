// Size- and time-bounded in-memory cache for upstream responses
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tokio::time::Instant;
use tracing::debug;

pub mod size;

pub use size::{ByteSize, JsonSize, SizeEstimator, StringSize};

/// Fraction of the size budget cleanup evicts down to, so a single write
/// over budget does not trigger an eviction pass on every subsequent write.
const CLEANUP_TARGET_RATIO: f64 = 0.8;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_size_bytes: usize,
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 8 * 1024 * 1024,
            default_ttl: Duration::from_secs(3600),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    size_bytes: usize,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    current_size_bytes: usize,
}

/// Key/value store bounded both by entry lifetime and total size.
///
/// Expiration is lazy: an expired entry is removed by the read that finds
/// it, never returned. Capacity is enforced after each write: expired
/// entries go first, then live ones ascending by expiry (soonest-expiring
/// approximates oldest) until the store is back under 80% of budget. An
/// entry larger than the whole budget is still admitted rather than
/// silently dropped, leaving the cache over budget until later evictions.
pub struct BoundedCache<V> {
    inner: Mutex<CacheInner<V>>,
    max_size_bytes: usize,
    default_ttl: Duration,
    sizer: Box<dyn SizeEstimator<V>>,
}

impl BoundedCache<Vec<u8>> {
    /// Cache over raw response bodies, sized byte-for-byte.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_estimator(config, Box::new(ByteSize))
    }
}

impl<V: Clone> BoundedCache<V> {
    pub fn with_estimator(config: CacheConfig, sizer: Box<dyn SizeEstimator<V>>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                current_size_bytes: 0,
            }),
            max_size_bytes: config.max_size_bytes,
            default_ttl: config.default_ttl,
            sizer,
        }
    }

    /// Returns the cached value, or `None` if the key is missing or expired.
    /// Expired entries are removed as a side effect of the read.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            Self::remove_entry(&mut inner, key);
        }
        None
    }

    /// Same expiry semantics as `get`, without cloning the value out.
    pub fn contains(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => return true,
            Some(_) => true,
            None => false,
        };
        if expired {
            Self::remove_entry(&mut inner, key);
        }
        false
    }

    /// Insert with the default TTL, overwriting any prior entry.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL, overwriting any prior entry. Triggers a
    /// cleanup pass before returning if the write pushed the cache over
    /// budget.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let size_bytes = self.sizer.size_of(&value);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
            size_bytes,
        };

        let mut inner = self.inner.lock().unwrap();
        if let Some(previous) = inner.entries.insert(key.to_string(), entry) {
            inner.current_size_bytes -= previous.size_bytes;
        }
        inner.current_size_bytes += size_bytes;

        if inner.current_size_bytes > self.max_size_bytes {
            self.cleanup(&mut inner, key);
        }
    }

    /// Explicitly evict a key.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        Self::remove_entry(&mut inner, key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }

    pub fn current_size_bytes(&self) -> usize {
        self.inner.lock().unwrap().current_size_bytes
    }

    fn remove_entry(inner: &mut CacheInner<V>, key: &str) {
        if let Some(entry) = inner.entries.remove(key) {
            inner.current_size_bytes -= entry.size_bytes;
        }
    }

    /// Restore the size budget: drop everything already expired, then evict
    /// live entries ascending by expiry until under the cleanup target.
    /// `admitted` is the key that triggered the pass and is never evicted.
    fn cleanup(&self, inner: &mut CacheInner<V>, admitted: &str) {
        let now = Instant::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            Self::remove_entry(inner, key);
        }

        let target = (self.max_size_bytes as f64 * CLEANUP_TARGET_RATIO) as usize;
        if inner.current_size_bytes <= self.max_size_bytes {
            return;
        }

        let mut candidates: Vec<(String, Instant)> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.as_str() != admitted)
            .map(|(key, entry)| (key.clone(), entry.expires_at))
            .collect();
        candidates.sort_by_key(|(_, expires_at)| *expires_at);

        let mut evicted = 0usize;
        for (key, _) in candidates {
            if inner.current_size_bytes <= target {
                break;
            }
            Self::remove_entry(inner, &key);
            evicted += 1;
        }

        debug!(
            "Cache cleanup: removed {} expired, evicted {}, size now {} bytes",
            expired.len(),
            evicted,
            inner.current_size_bytes
        );
    }
}
