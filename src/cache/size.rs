// Pluggable size measurement for cache accounting
use serde::Serialize;

/// Fallback size charged when a value cannot be measured.
pub const DEFAULT_ENTRY_SIZE: usize = 1024;

/// Strategy for estimating how many bytes a cached value occupies.
pub trait SizeEstimator<V>: Send + Sync {
    fn size_of(&self, value: &V) -> usize;
}

/// Byte-for-byte measurement of raw payloads.
pub struct ByteSize;

impl SizeEstimator<Vec<u8>> for ByteSize {
    fn size_of(&self, value: &Vec<u8>) -> usize {
        value.len()
    }
}

/// UTF-8 length of string values.
pub struct StringSize;

impl SizeEstimator<String> for StringSize {
    fn size_of(&self, value: &String) -> usize {
        value.len()
    }
}

/// Heuristic for complex values: the length of their JSON serialization.
pub struct JsonSize;

impl<V: Serialize> SizeEstimator<V> for JsonSize {
    fn size_of(&self, value: &V) -> usize {
        serde_json::to_vec(value)
            .map(|bytes| bytes.len())
            .unwrap_or(DEFAULT_ENTRY_SIZE)
    }
}
