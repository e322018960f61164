// Durable storage sink for finalized batches
use std::path::PathBuf;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::retry::{transient_status, Retryable};

pub mod fs;
pub mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage responded with status {0}")]
    Status(u16),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Retryable for StorageError {
    fn is_transient(&self) -> bool {
        match self {
            StorageError::Io(_) => true,
            StorageError::Status(code) => transient_status(*code),
            StorageError::Serialize(_) => false,
        }
    }
}

/// Capability to durably associate ordered bytes with a key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}
