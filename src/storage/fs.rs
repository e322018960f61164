// Filesystem-backed object store
use std::path::PathBuf;
use async_trait::async_trait;
use tracing::debug;

use super::{ObjectStore, StorageConfig, StorageError};

/// Maps object keys to paths under a data directory. Intermediate
/// directories in a key such as `data/<user>/tracks.json` are created on
/// demand.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}
