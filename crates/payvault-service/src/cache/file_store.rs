//! JSON-file persistence for the local cache.

use async_trait::async_trait;
use payvault_core::{CacheEntry, PaymentError, PaymentResult, PersistentStore};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

type Entries = HashMap<String, CacheEntry<String>>;

/// Stores every cache entry in a single JSON document.
///
/// Writes go to a sibling temp file that is then renamed over the original,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl FileCacheStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> PaymentResult<Entries> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Entries::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(io_error("read", &self.path, e)),
        }
    }

    async fn write_all(&self, entries: &Entries) -> PaymentResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error("create directory for", &self.path, e))?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec(entries)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace", &self.path, e))?;

        debug!("Persisted {} cache entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> PaymentError {
    PaymentError::Cache(format!("Failed to {} {}: {}", action, path.display(), err))
}

#[async_trait]
impl PersistentStore for FileCacheStore {
    async fn load_entry(&self, key: &str) -> PaymentResult<Option<CacheEntry<String>>> {
        let _guard = self.io.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn save_entry(&self, key: &str, entry: &CacheEntry<String>) -> PaymentResult<()> {
        let _guard = self.io.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), entry.clone());
        self.write_all(&entries).await
    }

    async fn delete_entry(&self, key: &str) -> PaymentResult<()> {
        let _guard = self.io.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }

    async fn delete_all(&self) -> PaymentResult<()> {
        let _guard = self.io.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &self.path, e)),
        }
    }
}
