//! Durable storage for document snapshots.
//!
//! A snapshot is the flattened value sequence only: a JSON array of strings. Element
//! metadata is not persisted, so a reload assigns fresh clock values.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::error::StoreError;

/// Storage backend for the flattened document.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the last saved snapshot. `Ok(None)` means nothing was ever saved.
    async fn load(&self) -> Result<Option<Vec<String>>, StoreError>;

    /// Overwrites the stored snapshot with `values`.
    async fn save(&self, values: &[String]) -> Result<(), StoreError>;
}

/// Stores the snapshot as a single JSON file.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target, and are
/// serialized through an internal lock so two saves never share the temp file.
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    write_lock: AsyncMutex<()>,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<String>>, StoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {}, starting empty", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let values: Vec<String> =
            serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            "Loaded snapshot of {} values from {}",
            values.len(),
            self.path.display()
        );
        Ok(Some(values))
    }

    async fn save(&self, values: &[String]) -> Result<(), StoreError> {
        let data = serde_json::to_vec(values)?;

        let _guard = self.write_lock.lock().await;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &data)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// Keeps the snapshot in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<Vec<String>>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `values`, as if saved by an earlier run.
    pub fn with_snapshot<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            snapshot: Mutex::new(Some(values.into_iter().map(Into::into).collect())),
            saves: Mutex::new(0),
        }
    }

    /// The most recently saved snapshot.
    pub fn snapshot(&self) -> Option<Vec<String>> {
        self.snapshot.lock().clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, values: &[String]) -> Result<(), StoreError> {
        *self.snapshot.lock() = Some(values.to_vec());
        *self.saves.lock() += 1;
        Ok(())
    }
}
