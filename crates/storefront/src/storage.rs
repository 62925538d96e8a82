//! On-device persisted state.
//!
//! The cart and the delivery address survive restarts. Snapshots are written
//! whole; the JSON file store replaces the file atomically so a crash mid-write
//! leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use krushi_sarthi_core::{Address, CartLedger};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Errors from on-device storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything persisted on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSnapshot {
    pub address: Option<Address>,
    pub cart: CartLedger,
}

/// Durable storage for the device snapshot.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Load the last saved snapshot; nothing saved yet is `Ok(None)`.
    async fn load(&self) -> Result<Option<DeviceSnapshot>, StorageError>;

    /// Replace the saved snapshot.
    async fn save(&self, snapshot: &DeviceSnapshot) -> Result<(), StorageError>;
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// Snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DeviceStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<DeviceSnapshot>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved device state");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    #[instrument(skip(self, snapshot), fields(path = %self.path.display(), lines = snapshot.cart.len()))]
    async fn save(&self, snapshot: &DeviceSnapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!("Device state saved");
        Ok(())
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Snapshot held in memory, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<DeviceSnapshot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `snapshot`.
    #[must_use]
    pub fn with_snapshot(snapshot: DeviceSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// The last saved snapshot.
    pub async fn snapshot(&self) -> Option<DeviceSnapshot> {
        self.snapshot.lock().await.clone()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn load(&self) -> Result<Option<DeviceSnapshot>, StorageError> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, snapshot: &DeviceSnapshot) -> Result<(), StorageError> {
        *self.snapshot.lock().await = Some(snapshot.clone());
        Ok(())
    }
}
