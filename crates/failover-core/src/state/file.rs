// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps the failover state of one record across daemon restarts and
// crashes, so an in-progress failure streak or restoration period survives.
//
// ## Crash Recovery
//
// - Atomic writes: write `<path>.tmp`, fsync, then rename over `<path>`
// - Automatic backup: the previous file is kept as `<path>.backup`
// - Corruption detection: JSON is validated on load
// - Recovery: falls back to the backup, then to "nothing persisted"
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "record": "app.example.com",
//   "state": {
//     "current_target": "backup",
//     "consecutive_failures": 0,
//     "consecutive_high_latency": 0,
//     "consecutive_healthy_since_backup": 7,
//     "history": [ ... ],
//     "failover_events": [ ... ],
//     "samples_processed": 4312
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::model::FailoverState;
use crate::traits::{StateStore, StateStoreFactory};

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use failover_core::state::FileStateStore;
/// use failover_core::{FailoverState, StateStore, Target};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/failover/state.json", "app.example.com").await?;
///
///     store.save(&FailoverState::fresh(Target::Primary)).await?;
///     let state = store.load().await?;
///     assert!(state.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    record: String,
}

/// Serializable state file format
#[derive(Debug, Serialize, Deserialize)]
struct StateFileFormat {
    version: String,
    record: String,
    state: FailoverState,
}

/// Outcome of reading one candidate file
enum ReadOutcome {
    Missing,
    Corrupt(String),
    Loaded(StateFileFormat),
}

impl FileStateStore {
    /// Create a file state store, creating parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P, record: impl Into<String>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self {
            path,
            record: record.into(),
        })
    }

    /// Path of the main state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    pub fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, ".tmp")
    }

    /// Get path to backup file
    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, ".backup")
    }

    async fn read(path: &Path) -> Result<ReadOutcome, Error> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Ok(ReadOutcome::Corrupt(e.to_string()));
            }
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read state file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match serde_json::from_str::<StateFileFormat>(&content) {
            Ok(file) => {
                if file.version != STATE_FILE_VERSION {
                    tracing::warn!(
                        "State file version mismatch: expected {}, got {}. \
                        Attempting to load anyway.",
                        STATE_FILE_VERSION,
                        file.version
                    );
                }
                Ok(ReadOutcome::Loaded(file))
            }
            Err(e) => Ok(ReadOutcome::Corrupt(e.to_string())),
        }
    }

    fn accept(&self, file: StateFileFormat, source: &Path) -> Option<FailoverState> {
        if file.record != self.record {
            tracing::warn!(
                path = %source.display(),
                expected = %self.record,
                found = %file.record,
                "State file belongs to a different record, ignoring it"
            );
            return None;
        }
        Some(file.state.normalized())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<FailoverState>, Error> {
        match Self::read(&self.path).await? {
            ReadOutcome::Loaded(file) => {
                tracing::debug!("Loaded state from {}", self.path.display());
                return Ok(self.accept(file, &self.path));
            }
            ReadOutcome::Missing => {
                tracing::debug!("State file does not exist: {}", self.path.display());
                return Ok(None);
            }
            ReadOutcome::Corrupt(reason) => {
                tracing::warn!(
                    "State file {} appears corrupted: {}. Attempting recovery from backup.",
                    self.path.display(),
                    reason
                );
            }
        }

        let backup_path = self.backup_path();
        match Self::read(&backup_path).await? {
            ReadOutcome::Loaded(file) => {
                tracing::info!("Recovered state from backup {}", backup_path.display());
                Ok(self.accept(file, &backup_path))
            }
            ReadOutcome::Missing => {
                tracing::warn!("No backup file found. Starting with empty state.");
                Ok(None)
            }
            ReadOutcome::Corrupt(reason) => {
                tracing::warn!(
                    "Backup also corrupted: {}. Starting with empty state.",
                    reason
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, state: &FailoverState) -> Result<(), Error> {
        let file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            record: self.record.clone(),
            state: state.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut tmp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            tmp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            tmp.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep the previous good state as backup
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            if let Err(e) = fs::copy(&self.path, self.backup_path()).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        // Make the rename itself durable
        if let Err(e) = sync_parent(&self.path).await {
            tracing::warn!("Failed to sync directory of {}: {}", self.path.display(), e);
        }

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[cfg(unix)]
async fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::File::open(dir).await?.sync_all().await,
        _ => fs::File::open(".").await?.sync_all().await,
    }
}

// Directories cannot be opened for syncing here
#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Factory for file state stores
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(
        &self,
        config: &StateStoreConfig,
        record_name: &str,
    ) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::File { path } => {
                Ok(Box::new(FileStateStore::new(path, record_name).await?))
            }
            other => Err(Error::config(format!(
                "File state store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
