//! Durable snapshot storage.
//!
//! Records are addressed by [`FlightKey::storage_path`]. The filesystem backend
//! keeps one pretty-printed JSON file per flight under
//! `{root}/{origin}/{destination}/{date}/{flightNumber}.json`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::snapshot::{ArchivedFlight, FlightKey, ResolvedFlight, Snapshot};
use crate::window::DateWindow;

const RECORD_EXTENSION: &str = "json";

/// Key/value interface to wherever archived flights live.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// `None` when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Bytes>, StorageError>;

    /// Deleting a missing record is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Every stored path.
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// Serialize `flight` and store it under its key.
pub async fn archive_flight(
    store: &dyn SnapshotStore,
    flight: &ResolvedFlight,
) -> Result<(), StorageError> {
    let key = flight.key();
    let path = key.storage_path();
    let bytes = serde_json::to_vec_pretty(&flight.to_record())
        .map_err(|e| StorageError::serialization(&path, e))?;
    store.put(&path, Bytes::from(bytes)).await
}

/// Read one archived flight, `None` if it is not stored.
pub async fn read_flight(
    store: &dyn SnapshotStore,
    key: &FlightKey,
) -> Result<Option<ResolvedFlight>, StorageError> {
    let path = key.storage_path();
    let Some(bytes) = store.get(&path).await? else {
        return Ok(None);
    };
    let record: ArchivedFlight =
        serde_json::from_slice(&bytes).map_err(|e| StorageError::serialization(&path, e))?;
    Ok(Some(ResolvedFlight::from_record(key, record)))
}

/// Load every archived flight dated inside `window` (or all of them).
///
/// A store that cannot be listed is an error; individual records that cannot
/// be parsed or read are skipped.
pub async fn load_snapshot(
    store: &dyn SnapshotStore,
    window: Option<&DateWindow>,
) -> Result<Snapshot, StorageError> {
    let paths = store.list().await?;
    let mut snapshot = Snapshot::new();
    let mut skipped = 0usize;

    for path in &paths {
        let key = match FlightKey::from_storage_path(path) {
            Ok(key) => key,
            Err(e) => {
                warn!(path = %path, error = %e, "Skipping unrecognised snapshot entry");
                skipped += 1;
                continue;
            }
        };
        if window.is_some_and(|window| !window.contains(key.date)) {
            continue;
        }

        match read_flight(store, &key).await {
            Ok(Some(flight)) => {
                snapshot.insert(flight);
            }
            Ok(None) => debug!(path = %path, "Snapshot entry vanished while loading"),
            Err(e) => {
                warn!(path = %path, error = %e, "Skipping unreadable snapshot entry");
                skipped += 1;
            }
        }
    }

    info!(
        stored = paths.len(),
        loaded = snapshot.len(),
        skipped,
        "Loaded previous snapshot"
    );
    Ok(snapshot)
}

fn validate_path(path: &str) -> Result<(), StorageError> {
    let valid = !path.is_empty()
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != ".." && !part.contains('\\'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(path.to_owned()))
    }
}

/// One JSON file per record below a root directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(format!("{path}.{RECORD_EXTENSION}")))
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<(), StorageError> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        tokio::fs::write(&file, &bytes)
            .await
            .map_err(|e| StorageError::io(&file, e))
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let file = self.file_path(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&file, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let file = self.file_path(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&file, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut paths = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A store that was never written to is empty.
                Err(e) if e.kind() == ErrorKind::NotFound && dir == self.root => break,
                Err(e) => return Err(StorageError::io(&dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(&dir, e))?
            {
                let entry_path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::io(&entry_path, e))?;

                if file_type.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                if entry_path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                    continue;
                }
                let stem = entry_path.with_extension("");
                let Ok(relative) = stem.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                paths.push(key);
            }
        }

        paths.sort();
        Ok(paths)
    }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    records: Mutex<BTreeMap<String, Bytes>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(&self, path: &str, bytes: Bytes) -> Result<(), StorageError> {
        validate_path(path)?;
        self.records.lock().insert(path.to_owned(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        validate_path(path)?;
        Ok(self.records.lock().get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        self.records.lock().remove(path);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.records.lock().keys().cloned().collect())
    }
}
