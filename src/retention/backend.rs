//! Storage backends for retained datasets.
//!
//! A backend is the durability collaborator behind [`RetentionStore`](super::RetentionStore).
//! It must apply an insert and the matching over-capacity deletes as one step:
//! either both are visible afterwards or neither is.

use crate::error::PersistenceError;
use crate::models::{DatasetId, DatasetRecord, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Storage contract consumed by the retention store.
pub trait DatasetBackend: Send + Sync {
    /// Persist `record`, then delete every record of the same owner beyond the
    /// newest `capacity`, atomically. Returns the evicted ids.
    fn insert_retaining(
        &self,
        record: DatasetRecord,
        capacity: usize,
    ) -> Result<Vec<DatasetId>, PersistenceError>;

    /// All records of `owner`, newest first.
    fn list_owner(&self, owner: &OwnerId) -> Result<Vec<DatasetRecord>, PersistenceError>;

    fn get(&self, id: DatasetId) -> Result<Option<DatasetRecord>, PersistenceError>;

    /// Returns whether a record was removed.
    fn delete(&self, id: DatasetId) -> Result<bool, PersistenceError>;

    /// Highest id and latest upload time ever stored, used to resume the store clock.
    fn high_water_mark(&self) -> Result<Option<(DatasetId, DateTime<Utc>)>, PersistenceError>;
}

/// Retention order: newest upload first, later insert first on equal timestamps.
pub fn retention_order(a: &DatasetRecord, b: &DatasetRecord) -> Ordering {
    b.uploaded_at
        .cmp(&a.uploaded_at)
        .then_with(|| b.id.cmp(&a.id))
}

type RecordMap = BTreeMap<DatasetId, DatasetRecord>;

fn owner_records(records: &RecordMap, owner: &OwnerId) -> Vec<DatasetRecord> {
    let mut owned: Vec<DatasetRecord> = records
        .values()
        .filter(|r| &r.owner_id == owner)
        .cloned()
        .collect();
    owned.sort_by(retention_order);
    owned
}

/// Insert into `records` and drop the owner's records past `capacity`.
fn apply_insert(records: &mut RecordMap, record: DatasetRecord, capacity: usize) -> Vec<DatasetId> {
    let owner = record.owner_id.clone();
    let new_id = record.id;
    records.insert(new_id, record);

    let evicted: Vec<DatasetId> = owner_records(records, &owner)
        .iter()
        .skip(capacity)
        .map(|r| r.id)
        .filter(|id| *id != new_id)
        .collect();

    for id in &evicted {
        records.remove(id);
    }

    evicted
}

fn high_water(records: &RecordMap) -> Option<(DatasetId, DateTime<Utc>)> {
    let max_id = records.keys().next_back().copied()?;
    let latest = records.values().map(|r| r.uploaded_at).max()?;
    Some((max_id, latest))
}

/// Volatile backend holding every record in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<RecordMap>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetBackend for MemoryBackend {
    fn insert_retaining(
        &self,
        record: DatasetRecord,
        capacity: usize,
    ) -> Result<Vec<DatasetId>, PersistenceError> {
        let mut records = self.records.write().map_err(|_| PersistenceError::Poisoned)?;
        Ok(apply_insert(&mut records, record, capacity))
    }

    fn list_owner(&self, owner: &OwnerId) -> Result<Vec<DatasetRecord>, PersistenceError> {
        let records = self.records.read().map_err(|_| PersistenceError::Poisoned)?;
        Ok(owner_records(&records, owner))
    }

    fn get(&self, id: DatasetId) -> Result<Option<DatasetRecord>, PersistenceError> {
        let records = self.records.read().map_err(|_| PersistenceError::Poisoned)?;
        Ok(records.get(&id).cloned())
    }

    fn delete(&self, id: DatasetId) -> Result<bool, PersistenceError> {
        let mut records = self.records.write().map_err(|_| PersistenceError::Poisoned)?;
        Ok(records.remove(&id).is_some())
    }

    fn high_water_mark(&self) -> Result<Option<(DatasetId, DateTime<Utc>)>, PersistenceError> {
        let records = self.records.read().map_err(|_| PersistenceError::Poisoned)?;
        Ok(high_water(&records))
    }
}

/// Current on-disk snapshot layout version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    records: Vec<DatasetRecord>,
}

/// Backend persisting every record into a single JSON snapshot file.
///
/// Each mutation writes a full snapshot to a temporary file next to the target
/// and renames it into place. The in-memory copy is replaced only after the
/// rename succeeds, so a failed write leaves the backend unchanged.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    records: Mutex<RecordMap>,
}

impl JsonFileBackend {
    /// Open the snapshot at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();

        let records = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;
            let snapshot: Snapshot =
                serde_json::from_str(&content).map_err(|source| PersistenceError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            info!(
                "Loaded {} dataset(s) from {}",
                snapshot.records.len(),
                path.display()
            );
            snapshot.records.into_iter().map(|r| (r.id, r)).collect()
        } else {
            debug!("No snapshot at {}, starting empty", path.display());
            RecordMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `records` to disk via temp file + rename.
    fn persist(&self, records: &RecordMap) -> Result<(), PersistenceError> {
        let io_err = |source: std::io::Error| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            records: records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!("Wrote snapshot with {} record(s)", snapshot.records.len());
        Ok(())
    }

    /// Apply `mutate` to a copy of the state, persist it, then commit.
    fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut RecordMap) -> T,
    ) -> Result<T, PersistenceError> {
        let mut records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        let mut next = records.clone();
        let outcome = mutate(&mut next);
        self.persist(&next)?;
        *records = next;
        Ok(outcome)
    }
}

impl DatasetBackend for JsonFileBackend {
    fn insert_retaining(
        &self,
        record: DatasetRecord,
        capacity: usize,
    ) -> Result<Vec<DatasetId>, PersistenceError> {
        self.mutate(|records| apply_insert(records, record, capacity))
    }

    fn list_owner(&self, owner: &OwnerId) -> Result<Vec<DatasetRecord>, PersistenceError> {
        let records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(owner_records(&records, owner))
    }

    fn get(&self, id: DatasetId) -> Result<Option<DatasetRecord>, PersistenceError> {
        let records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(records.get(&id).cloned())
    }

    fn delete(&self, id: DatasetId) -> Result<bool, PersistenceError> {
        {
            let records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
            if !records.contains_key(&id) {
                return Ok(false);
            }
        }
        self.mutate(|records| records.remove(&id).is_some())
    }

    fn high_water_mark(&self) -> Result<Option<(DatasetId, DateTime<Utc>)>, PersistenceError> {
        let records = self.records.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(high_water(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Summary;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn record(id: DatasetId, owner: &str, minute: i64) -> DatasetRecord {
        DatasetRecord {
            id,
            owner_id: OwnerId::from(owner),
            filename: format!("upload-{}.csv", id),
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
            summary: Summary::default(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn test_memory_insert_evicts_oldest_for_owner_only() {
        let backend = MemoryBackend::new();
        backend.insert_retaining(record(1, "alice", 0), 2).unwrap();
        backend.insert_retaining(record(2, "bob", 1), 2).unwrap();
        backend.insert_retaining(record(3, "alice", 2), 2).unwrap();

        let evicted = backend.insert_retaining(record(4, "alice", 3), 2).unwrap();
        assert_eq!(evicted, vec![1]);

        let ids: Vec<_> = backend
            .list_owner(&OwnerId::from("alice"))
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![4, 3]);
        assert!(backend.get(2).unwrap().is_some());
    }

    #[test]
    fn test_tie_on_timestamp_evicts_earlier_insert() {
        let backend = MemoryBackend::new();
        backend.insert_retaining(record(1, "alice", 5), 2).unwrap();
        backend.insert_retaining(record(2, "alice", 5), 2).unwrap();

        let evicted = backend.insert_retaining(record(3, "alice", 5), 2).unwrap();
        assert_eq!(evicted, vec![1]);
    }

    #[test]
    fn test_memory_delete() {
        let backend = MemoryBackend::new();
        backend.insert_retaining(record(1, "alice", 0), 5).unwrap();

        assert!(backend.delete(1).unwrap());
        assert!(!backend.delete(1).unwrap());
        assert!(backend.get(1).unwrap().is_none());
    }

    #[test]
    fn test_high_water_mark() {
        let backend = MemoryBackend::new();
        assert!(backend.high_water_mark().unwrap().is_none());

        backend.insert_retaining(record(3, "alice", 10), 5).unwrap();
        backend.insert_retaining(record(9, "bob", 20), 5).unwrap();

        let (id, at) = backend.high_water_mark().unwrap().unwrap();
        assert_eq!(id, 9);
        assert_eq!(at, record(9, "bob", 20).uploaded_at);
    }

    #[test]
    fn test_json_backend_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        {
            let backend = JsonFileBackend::open(&path).unwrap();
            backend.insert_retaining(record(1, "alice", 0), 2).unwrap();
            backend.insert_retaining(record(2, "alice", 1), 2).unwrap();
            backend.insert_retaining(record(3, "alice", 2), 2).unwrap();
        }

        let reopened = JsonFileBackend::open(&path).unwrap();
        let ids: Vec<_> = reopened
            .list_owner(&OwnerId::from("alice"))
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(reopened.high_water_mark().unwrap().map(|(id, _)| id), Some(3));
    }

    #[test]
    fn test_json_backend_reopen_keeps_float_bits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut stored = record(1, "alice", 0);
        stored.summary.avg_flowrate = 182.78745657865406;
        stored.summary.avg_pressure = 1093.3 / 10.0;
        stored.summary.avg_temperature = 0.1 + 0.2;

        JsonFileBackend::open(&path)
            .unwrap()
            .insert_retaining(stored.clone(), 5)
            .unwrap();

        let reloaded = JsonFileBackend::open(&path).unwrap().get(1).unwrap().unwrap();
        for (before, after) in [
            (stored.summary.avg_flowrate, reloaded.summary.avg_flowrate),
            (stored.summary.avg_pressure, reloaded.summary.avg_pressure),
            (stored.summary.avg_temperature, reloaded.summary.avg_temperature),
        ] {
            assert_eq!(before.to_bits(), after.to_bits());
        }
        assert_eq!(reloaded, stored);
    }

    #[test]
    fn test_json_backend_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/store.json");

        let backend = JsonFileBackend::open(&path).unwrap();
        backend.insert_retaining(record(1, "alice", 0), 5).unwrap();

        assert!(path.exists());
        assert_eq!(backend.path(), path.as_path());
    }

    #[test]
    fn test_json_backend_delete_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let backend = JsonFileBackend::open(&path).unwrap();
        backend.insert_retaining(record(1, "alice", 0), 5).unwrap();
        assert!(backend.delete(1).unwrap());
        assert!(!backend.delete(1).unwrap());

        let reopened = JsonFileBackend::open(&path).unwrap();
        assert!(reopened.get(1).unwrap().is_none());
    }

    #[test]
    fn test_json_backend_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileBackend::open(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }
}
