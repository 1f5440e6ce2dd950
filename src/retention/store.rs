//! Bounded per-owner retention of dataset records.
//!
//! Each owner keeps at most `capacity` records. Inserting a record and
//! evicting whatever falls past the limit happen under the owner's lock and
//! inside a single backend call, so no reader ever sees more than `capacity`
//! records and the record just inserted is never the one evicted.

use crate::error::{EquipError, EquipResult};
use crate::models::{DatasetId, DatasetRecord, NewDataset, OwnerId};
use crate::retention::backend::DatasetBackend;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Default number of datasets retained per owner.
pub const DEFAULT_CAPACITY: usize = 5;

/// Source of upload timestamps.
pub type NowFn = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Id and timestamp allocator. Both only move forward.
#[derive(Debug, Default)]
struct StoreClock {
    last_id: DatasetId,
    last_uploaded_at: Option<DateTime<Utc>>,
}

/// Per-owner bounded store in front of a [`DatasetBackend`].
pub struct RetentionStore<B> {
    backend: B,
    capacity: usize,
    owner_locks: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
    clock: Mutex<StoreClock>,
    now: NowFn,
}

impl<B: DatasetBackend> RetentionStore<B> {
    /// Create a store over `backend`. A zero capacity is raised to one.
    pub fn new(backend: B, capacity: usize) -> EquipResult<Self> {
        Self::with_clock(backend, capacity, Box::new(Utc::now))
    }

    /// Create a store with an explicit timestamp source.
    pub fn with_clock(backend: B, capacity: usize, now: NowFn) -> EquipResult<Self> {
        let clock = match backend.high_water_mark()? {
            Some((last_id, last_uploaded_at)) => StoreClock {
                last_id,
                last_uploaded_at: Some(last_uploaded_at),
            },
            None => StoreClock::default(),
        };
        debug!("Retention store resuming after id {}", clock.last_id);

        Ok(Self {
            backend,
            capacity: capacity.max(1),
            owner_locks: Mutex::new(HashMap::new()),
            clock: Mutex::new(clock),
            now,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn owner_lock(&self, owner: &OwnerId) -> Arc<Mutex<()>> {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(owner.clone()).or_default())
    }

    /// Run `f` while holding `owner`'s lock. The map entry is dropped again
    /// once no other caller holds that lock.
    fn with_owner_lock<T>(&self, owner: &OwnerId, f: impl FnOnce() -> T) -> T {
        let lock = self.owner_lock(owner);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones are only handed out under the map lock, so a count of two
        // (map + ours) means nobody else is waiting on this owner.
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks.get(owner).is_some_and(|l| Arc::ptr_eq(l, &lock)) && Arc::strong_count(&lock) == 2
        {
            locks.remove(owner);
        }

        outcome
    }

    #[cfg(test)]
    fn tracked_owners(&self) -> usize {
        self.owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Allocate the next id and a timestamp no earlier than any previous one.
    fn next_stamp(&self) -> (DatasetId, DateTime<Utc>) {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = (self.now)();
        let uploaded_at = match clock.last_uploaded_at {
            Some(last) if last > now => last,
            _ => now,
        };

        clock.last_id += 1;
        clock.last_uploaded_at = Some(uploaded_at);
        (clock.last_id, uploaded_at)
    }

    /// Store `dataset` for `owner` and evict anything past the capacity.
    pub fn insert(&self, owner: &OwnerId, dataset: NewDataset) -> EquipResult<DatasetRecord> {
        self.with_owner_lock(owner, || self.insert_locked(owner, dataset))
    }

    fn insert_locked(&self, owner: &OwnerId, dataset: NewDataset) -> EquipResult<DatasetRecord> {
        let (id, uploaded_at) = self.next_stamp();
        let record = DatasetRecord {
            id,
            owner_id: owner.clone(),
            filename: dataset.filename,
            uploaded_at,
            summary: dataset.summary,
            rows: dataset.rows,
        };

        let evicted = self
            .backend
            .insert_retaining(record.clone(), self.capacity)?;

        info!("Stored dataset {} for {} ({})", id, owner, record.filename);
        if !evicted.is_empty() {
            info!(
                "Evicted {} dataset(s) for {}: {:?}",
                evicted.len(),
                owner,
                evicted
            );
        }

        Ok(record)
    }

    /// Up to `capacity` records for `owner`, newest first.
    pub fn list(&self, owner: &OwnerId) -> EquipResult<Vec<DatasetRecord>> {
        self.with_owner_lock(owner, || {
            let mut records = self.backend.list_owner(owner)?;
            records.truncate(self.capacity);
            Ok(records)
        })
    }

    /// Fetch one retained record. Foreign, evicted and unknown ids are all `NotFound`.
    pub fn get(&self, owner: &OwnerId, id: DatasetId) -> EquipResult<DatasetRecord> {
        self.backend
            .get(id)?
            .filter(|record| &record.owner_id == owner)
            .ok_or(EquipError::NotFound { id })
    }

    /// Explicitly remove a retained record.
    pub fn delete(&self, owner: &OwnerId, id: DatasetId) -> EquipResult<()> {
        self.with_owner_lock(owner, || {
            self.get(owner, id)?;
            if !self.backend.delete(id)? {
                return Err(EquipError::NotFound { id });
            }

            info!("Deleted dataset {} for {}", id, owner);
            Ok(())
        })
    }
}
