use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use portable_atomic::{AtomicU64, Ordering};

use crate::{CounterBackend, SequenceKey, StoreError};

/// A [`CounterBackend`] held in process memory.
///
/// Rows live in a map guarded by a read-write lock; each row's count is an
/// [`AtomicU64`], so increments and overwrites of an existing row only take
/// the shared lock. Creating a row behaves like an insert against a unique
/// index: the absence check and the insert are separate steps, and a writer
/// that finds the row already created by someone else in between gets
/// [`StoreError::DuplicateKey`]. Increments never wrap: a row at `u64::MAX`
/// reports [`StoreError::Exhausted`].
///
/// Counters are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RwLock<HashMap<SequenceKey, Arc<AtomicU64>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counter rows created so far.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn row(&self, key: &SequenceKey) -> Option<Arc<AtomicU64>> {
        self.rows.read().get(key).cloned()
    }

    fn increment(row: &AtomicU64) -> Result<u64, StoreError> {
        row.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| StoreError::Exhausted)
    }

    fn insert(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError> {
        match self.rows.write().entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(AtomicU64::new(count)));
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CounterBackend for MemoryBackend {
    async fn upsert_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        if let Some(row) = self.row(key) {
            return Self::increment(&row);
        }
        self.insert(key, 1).map(|()| 1)
    }

    async fn increment_existing(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        self.row(key).map(|row| Self::increment(&row)).transpose()
    }

    async fn find(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        Ok(self.row(key).map(|row| row.load(Ordering::Acquire)))
    }

    async fn upsert_set(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError> {
        if let Some(row) = self.row(key) {
            row.store(count, Ordering::Release);
            return Ok(());
        }
        self.insert(key, count)
    }

    async fn set_existing(&self, key: &SequenceKey, count: u64) -> Result<bool, StoreError> {
        Ok(self
            .row(key)
            .map(|row| row.store(count, Ordering::Release))
            .is_some())
    }
}
