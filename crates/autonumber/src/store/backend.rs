use std::sync::Arc;

use async_trait::async_trait;

use crate::SequenceKey;

/// Errors reported by a [`CounterBackend`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The write tried to create a counter row that another writer created
    /// first. The uniqueness constraint on the key tuple makes the race
    /// visible; [`crate::CounterStore`] recovers from it.
    #[error("Counter row already exists")]
    DuplicateKey,

    /// The counter already holds `u64::MAX` and cannot be advanced. The
    /// stored count is left unchanged.
    #[error("Counter is at its maximum value")]
    Exhausted,

    /// The backend could not be reached or rejected the request.
    #[error("Counter store unavailable: {context}")]
    Unavailable { context: String },
}

/// The durable counter table, keyed by [`SequenceKey`] with a uniqueness
/// constraint on the key tuple.
///
/// Every method is a single round-trip and each one must be atomic on its
/// own row (single-document atomic update). Backends do no retrying; race
/// recovery lives in [`crate::CounterStore`].
///
/// Implementations exist for process memory ([`crate::MemoryBackend`]);
/// durable stores implement the same five primitives.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Adds one to the counter, creating it at `1` if it does not exist, and
    /// returns the new count.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateKey`] when the row did not exist at the
    ///   backend's absence check but another writer inserted it before this
    ///   write.
    /// - [`StoreError::Exhausted`] when the count is already `u64::MAX`. The
    ///   row must not wrap around.
    async fn upsert_increment(&self, key: &SequenceKey) -> Result<u64, StoreError>;

    /// Adds one to an existing counter. Never creates a row; returns `None`
    /// if there is none.
    ///
    /// # Errors
    ///
    /// [`StoreError::Exhausted`] when the count is already `u64::MAX`.
    async fn increment_existing(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError>;

    /// Reads the counter without changing it.
    async fn find(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError>;

    /// Overwrites the counter, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] on the same creation race as
    /// [`Self::upsert_increment`].
    async fn upsert_set(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError>;

    /// Overwrites an existing counter. Returns `false` if there is none.
    async fn set_existing(&self, key: &SequenceKey, count: u64) -> Result<bool, StoreError>;
}

#[async_trait]
impl<B> CounterBackend for Arc<B>
where
    B: CounterBackend + ?Sized,
{
    async fn upsert_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        (**self).upsert_increment(key).await
    }

    async fn increment_existing(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        (**self).increment_existing(key).await
    }

    async fn find(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        (**self).find(key).await
    }

    async fn upsert_set(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError> {
        (**self).upsert_set(key, count).await
    }

    async fn set_existing(&self, key: &SequenceKey, count: u64) -> Result<bool, StoreError> {
        (**self).set_existing(key, count).await
    }
}
