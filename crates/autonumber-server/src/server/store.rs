use async_trait::async_trait;
use autonumber::{CounterBackend, MemoryBackend, SequenceKey, StoreError};

use crate::server::telemetry::{increment_conflicts, increment_errors};

/// The backend the server runs on.
pub type Backend = MeteredBackend<MemoryBackend>;

/// Counts creation races and backend failures on the way through to `B`.
pub struct MeteredBackend<B> {
    inner: B,
}

impl<B> MeteredBackend<B> {
    pub const fn new(inner: B) -> Self {
        Self { inner }
    }
}

fn observe<T>(result: Result<T, StoreError>) -> Result<T, StoreError> {
    match &result {
        Err(StoreError::DuplicateKey) => {
            tracing::debug!("Counter row created concurrently");
            increment_conflicts();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Counter store call failed");
            increment_errors();
        }
        Ok(_) => {}
    }
    result
}

#[async_trait]
impl<B> CounterBackend for MeteredBackend<B>
where
    B: CounterBackend,
{
    async fn upsert_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        observe(self.inner.upsert_increment(key).await)
    }

    async fn increment_existing(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        observe(self.inner.increment_existing(key).await)
    }

    async fn find(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        observe(self.inner.find(key).await)
    }

    async fn upsert_set(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError> {
        observe(self.inner.upsert_set(key, count).await)
    }

    async fn set_existing(&self, key: &SequenceKey, count: u64) -> Result<bool, StoreError> {
        observe(self.inner.set_existing(key, count).await)
    }
}
