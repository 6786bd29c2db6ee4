use crate::{CounterBackend, CounterStore, Error, MemoryBackend, SequenceKey, StoreError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet, hash_map::Entry};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Barrier;

/// Holds every first-time writer between its absence check and its insert
/// until `parties` writers have checked, so they all race the insert.
struct RacingBackend {
    rows: Mutex<HashMap<SequenceKey, u64>>,
    barrier: Barrier,
    conflicts: AtomicUsize,
}

impl RacingBackend {
    fn new(parties: usize) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            barrier: Barrier::new(parties),
            conflicts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CounterBackend for RacingBackend {
    async fn upsert_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        {
            let mut rows = self.rows.lock().unwrap();
            if let Some(count) = rows.get_mut(key) {
                *count += 1;
                return Ok(*count);
            }
        }
        self.barrier.wait().await;
        match self.rows.lock().unwrap().entry(key.clone()) {
            Entry::Occupied(_) => {
                self.conflicts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::DuplicateKey)
            }
            Entry::Vacant(slot) => Ok(*slot.insert(1)),
        }
    }

    async fn increment_existing(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        Ok(self.rows.lock().unwrap().get_mut(key).map(|count| {
            *count += 1;
            *count
        }))
    }

    async fn find(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        Ok(self.rows.lock().unwrap().get(key).copied())
    }

    async fn upsert_set(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError> {
        self.rows.lock().unwrap().insert(key.clone(), count);
        Ok(())
    }

    async fn set_existing(&self, key: &SequenceKey, count: u64) -> Result<bool, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get_mut(key)
            .map(|row| *row = count)
            .is_some())
    }
}

/// Reports a duplicate on every create but never has the row.
#[derive(Default)]
struct PhantomRowBackend {
    upserts: AtomicUsize,
}

#[async_trait]
impl CounterBackend for PhantomRowBackend {
    async fn upsert_increment(&self, _: &SequenceKey) -> Result<u64, StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::DuplicateKey)
    }

    async fn increment_existing(&self, _: &SequenceKey) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }

    async fn find(&self, _: &SequenceKey) -> Result<Option<u64>, StoreError> {
        Ok(None)
    }

    async fn upsert_set(&self, _: &SequenceKey, _: u64) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::DuplicateKey)
    }

    async fn set_existing(&self, _: &SequenceKey, _: u64) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Fails every call as if the network were down.
#[derive(Default)]
struct OfflineBackend {
    calls: AtomicUsize,
}

impl OfflineBackend {
    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable {
            context: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl CounterBackend for OfflineBackend {
    async fn upsert_increment(&self, _: &SequenceKey) -> Result<u64, StoreError> {
        self.fail()
    }

    async fn increment_existing(&self, _: &SequenceKey) -> Result<Option<u64>, StoreError> {
        self.fail()
    }

    async fn find(&self, _: &SequenceKey) -> Result<Option<u64>, StoreError> {
        self.fail()
    }

    async fn upsert_set(&self, _: &SequenceKey, _: u64) -> Result<(), StoreError> {
        self.fail()
    }

    async fn set_existing(&self, _: &SequenceKey, _: u64) -> Result<bool, StoreError> {
        self.fail()
    }
}

/// Simulates an allocation that creates the row while a manual set is in
/// flight: the first `upsert_set` loses the creation race.
struct SetRacesAllocation {
    inner: MemoryBackend,
    raced: AtomicUsize,
}

#[async_trait]
impl CounterBackend for SetRacesAllocation {
    async fn upsert_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        self.inner.upsert_increment(key).await
    }

    async fn increment_existing(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        self.inner.increment_existing(key).await
    }

    async fn find(&self, key: &SequenceKey) -> Result<Option<u64>, StoreError> {
        self.inner.find(key).await
    }

    async fn upsert_set(&self, key: &SequenceKey, count: u64) -> Result<(), StoreError> {
        if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.upsert_increment(key).await?;
            return Err(StoreError::DuplicateKey);
        }
        self.inner.upsert_set(key, count).await
    }

    async fn set_existing(&self, key: &SequenceKey, count: u64) -> Result<bool, StoreError> {
        self.inner.set_existing(key, count).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_allocations_are_exactly_one_to_n() {
    const CALLERS: u64 = 256;

    let store = Arc::new(CounterStore::new(MemoryBackend::new()));
    let key = SequenceKey::new("Order.number");

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move { store.allocate_next(&key).await })
        })
        .collect();

    let mut seen = Vec::with_capacity(CALLERS as usize);
    for handle in handles {
        seen.push(handle.await.unwrap().unwrap());
    }
    seen.sort_unstable();

    assert_eq!(seen, (1..=CALLERS).collect::<Vec<_>>());
    assert_eq!(store.get_current(&key).await.unwrap(), CALLERS);
    assert_eq!(store.backend().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_allocations_across_many_keys() {
    const KEYS: usize = 32;
    const PER_KEY: usize = 16;

    let store = Arc::new(CounterStore::new(MemoryBackend::new()));
    let handles: Vec<_> = (0..KEYS * PER_KEY)
        .map(|i| {
            let store = Arc::clone(&store);
            let key = SequenceKey::new("invoice").with_group(json!(i % KEYS));
            tokio::spawn(async move { (i % KEYS, store.allocate_next(&key).await.unwrap()) })
        })
        .collect();

    let mut per_key: HashMap<usize, HashSet<u64>> = HashMap::new();
    for handle in handles {
        let (group, count) = handle.await.unwrap();
        assert!(per_key.entry(group).or_default().insert(count));
    }

    let expected: HashSet<u64> = (1..=PER_KEY as u64).collect();
    assert_eq!(per_key.len(), KEYS);
    assert!(per_key.values().all(|counts| *counts == expected));
}

#[tokio::test]
async fn distinct_keys_do_not_interfere() {
    let store = CounterStore::new(MemoryBackend::new());
    let plain = SequenceKey::new("order.number");
    let grouped = SequenceKey::new("order.number").with_group(json!("customer1"));
    let other = SequenceKey::new("invoice.number");

    assert_eq!(store.allocate_next(&plain).await.unwrap(), 1);
    assert_eq!(store.allocate_next(&plain).await.unwrap(), 2);
    assert_eq!(store.allocate_next(&grouped).await.unwrap(), 1);
    assert_eq!(store.allocate_next(&other).await.unwrap(), 1);
    assert_eq!(store.allocate_next(&plain).await.unwrap(), 3);
    assert_eq!(store.get_current(&grouped).await.unwrap(), 1);
}

#[tokio::test]
async fn racing_first_allocations_both_succeed() {
    let store = CounterStore::new(RacingBackend::new(2));
    let key = SequenceKey::new("order.number");

    let (a, b) = tokio::join!(store.allocate_next(&key), store.allocate_next(&key));
    let mut got = [a.unwrap(), b.unwrap()];
    got.sort_unstable();

    assert_eq!(got, [1, 2]);
    assert_eq!(store.backend().conflicts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn many_racing_first_allocations_recover() {
    const PARTIES: usize = 8;

    let store = CounterStore::new(RacingBackend::new(PARTIES)).with_max_retries(1);
    let key = SequenceKey::new("order.number");

    let results =
        futures::future::join_all((0..PARTIES).map(|_| store.allocate_next(&key))).await;
    let mut got: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
    got.sort_unstable();

    assert_eq!(got, (1..=PARTIES as u64).collect::<Vec<_>>());
    assert_eq!(
        store.backend().conflicts.load(Ordering::SeqCst),
        PARTIES - 1
    );
}

#[tokio::test]
async fn phantom_conflicts_exhaust_the_retry_bound() {
    let store = CounterStore::new(PhantomRowBackend::default()).with_max_retries(2);
    let key = SequenceKey::new("order.number");

    let err = store.allocate_next(&key).await.unwrap_err();
    match err {
        Error::RaceExhausted { key: failed, attempts } => {
            assert_eq!(failed, key);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected RaceExhausted, got {other:?}"),
    }
    assert_eq!(store.backend().upserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn default_bound_and_minimum_bound() {
    let store = CounterStore::new(PhantomRowBackend::default());
    assert_eq!(store.max_retries(), super::DEFAULT_MAX_RETRIES);
    assert!(matches!(
        store.set_current(&SequenceKey::new("n"), 5).await,
        Err(Error::RaceExhausted { attempts: 3, .. })
    ));

    let store = CounterStore::new(PhantomRowBackend::default()).with_max_retries(0);
    assert_eq!(store.max_retries(), 1);
    assert!(matches!(
        store.allocate_next(&SequenceKey::new("n")).await,
        Err(Error::RaceExhausted { attempts: 1, .. })
    ));
}

#[tokio::test]
async fn transient_errors_pass_through_without_retry() {
    let store = CounterStore::new(OfflineBackend::default());
    let key = SequenceKey::new("order.number");

    let err = store.allocate_next(&key).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Store(StoreError::Unavailable { .. })
    ));
    assert_eq!(store.backend().calls.load(Ordering::SeqCst), 1);

    assert!(matches!(
        store.get_current(&key).await,
        Err(Error::Store(_))
    ));
}

#[tokio::test]
async fn override_then_allocate_continues_from_override() {
    let store = CounterStore::new(MemoryBackend::new());
    let key = SequenceKey::new("order.number");

    assert_eq!(store.get_current(&key).await.unwrap(), 0);
    store.set_current(&key, 100).await.unwrap();
    assert_eq!(store.get_current(&key).await.unwrap(), 100);
    assert_eq!(store.allocate_next(&key).await.unwrap(), 101);

    store.set_current(&key, 7).await.unwrap();
    assert_eq!(store.allocate_next(&key).await.unwrap(), 8);
}

#[tokio::test]
async fn override_recovers_from_creation_race() {
    let store = CounterStore::new(SetRacesAllocation {
        inner: MemoryBackend::new(),
        raced: AtomicUsize::new(0),
    });
    let key = SequenceKey::new("order.number");

    store.set_current(&key, 100).await.unwrap();
    assert_eq!(store.allocate_next(&key).await.unwrap(), 101);
    assert_eq!(store.backend().inner.len(), 1);
}

#[tokio::test]
async fn allocation_at_the_maximum_fails_without_wrapping() {
    let store = CounterStore::new(MemoryBackend::new());
    let key = SequenceKey::new("order.number");

    store.set_current(&key, u64::MAX - 1).await.unwrap();
    assert_eq!(store.allocate_next(&key).await.unwrap(), u64::MAX);

    for _ in 0..2 {
        assert!(matches!(
            store.allocate_next(&key).await,
            Err(Error::Store(StoreError::Exhausted))
        ));
        assert_eq!(store.get_current(&key).await.unwrap(), u64::MAX);
    }

    store.set_current(&key, 41).await.unwrap();
    assert_eq!(store.allocate_next(&key).await.unwrap(), 42);
}

#[tokio::test]
async fn exhausted_row_does_not_trigger_race_recovery() {
    let store = CounterStore::new(MemoryBackend::new());
    let key = SequenceKey::new("order.number").with_group(json!("north"));
    store.set_current(&key, u64::MAX).await.unwrap();

    let results = futures::future::join_all((0..4).map(|_| store.allocate_next(&key))).await;
    assert!(
        results
            .iter()
            .all(|r| matches!(r, Err(Error::Store(StoreError::Exhausted))))
    );
    assert_eq!(store.backend().len(), 1);
}
