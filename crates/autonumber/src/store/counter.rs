use crate::{CounterBackend, Error, Result, SequenceKey, StoreError};

/// Default number of recovery rounds before a creation race is declared
/// unresolvable.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Where an allocation (or an administrative set) stands.
///
/// ```text
/// Upsert ──conflict──▶ Update ──missing──▶ Upsert (next round) ... ──▶ Exhausted
///   │                    │
///   └──────ok────────────┴──▶ done
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// Create-or-write the row.
    Upsert { round: u32 },
    /// The upsert lost the creation race; write the now-existing row.
    Update { round: u32 },
}

/// Race-safe counters over a shared [`CounterBackend`].
///
/// There is no in-process locking: every caller, in this process or another,
/// is coordinated by the backend's per-row atomicity and the uniqueness
/// constraint on the key tuple. When two writers create the same counter at
/// once, the loser sees [`StoreError::DuplicateKey`] and retries against the
/// row the winner created, so both receive distinct values.
///
/// # Example
///
/// ```
/// use autonumber::{CounterStore, MemoryBackend, SequenceKey};
///
/// # futures::executor::block_on(async {
/// let store = CounterStore::new(MemoryBackend::new());
/// let key = SequenceKey::new("Order.number");
///
/// assert_eq!(store.allocate_next(&key).await?, 1);
/// assert_eq!(store.allocate_next(&key).await?, 2);
///
/// store.set_current(&key, 100).await?;
/// assert_eq!(store.allocate_next(&key).await?, 101);
/// # Ok::<_, autonumber::Error>(())
/// # }).unwrap();
/// ```
#[derive(Debug)]
pub struct CounterStore<B> {
    backend: B,
    max_retries: u32,
}

impl<B> CounterStore<B>
where
    B: CounterBackend,
{
    /// Creates a store that recovers from up to [`DEFAULT_MAX_RETRIES`]
    /// rounds of creation races.
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the number of recovery rounds. Values below `1` are raised to `1`,
    /// the minimum needed to survive a single creation race.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Atomically allocates the next value for `key`.
    ///
    /// The first allocation for a key returns `1`; each later one returns
    /// exactly one more than the last. No two callers ever observe the same
    /// value.
    ///
    /// # Errors
    ///
    /// - [`Error::Store`] if the backend fails, including
    ///   [`StoreError::Exhausted`] once the count has reached `u64::MAX`.
    /// - [`Error::RaceExhausted`] if every recovery round found the row
    ///   missing after a uniqueness conflict.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(key = %key)))]
    pub async fn allocate_next(&self, key: &SequenceKey) -> Result<u64> {
        let mut step = Step::Upsert { round: 1 };
        loop {
            step = match step {
                Step::Upsert { round } => match self.backend.upsert_increment(key).await {
                    Ok(count) => return Ok(count),
                    Err(StoreError::DuplicateKey) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(round, "Counter created concurrently, retrying as update");
                        Step::Update { round }
                    }
                    Err(e) => return Err(e.into()),
                },
                Step::Update { round } => match self.backend.increment_existing(key).await? {
                    Some(count) => return Ok(count),
                    None => self.next_round(key, round)?,
                },
            };
        }
    }

    /// Returns the current count for `key`, or `0` if nothing was ever
    /// allocated for it.
    ///
    /// # Errors
    ///
    /// [`Error::Store`] if the backend fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(key = %key)))]
    pub async fn get_current(&self, key: &SequenceKey) -> Result<u64> {
        Ok(self.backend.find(key).await?.unwrap_or(0))
    }

    /// Overwrites the count for `key`, creating the counter if needed.
    ///
    /// The next [`Self::allocate_next`] returns `count + 1`. Uses the same
    /// conflict recovery as allocation, so a set racing a first allocation
    /// never violates the one-row-per-key invariant.
    ///
    /// # Errors
    ///
    /// Same as [`Self::allocate_next`].
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(key = %key, count = count)))]
    pub async fn set_current(&self, key: &SequenceKey, count: u64) -> Result<()> {
        let mut step = Step::Upsert { round: 1 };
        loop {
            step = match step {
                Step::Upsert { round } => match self.backend.upsert_set(key, count).await {
                    Ok(()) => return Ok(()),
                    Err(StoreError::DuplicateKey) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(round, "Counter created concurrently, retrying as update");
                        Step::Update { round }
                    }
                    Err(e) => return Err(e.into()),
                },
                Step::Update { round } => {
                    if self.backend.set_existing(key, count).await? {
                        return Ok(());
                    }
                    self.next_round(key, round)?
                }
            };
        }
    }

    /// A conflict was reported but the row is not there. Start another round,
    /// or give up once the bound is reached.
    fn next_round(&self, key: &SequenceKey, round: u32) -> Result<Step> {
        if round < self.max_retries {
            #[cfg(feature = "tracing")]
            tracing::debug!(round, "Conflicting counter row vanished, starting a new round");
            return Ok(Step::Upsert { round: round + 1 });
        }

        #[cfg(feature = "tracing")]
        tracing::error!(
            key = %key,
            attempts = round,
            "Counter race not resolved; the backend reports duplicates it cannot find"
        );
        Err(Error::RaceExhausted {
            key: key.clone(),
            attempts: round,
        })
    }
}
