use chrono::{Local, NaiveDateTime};

/// A source of the current local wall-clock time.
///
/// Used when a field buckets by period but has no `date` selector. Plug in
/// [`FixedClock`] (or your own implementation) to make period resolution
/// deterministic in tests.
///
/// # Example
///
/// ```
/// use autonumber::Clock;
/// use chrono::NaiveDateTime;
///
/// struct Epoch;
/// impl Clock for Epoch {
///     fn now(&self) -> NaiveDateTime {
///         NaiveDateTime::UNIX_EPOCH
///     }
/// }
///
/// assert_eq!(Epoch.now(), NaiveDateTime::UNIX_EPOCH);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time as local calendar fields.
    fn now(&self) -> NaiveDateTime;
}

/// The system clock, read in the process's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a single instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
