use crate::{SequenceKey, StoreError};

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Boxed error returned by user-supplied selector functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors `autonumber` can surface.
///
/// None of these are swallowed: every variant aborts the record-creation event
/// that produced it, so a record is either fully numbered or never persisted.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A field declaration is invalid (unsupported value type, unknown period
    /// granularity, zero length, ...).
    ///
    /// Raised while registering entities, never while numbering a record.
    #[error("Invalid autonumber configuration: {reason}")]
    Config { reason: String },

    /// A selector could not be resolved against a record.
    #[error("Failed to resolve `{selector}`: {source}")]
    Selector {
        selector: String,
        #[source]
        source: BoxError,
    },

    /// The counter backend failed. Passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The uniqueness conflict persisted through every recovery round.
    ///
    /// This points at an inconsistent backend (a row that is reported as
    /// duplicate yet cannot be found) and is kept distinct from [`Self::Store`]
    /// so operators can alert on it.
    #[error("Counter race not resolved for {key} after {attempts} attempts")]
    RaceExhausted { key: SequenceKey, attempts: u32 },
}

impl Error {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn selector(selector: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Selector {
            selector: selector.into(),
            source: source.into(),
        }
    }
}
