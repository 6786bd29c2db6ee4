//! Gap-free autonumbers for newly created records.
//!
//! Each autonumbered field draws from a sequence addressed by a
//! [`SequenceKey`]: a numerator, optionally partitioned by a group value and
//! restarted every period. [`CounterStore`] allocates from a shared
//! [`CounterBackend`] and recovers from concurrent creation of the same
//! counter; [`Autonumber`] runs the whole pipeline as a before-create hook.
//!
//! ## Feature Flags
//!
//! - `tracing`: Emits spans and events for allocation and race recovery.

mod clock;
mod config;
mod error;
mod field;
mod format;
mod key;
mod orchestrator;
mod period;
mod record;
mod selector;
mod store;

pub use crate::clock::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::field::*;
pub use crate::format::*;
pub use crate::key::*;
pub use crate::orchestrator::*;
pub use crate::period::*;
pub use crate::record::*;
pub use crate::selector::*;
pub use crate::store::*;
