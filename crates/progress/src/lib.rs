//! Progress reporting for bundle synchronisation.
//!
//! Every stage of a sync (download, unpack, cache restore) reports through a
//! [`ProgressBus`] that is constructed by the caller and handed to whichever
//! components need it. The bus knows nothing about its consumers: there may
//! be a progress bar, a diagnostics log, both, or nobody at all.

mod bus;
mod event;

pub use crate::bus::{DEFAULT_CAPACITY, Listener, ProgressBus, Subscription};
pub use crate::event::ProgressEvent;
