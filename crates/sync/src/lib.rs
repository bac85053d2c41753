//! Keeping a local copy of the game bundle in step with the server.
//!
//! [`SyncOrchestrator`] is the entry point. It decides between replaying the
//! cached generation ([`CacheRestorer`]) and downloading the bundle again,
//! and only ever replaces the cache with a generation that was unpacked
//! completely.

mod decision;
pub mod error;
mod orchestrator;
mod restore;
#[cfg(test)]
mod testing;

pub use crate::decision::{Mode, decide};
pub use crate::orchestrator::{SyncOptions, SyncOrchestrator, SyncReport, SyncState};
pub use crate::restore::{CacheRestorer, Written};
