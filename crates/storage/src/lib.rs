//! The target filesystem a bundle is unpacked into.
//!
//! The game engine owns the real filesystem (an in-memory POSIX-like tree in
//! the browser build, a plain directory elsewhere). This crate only describes
//! the three things the sync pipeline needs from it (`mkdir_tree`,
//! `write_file`, `chdir`) plus a couple of read-backs, and provides a local
//! directory implementation.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::TargetFs;
pub use crate::path::{parent_of, validate as validate_path};
use std::sync::Arc;

pub type TargetHandle = Arc<dyn TargetFs + Send + Sync>;
