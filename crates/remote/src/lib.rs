//! Talking to the server that hosts the bundle.
//!
//! Two jobs: finding out which version of the bundle the server currently
//! has ([`VersionResolver`]), and downloading it while reporting progress
//! ([`DownloadPipeline`]). Both go through the [`Remote`] transport trait;
//! [`HttpRemote`] is the production implementation.

pub mod error;
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod pipeline;
mod resolver;
mod transport;

pub use crate::http::HttpRemote;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockMethod, MockRemote, MockTail};
pub use crate::pipeline::DownloadPipeline;
pub use crate::resolver::{Validator, VersionResolver};
pub use crate::transport::{Body, ByteStream, Probe, Remote, Response};
use std::sync::Arc;

pub type RemoteHandle = Arc<dyn Remote + Send + Sync>;
