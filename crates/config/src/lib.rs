//! Layered configuration for assetsync.
//!
//! Values are read from built-in defaults, then a TOML file, then
//! `ASSETSYNC_`-prefixed environment variables; later sources win. Command
//! line flags are applied on top by the binary.

pub mod error;
mod load;
mod models;

pub use crate::load::{ENV_CONFIG_FILE, ENV_PREFIX, default_config_path};
pub use crate::models::{CacheConfig, Config, ProgressConfig, RemoteConfig, TargetConfig};
