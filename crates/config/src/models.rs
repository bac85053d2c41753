use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
///
/// Every section falls back to its defaults, so an empty file (or no file at
/// all) is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub target: TargetConfig,
    pub progress: ProgressConfig,
}

/// Where the bundle lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// URL of the bundle archive.
    pub bundle_url: String,
    /// Optional sidecar text file holding the bundle version, consulted when
    /// the bundle carries no `ETag`/`Last-Modified`.
    pub version_url: Option<String>,
    /// Seconds allowed for establishing a connection. The transfer itself is
    /// not time-limited.
    pub connect_timeout_secs: Option<u64>,
}
impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bundle_url: "http://localhost:8080/valve.zip".to_string(),
            version_url: Some("http://localhost:8080/valve.version".to_string()),
            connect_timeout_secs: Some(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// When `false` the bundle is downloaded on every sync.
    pub enabled: bool,
    /// SQLite database file. Defaults to `cache.sqlite` in the user's data
    /// directory.
    pub path: Option<PathBuf>,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Root of the target filesystem. Defaults to `target/` in the user's
    /// data directory.
    pub root: Option<PathBuf>,
    /// Directory under the root that receives the bundle contents.
    pub mount: String,
}
impl Default for TargetConfig {
    fn default() -> Self {
        Self { root: None, mount: "rodir".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    /// Events buffered per subscriber on other tasks before the slowest
    /// starts missing some.
    pub capacity: usize,
}
impl Default for ProgressConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}
