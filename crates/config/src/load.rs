use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::path::{Component, Path, PathBuf};

/// Prefix of environment variables overriding configuration values. Nested
/// keys are separated by a double underscore, for example
/// `ASSETSYNC_CACHE__ENABLED=false`.
pub const ENV_PREFIX: &str = "ASSETSYNC_";
/// Variable naming the configuration file itself; not a configuration key.
pub const ENV_CONFIG_FILE: &str = "ASSETSYNC_CONFIG";
const CONFIG_FILE: &str = "assetsync.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "assetsync")
}

/// Default location of the configuration file, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Config {
    /// Load configuration from defaults, then a TOML file, then environment
    /// variables, and validate the result.
    ///
    /// A missing file is not an error: `path` (or the default config path
    /// when `None`) is simply skipped.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "reading configuration file");
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.remote.bundle_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            exn::bail!(ErrorKind::invalid("remote.bundle_url", "must be an http(s) URL"));
        }
        if let Some(version_url) = &self.remote.version_url
            && !(version_url.starts_with("http://") || version_url.starts_with("https://"))
        {
            exn::bail!(ErrorKind::invalid("remote.version_url", "must be an http(s) URL"));
        }
        let mount = Path::new(&self.target.mount);
        if self.target.mount.is_empty() || !mount.components().all(|c| matches!(c, Component::Normal(_))) {
            exn::bail!(ErrorKind::invalid("target.mount", "must be a relative path without `.` or `..`"));
        }
        if self.progress.capacity == 0 {
            exn::bail!(ErrorKind::invalid("progress.capacity", "must be greater than zero"));
        }
        Ok(())
    }

    /// Database file to cache bundles in, or `None` when caching is disabled
    /// or no location can be determined.
    pub fn cache_path(&self) -> Option<PathBuf> {
        if !self.cache.enabled {
            return None;
        }
        self.cache.path.clone().or_else(|| project_dirs().map(|dirs| dirs.data_dir().join("cache.sqlite")))
    }

    /// Root of the target filesystem.
    pub fn target_root(&self) -> Result<PathBuf> {
        match &self.target.root {
            Some(root) => Ok(root.clone()),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().join("target"))
                .ok_or_raise(|| ErrorKind::NoDirectories),
        }
    }
}
