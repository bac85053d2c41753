use assetsync_config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(long, short, global = true, env = "ASSETSYNC_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bring the target directory up to date with the server's bundle.
    Sync(SyncArgs),
    /// Show the cached and remote bundle versions.
    Status(OverrideArgs),
    /// Forget the cached bundle so the next sync downloads it again.
    Clear(OverrideArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,
    /// Target directory to unpack into.
    #[arg(long)]
    pub target: Option<PathBuf>,
    /// Subdirectory of the target that receives the bundle contents.
    #[arg(long)]
    pub mount: Option<String>,
    /// Print progress events as JSON lines on stdout instead of drawing bars.
    #[arg(long)]
    pub json: bool,
}

/// Flags shared by every command, applied on top of the loaded configuration.
#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    #[arg(long)]
    pub bundle_url: Option<String>,
    #[arg(long)]
    pub version_url: Option<String>,
    /// Cache database file.
    #[arg(long, conflicts_with = "no_cache")]
    pub cache: Option<PathBuf>,
    /// Run without the local cache.
    #[arg(long)]
    pub no_cache: bool,
}

impl OverrideArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.bundle_url {
            config.remote.bundle_url = url.clone();
        }
        if let Some(url) = &self.version_url {
            config.remote.version_url = Some(url.clone());
        }
        if let Some(path) = &self.cache {
            config.cache.path = Some(path.clone());
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

impl SyncArgs {
    pub fn apply(&self, config: &mut Config) {
        self.overrides.apply(config);
        if let Some(target) = &self.target {
            config.target.root = Some(target.clone());
        }
        if let Some(mount) = &self.mount {
            config.target.mount = mount.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("assetsync").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_sync_overrides() {
        let cli = parse(&["sync", "--bundle-url", "https://cdn.test/b.zip", "--target", "/srv/game", "--mount", "data"]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.remote.bundle_url, "https://cdn.test/b.zip");
        assert_eq!(config.target.root, Some(PathBuf::from("/srv/game")));
        assert_eq!(config.target.mount, "data");
        assert!(config.cache.enabled);
    }

    #[rstest]
    #[case(&["status", "--no-cache"], false)]
    #[case(&["status"], true)]
    #[case(&["clear", "--cache", "/tmp/c.sqlite"], true)]
    fn test_cache_flags(#[case] args: &[&str], #[case] enabled: bool) {
        let cli = parse(args);
        let overrides = match cli.command {
            Command::Status(overrides) | Command::Clear(overrides) => overrides,
            Command::Sync(args) => args.overrides,
        };
        let mut config = Config::default();
        overrides.apply(&mut config);
        assert_eq!(config.cache.enabled, enabled);
    }

    #[test]
    fn test_conflicting_cache_flags() {
        let result = Cli::try_parse_from(["assetsync", "sync", "--cache", "c.sqlite", "--no-cache"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = parse(&["status", "--config", "/etc/assetsync.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/assetsync.toml")));
    }
}
