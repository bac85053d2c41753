mod cli;
mod error;
mod render;

use crate::cli::{Cli, Command, SyncArgs};
use crate::error::{ErrorKind, Result};
use assetsync_cache::{StoreHandle, TOTAL_BYTES, VERSION_TAG};
use assetsync_config::Config;
use assetsync_progress::ProgressBus;
use assetsync_remote::{HttpRemote, RemoteHandle, VersionResolver};
use assetsync_storage::backend::LocalFs;
use assetsync_sync::{SyncOptions, SyncOrchestrator};
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Sync(args) => {
            args.apply(&mut config);
            config.validate().or_raise(|| ErrorKind::Config)?;
            sync(&config, &args).await
        },
        Command::Status(overrides) => {
            overrides.apply(&mut config);
            config.validate().or_raise(|| ErrorKind::Config)?;
            status(&config).await
        },
        Command::Clear(overrides) => {
            overrides.apply(&mut config);
            config.validate().or_raise(|| ErrorKind::Config)?;
            clear(&config).await
        },
    }
}

fn remote(config: &Config) -> Result<RemoteHandle> {
    let timeout = config.remote.connect_timeout_secs.map(Duration::from_secs);
    let remote = HttpRemote::new(timeout).or_raise(|| ErrorKind::Remote)?;
    Ok(Arc::new(remote))
}

async fn store(config: &Config) -> StoreHandle {
    assetsync_cache::open(config.cache_path().as_deref()).await
}

async fn sync(config: &Config, args: &SyncArgs) -> Result<()> {
    let root = config.target_root().or_raise(|| ErrorKind::Target)?;
    let root = std::path::absolute(&root).or_raise(|| ErrorKind::Target)?;
    let target = LocalFs::new("target", &root).or_raise(|| ErrorKind::Target)?;
    let bus = ProgressBus::new(config.progress.capacity);
    let renderer = tokio::spawn(render::drain(bus.receiver(), args.json));

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; aborting download");
            interrupt.cancel();
        }
    });

    let mut options = SyncOptions::new(&config.remote.bundle_url).with_mount(&config.target.mount);
    if let Some(url) = &config.remote.version_url {
        options = options.with_version_url(url);
    }
    let mut orchestrator =
        SyncOrchestrator::new(options, remote(config)?, store(config).await, bus).with_cancellation(token);
    let result = orchestrator.sync(&target).await;

    // The renderer finishes once the last publisher is gone.
    drop(orchestrator);
    let _ = renderer.await;

    let report = result.or_raise(|| ErrorKind::Sync)?;
    if let Some(warning) = &report.warning {
        eprintln!("warning: {warning}");
    }
    if !args.json {
        let version = report.validator.as_ref().map_or_else(|| "unknown".to_string(), ToString::to_string);
        eprintln!(
            "{} {} files ({} bytes) into {} [version {version}]",
            match report.mode {
                assetsync_sync::Mode::Restore => "Restored",
                assetsync_sync::Mode::Download => "Downloaded",
            },
            report.files,
            report.bytes,
            root.join(&config.target.mount).display(),
        );
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let store = store(config).await;
    let resolver = VersionResolver::new(remote(config)?, &config.remote.bundle_url, config.remote.version_url.clone());
    let remote_version = resolver.resolve().await;

    println!("bundle:         {}", config.remote.bundle_url);
    println!("remote version: {}", remote_version.as_ref().map_or("unknown", |v| v.as_str()));
    if !store.is_available() {
        println!("cache:          unavailable");
        return Ok(());
    }
    if let Some(path) = config.cache_path() {
        println!("cache:          {}", path.display());
    }
    let local = store.version_tag().await.or_raise(|| ErrorKind::Cache)?;
    let stored = store.stored_bytes().await.or_raise(|| ErrorKind::Cache)?;
    println!("cached version: {}", local.as_deref().unwrap_or("none"));
    println!("cached bytes:   {stored}");
    let up_to_date = matches!((&remote_version, &local), (Some(remote), Some(local)) if remote == local.as_str());
    println!("up to date:     {}", if up_to_date { "yes" } else { "no" });
    Ok(())
}

async fn clear(config: &Config) -> Result<()> {
    let store = store(config).await;
    if !store.is_available() {
        exn::bail!(ErrorKind::CacheUnavailable);
    }
    store.remove_meta(VERSION_TAG).await.or_raise(|| ErrorKind::Cache)?;
    store.remove_meta(TOTAL_BYTES).await.or_raise(|| ErrorKind::Cache)?;
    store.clear_files().await.or_raise(|| ErrorKind::Cache)?;
    match config.cache_path() {
        Some(path) => eprintln!("cleared cache at {}", path.display()),
        None => eprintln!("cleared cache"),
    }
    Ok(())
}
