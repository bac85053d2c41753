use crate::decision::{Mode, decide};
use crate::error::{ErrorKind, Result};
use crate::restore::{CacheRestorer, DirTracker, Written};
use assetsync_archive::{ArchiveExpander, ZipExpander};
use assetsync_cache::{CachedFile, StoreHandle, TOTAL_BYTES, VERSION_TAG};
use assetsync_progress::ProgressBus;
use assetsync_remote::{DownloadPipeline, RemoteHandle, Validator, VersionResolver};
use assetsync_storage::TargetFs;
use derive_more::Display;
use exn::ResultExt;
use futures::TryStreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a [`SyncOrchestrator`] gets its bundle from and puts it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub bundle_url: String,
    pub version_url: Option<String>,
    /// Directory of the target filesystem that receives the bundle contents.
    pub mount: PathBuf,
}
impl SyncOptions {
    pub fn new(bundle_url: impl Into<String>) -> Self {
        Self { bundle_url: bundle_url.into(), version_url: None, mount: PathBuf::from("rodir") }
    }

    pub fn with_version_url(mut self, url: impl Into<String>) -> Self {
        self.version_url = Some(url.into());
        self
    }

    pub fn with_mount(mut self, mount: impl Into<PathBuf>) -> Self {
        self.mount = mount.into();
        self
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum SyncState {
    #[display("idle")]
    Idle,
    #[display("resolving version")]
    ResolvingVersion,
    #[display("deciding")]
    Deciding,
    #[display("restoring")]
    Restoring,
    #[display("downloading")]
    Downloading,
    #[display("ready")]
    Ready,
    #[display("failed")]
    Failed,
}

/// Outcome of a successful [`SyncOrchestrator::sync`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    /// The path that actually populated the target. A restore that fell back
    /// to downloading reports [`Mode::Download`].
    pub mode: Mode,
    pub validator: Option<Validator>,
    pub files: u64,
    pub bytes: u64,
    /// Set when the target is ready but the cache could not be updated; the
    /// next sync will download again.
    pub warning: Option<String>,
}

/// Keeps the target filesystem in step with the server's bundle.
///
/// Each [`sync()`](Self::sync) resolves the server's validator, then either
/// replays the cached generation (validators match and a cache exists) or
/// downloads and unpacks the bundle, writing every entry to the target as it
/// is produced. A downloaded generation is committed to the cache only after
/// the whole pass has succeeded, and the stored validator is updated only
/// after that commit. Finally the target changes into the mount directory.
///
/// `sync()` takes `&mut self`: one sync at a time per orchestrator.
pub struct SyncOrchestrator {
    options: SyncOptions,
    resolver: VersionResolver,
    pipeline: DownloadPipeline,
    expander: Arc<dyn ArchiveExpander>,
    store: StoreHandle,
    bus: ProgressBus,
    state: SyncState,
}

impl SyncOrchestrator {
    pub fn new(options: SyncOptions, remote: RemoteHandle, store: StoreHandle, bus: ProgressBus) -> Self {
        let resolver = VersionResolver::new(remote.clone(), options.bundle_url.clone(), options.version_url.clone());
        let pipeline = DownloadPipeline::new(remote, bus.clone());
        Self { options, resolver, pipeline, expander: Arc::new(ZipExpander), store, bus, state: SyncState::Idle }
    }

    /// Abort an in-flight download once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.pipeline = self.pipeline.with_cancellation(token);
        self
    }

    pub fn with_expander(mut self, expander: Arc<dyn ArchiveExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    #[tracing::instrument(skip_all, fields(bundle = %self.options.bundle_url, target = target.name()))]
    pub async fn sync(&mut self, target: &dyn TargetFs) -> Result<SyncReport> {
        match self.run(target).await {
            Ok(report) => {
                self.state = SyncState::Ready;
                Ok(report)
            },
            Err(err) => {
                self.state = SyncState::Failed;
                tracing::error!(error = %*err, "sync failed");
                Err(err)
            },
        }
    }

    async fn run(&mut self, target: &dyn TargetFs) -> Result<SyncReport> {
        self.state = SyncState::ResolvingVersion;
        let validator = self.resolver.resolve().await;

        self.state = SyncState::Deciding;
        let available = self.store.is_available();
        let local = match available {
            true => self.store.version_tag().await.unwrap_or_else(|err| {
                tracing::warn!(error = %*err, "could not read cached version; downloading");
                None
            }),
            false => None,
        };
        let mode = decide(available, validator.as_ref(), local.as_deref());
        tracing::info!(%mode, remote = ?validator, local = ?local, available, "sync decided");

        let (mode, written, warning) = match mode {
            Mode::Restore => {
                self.state = SyncState::Restoring;
                match self.restore(target).await {
                    Ok(written) => (Mode::Restore, written, None),
                    Err(err) if *err == ErrorKind::Store => {
                        tracing::warn!(error = ?err, "cache restore failed; downloading instead");
                        self.state = SyncState::Downloading;
                        let (written, warning) = self.download(target, validator.as_ref()).await?;
                        (Mode::Download, written, warning)
                    },
                    Err(err) => return Err(err),
                }
            },
            Mode::Download => {
                self.state = SyncState::Downloading;
                let (written, warning) = self.download(target, validator.as_ref()).await?;
                (Mode::Download, written, warning)
            },
        };

        target.chdir(&self.options.mount).await.or_raise(|| ErrorKind::Target)?;
        Ok(SyncReport { mode, validator, files: written.files, bytes: written.bytes, warning })
    }

    async fn restore(&self, target: &dyn TargetFs) -> Result<Written> {
        let hint = self.store.total_bytes_hint().await;
        CacheRestorer::new(self.store.clone(), self.bus.clone(), &self.options.bundle_url, &self.options.mount)
            .restore(target, hint)
            .await
    }

    async fn download(&self, target: &dyn TargetFs, validator: Option<&Validator>) -> Result<(Written, Option<String>)> {
        let bundle = self.pipeline.fetch(&self.options.bundle_url).await.or_raise(|| ErrorKind::Network)?;

        target.mkdir_tree(&self.options.mount).await.or_raise(|| ErrorKind::Target)?;
        let mut dirs = DirTracker::default();
        let mut staged = Vec::new();
        let mut written = Written::default();
        let mut entries = self.expander.expand(bundle, &self.bus);
        while let Some(entry) = entries.try_next().await.or_raise(|| ErrorKind::Archive)? {
            let path = self.options.mount.join(&entry.path);
            dirs.prepare(target, &path).await?;
            target.write_file(&path, &entry.data).await.or_raise(|| ErrorKind::Target)?;
            written.files += 1;
            written.bytes += entry.len();
            staged.push(CachedFile::new(entry.path, entry.data));
        }
        drop(entries);

        let warning = match self.commit(&staged, validator).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(error = ?err, "could not cache the new bundle; the next sync will download it again");
                Some(format!("cache not updated: {}", *err))
            },
        };
        Ok((written, warning))
    }

    /// Persist a fully unpacked generation.
    ///
    /// The stored validator is dropped first and only set again once the new
    /// files have committed, so an interrupted commit can never leave a
    /// validator pointing at files it does not describe.
    async fn commit(&self, staged: &[CachedFile], validator: Option<&Validator>) -> Result<()> {
        if !self.store.is_available() {
            return Ok(());
        }
        self.store.remove_meta(VERSION_TAG).await.or_raise(|| ErrorKind::Store)?;
        let bytes = self.store.replace_files(staged).await.or_raise(|| ErrorKind::Store)?;
        self.store.set_meta(TOTAL_BYTES, &bytes.to_string()).await.or_raise(|| ErrorKind::Store)?;
        if let Some(validator) = validator {
            self.store.set_meta(VERSION_TAG, validator.as_str()).await.or_raise(|| ErrorKind::Store)?;
        }
        tracing::info!(files = staged.len(), bytes, validator = ?validator, "cached new bundle generation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::bundle;
    use assetsync_cache::{CacheStore, MockStore, UnavailableStore};
    use assetsync_progress::ProgressEvent;
    use assetsync_remote::MockRemote;
    use assetsync_storage::backend::MockFs;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    const BUNDLE: &str = "https://assets.test/valve.zip";
    const VERSION: &str = "https://assets.test/valve.version";

    fn files() -> Vec<(&'static str, &'static [u8])> {
        vec![
            ("valve/", &b""[..]),
            ("valve/liblist.gam", &b"game \"Half-Life\""[..]),
            ("valve/maps/c0a0.bsp", &[7u8; 64][..]),
            ("autoexec.cfg", &b"echo hi"[..]),
        ]
    }

    fn remote_with(etag: Option<&str>) -> MockRemote {
        let remote = MockRemote::default().with_body(BUNDLE, bundle(&files()), 100);
        match etag {
            Some(etag) => remote.with_etag(BUNDLE, etag),
            None => remote,
        }
    }

    fn orchestrator(remote: &Arc<MockRemote>, store: StoreHandle) -> SyncOrchestrator {
        let options = SyncOptions::new(BUNDLE).with_version_url(VERSION);
        SyncOrchestrator::new(options, remote.clone(), store, ProgressBus::default())
    }

    fn expected_target() -> BTreeMap<PathBuf, Vec<u8>> {
        BTreeMap::from([
            (PathBuf::from("rodir/autoexec.cfg"), b"echo hi".to_vec()),
            (PathBuf::from("rodir/valve/liblist.gam"), b"game \"Half-Life\"".to_vec()),
            (PathBuf::from("rodir/valve/maps/c0a0.bsp"), vec![7u8; 64]),
        ])
    }

    fn old_generation() -> MockStore {
        MockStore::with_files([("old.txt", b"stale".to_vec())]).with_meta([(VERSION_TAG, "old"), (TOTAL_BYTES, "5")])
    }

    #[tokio::test]
    async fn test_first_run_downloads_and_caches() {
        let remote = Arc::new(remote_with(Some("abc123")));
        let store = Arc::new(MockStore::default());
        let target = MockFs::default();
        let mut sync = orchestrator(&remote, store.clone());

        let report = sync.sync(&target).await.unwrap();
        assert_eq!(report.mode, Mode::Download);
        assert_eq!(report.validator, Validator::new("abc123"));
        assert_eq!(report.files, 3);
        assert_eq!(report.bytes, 16 + 64 + 7);
        assert_eq!(report.warning, None);
        assert_eq!(sync.state(), SyncState::Ready);

        assert_eq!(target.snapshot(), expected_target());
        assert_eq!(target.cwd(), PathBuf::from("rodir"));
        assert_eq!(store.meta().get(VERSION_TAG).map(String::as_str), Some("abc123"));
        assert_eq!(store.meta().get(TOTAL_BYTES).map(String::as_str), Some("87"));
        assert_eq!(store.files().keys().collect::<Vec<_>>(), ["autoexec.cfg", "valve/liblist.gam", "valve/maps/c0a0.bsp"]);
        assert_eq!(remote.get_count(BUNDLE), 1);
    }

    #[tokio::test]
    async fn test_matching_validator_restores_without_fetching() {
        let remote = Arc::new(remote_with(Some("abc123")));
        let store = Arc::new(MockStore::default());
        orchestrator(&remote, store.clone()).sync(&MockFs::default()).await.unwrap();
        assert_eq!(remote.get_count(BUNDLE), 1);

        let target = MockFs::default();
        let report = orchestrator(&remote, store.clone()).sync(&target).await.unwrap();
        assert_eq!(report.mode, Mode::Restore);
        assert_eq!(report.files, 3);
        // Still only the first download.
        assert_eq!(remote.get_count(BUNDLE), 1);
        assert_eq!(target.snapshot(), expected_target());
        assert_eq!(target.cwd(), PathBuf::from("rodir"));
    }

    #[tokio::test]
    async fn test_unavailable_store_always_downloads() {
        let remote = Arc::new(remote_with(Some("abc123")));
        let mut sync = orchestrator(&remote, Arc::new(UnavailableStore));
        for _ in 0..2 {
            let target = MockFs::default();
            let report = sync.sync(&target).await.unwrap();
            assert_eq!(report.mode, Mode::Download);
            assert_eq!(report.warning, None);
            assert_eq!(target.snapshot(), expected_target());
        }
        assert_eq!(remote.get_count(BUNDLE), 2);
    }

    #[tokio::test]
    async fn test_changed_validator_replaces_generation() {
        let remote = Arc::new(remote_with(Some("new")));
        let store = Arc::new(old_generation());
        let report = orchestrator(&remote, store.clone()).sync(&MockFs::default()).await.unwrap();
        assert_eq!(report.mode, Mode::Download);
        assert!(!store.files().contains_key("old.txt"));
        assert_eq!(store.files().len(), 3);
        assert_eq!(store.meta().get(VERSION_TAG).map(String::as_str), Some("new"));
    }

    #[tokio::test]
    async fn test_unknown_validator_downloads_and_drops_tag() {
        let remote = Arc::new(remote_with(None));
        let store = Arc::new(MockStore::default().with_meta([(VERSION_TAG, "old")]));
        let report = orchestrator(&remote, store.clone()).sync(&MockFs::default()).await.unwrap();
        assert_eq!(report.mode, Mode::Download);
        assert_eq!(report.validator, None);
        assert_eq!(store.meta().get(VERSION_TAG), None);
        assert_eq!(store.files().len(), 3);
        // A second sync still cannot restore.
        let report = orchestrator(&remote, store.clone()).sync(&MockFs::default()).await.unwrap();
        assert_eq!(report.mode, Mode::Download);
    }

    #[tokio::test]
    async fn test_version_file_validator_is_used() {
        let remote = Arc::new(remote_with(None).with_text(VERSION, "v7\n"));
        let store = Arc::new(MockStore::default());
        let report = orchestrator(&remote, store.clone()).sync(&MockFs::default()).await.unwrap();
        assert_eq!(report.validator, Validator::new("v7"));
        assert_eq!(store.meta().get(VERSION_TAG).map(String::as_str), Some("v7"));
    }

    #[tokio::test]
    async fn test_failed_commit_is_a_warning() {
        let remote = Arc::new(remote_with(Some("new")));
        let store = Arc::new(old_generation().fail_commits());
        let target = MockFs::default();
        let report = orchestrator(&remote, store.clone()).sync(&target).await.unwrap();
        assert!(report.warning.is_some());
        // The target is fine.
        assert_eq!(target.snapshot(), expected_target());
        assert_eq!(target.cwd(), PathBuf::from("rodir"));
        // The previous generation survives, but is no longer claimed by any validator.
        assert_eq!(store.files().keys().collect::<Vec<_>>(), ["old.txt"]);
        assert_eq!(store.version_tag().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_network_failure_leaves_cache_untouched() {
        let remote = Arc::new(MockRemote::default().with_etag(BUNDLE, "new").with_status(BUNDLE, 503));
        let store = Arc::new(old_generation());
        let mut sync = orchestrator(&remote, store.clone());
        let err = sync.sync(&MockFs::default()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Network);
        assert_eq!(sync.state(), SyncState::Failed);
        assert_eq!(store.meta(), old_generation().meta());
        assert_eq!(store.files(), old_generation().files());
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_cache_untouched() {
        let remote = Arc::new(MockRemote::default().with_etag(BUNDLE, "new").with_body(BUNDLE, &b"not a zip"[..], 4));
        let store = Arc::new(old_generation());
        let err = orchestrator(&remote, store.clone()).sync(&MockFs::default()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Archive);
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.meta().get(VERSION_TAG).map(String::as_str), Some("old"));
    }

    #[tokio::test]
    async fn test_target_failure_mid_pass_leaves_cache_untouched() {
        let remote = Arc::new(remote_with(Some("new")));
        let store = Arc::new(old_generation());
        let target = MockFs::default().fail_writes_after(1);
        let err = orchestrator(&remote, store.clone()).sync(&target).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Target);
        assert_eq!(store.files(), old_generation().files());
        assert_eq!(store.meta().get(VERSION_TAG).map(String::as_str), Some("old"));
    }

    #[tokio::test]
    async fn test_unreadable_cache_falls_back_to_download() {
        let remote = Arc::new(remote_with(Some("abc123")));
        let store = Arc::new(
            MockStore::with_files([("a", b"1".to_vec()), ("b", b"2".to_vec())])
                .with_meta([(VERSION_TAG, "abc123")])
                .fail_iterate_after(1),
        );
        let target = MockFs::default();
        let report = orchestrator(&remote, store.clone()).sync(&target).await.unwrap();
        assert_eq!(report.mode, Mode::Download);
        assert_eq!(remote.get_count(BUNDLE), 1);
        assert_eq!(store.files().len(), 3);
        // Whatever the failed restore wrote first is still there; the bundle is complete.
        for (path, data) in expected_target() {
            assert_eq!(target.snapshot().get(&path), Some(&data));
        }
    }

    #[tokio::test]
    async fn test_download_event_sequence() {
        let remote = Arc::new(remote_with(Some("abc123")));
        let bus = ProgressBus::default();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |event: &ProgressEvent| sink.lock().unwrap().push(event.kind()));
        let options = SyncOptions::new(BUNDLE);
        let mut sync = SyncOrchestrator::new(options, remote.clone(), Arc::new(MockStore::default()), bus);
        sync.sync(&MockFs::default()).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&"start"));
        let done = events.iter().position(|kind| *kind == "done").unwrap();
        let unzip_start = events.iter().position(|kind| *kind == "unzip-start").unwrap();
        assert!(done < unzip_start);
        assert_eq!(events.last(), Some(&"unzip-done"));
        assert_eq!(events.iter().filter(|kind| **kind == "unzip-start").count(), 1);
        assert!(!events.contains(&"error"));
    }

    #[tokio::test]
    async fn test_custom_mount() {
        let remote = Arc::new(remote_with(Some("abc123")));
        let options = SyncOptions::new(BUNDLE).with_mount("game/data");
        let mut sync = SyncOrchestrator::new(options, remote, Arc::new(MockStore::default()), ProgressBus::default());
        let target = MockFs::default();
        sync.sync(&target).await.unwrap();
        assert!(target.exists(Path::new("game/data/valve/liblist.gam")).await.unwrap());
        assert_eq!(target.cwd(), PathBuf::from("game/data"));
    }
}
