use crate::error::{ErrorKind, Result};
use assetsync_cache::StoreHandle;
use assetsync_progress::{ProgressBus, ProgressEvent};
use assetsync_storage::{TargetFs, parent_of};
use exn::ResultExt;
use futures::TryStreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What a restore or download put into the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Written {
    pub files: u64,
    pub bytes: u64,
}

/// Creates each directory at most once per pass.
#[derive(Default)]
pub(crate) struct DirTracker {
    created: HashSet<PathBuf>,
}
impl DirTracker {
    /// Make sure the parent of `path` exists.
    pub(crate) async fn prepare(&mut self, target: &dyn TargetFs, path: &Path) -> Result<()> {
        if let Some(parent) = parent_of(path)
            && !self.created.contains(&parent)
        {
            target.mkdir_tree(&parent).await.or_raise(|| ErrorKind::Target)?;
            self.created.insert(parent);
        }
        Ok(())
    }
}

/// Replays the cached generation into the target filesystem.
///
/// No network access and no decompression: bytes go straight from the store
/// to the target. Progress is reported with the same unpack events as a
/// download, scaled against the stored size hint when there is one.
pub struct CacheRestorer {
    store: StoreHandle,
    bus: ProgressBus,
    bundle_url: String,
    mount: PathBuf,
}

impl CacheRestorer {
    pub fn new(store: StoreHandle, bus: ProgressBus, bundle_url: impl Into<String>, mount: impl Into<PathBuf>) -> Self {
        Self { store, bus, bundle_url: bundle_url.into(), mount: mount.into() }
    }

    #[tracing::instrument(skip(self, target), fields(target = target.name()))]
    pub async fn restore(&self, target: &dyn TargetFs, size_hint: Option<u64>) -> Result<Written> {
        // Download-oriented consumers still see the bundle "arrive".
        let url = self.bundle_url.as_str();
        self.bus.publish(ProgressEvent::start(url, 2));
        self.bus.publish(ProgressEvent::progress(url, 1, 2));
        self.bus.publish(ProgressEvent::done(url, 2, 2));

        let hint = size_hint.filter(|hint| *hint > 0);
        self.bus.publish(ProgressEvent::UnzipStart { total_files: 0, total_bytes: hint.unwrap_or(0) });

        target.mkdir_tree(&self.mount).await.or_raise(|| ErrorKind::Target)?;
        let mut dirs = DirTracker::default();
        let mut written = Written::default();
        let mut files = self.store.iterate();
        while let Some(file) = files.try_next().await.or_raise(|| ErrorKind::Store)? {
            let path = self.mount.join(&file.path);
            dirs.prepare(target, &path).await?;
            target.write_file(&path, &file.data).await.or_raise(|| ErrorKind::Target)?;
            written.bytes += file.len();
            self.bus.publish(ProgressEvent::UnzipProgress {
                file: file.path,
                file_index: written.files,
                file_percent: 100,
                loaded_bytes: hint.map_or(written.bytes, |hint| written.bytes.min(hint)),
                total_bytes: hint.unwrap_or(written.bytes.max(1)),
            });
            written.files += 1;
        }
        drop(files);

        self.bus.publish(ProgressEvent::UnzipDone {
            total_files: written.files,
            total_bytes: hint.unwrap_or(written.bytes),
        });
        tracing::info!(files = written.files, bytes = written.bytes, "restored cached bundle");
        Ok(written)
    }
}
