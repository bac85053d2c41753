//! Terminal rendering of progress events.

use assetsync_progress::ProgressEvent;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

const DOWNLOAD_TEMPLATE: &str = "{msg:>10} [{bar:30.cyan/dim}] {bytes}/{total_bytes} {bytes_per_sec}";
const UNKNOWN_TEMPLATE: &str = "{spinner:.green} {msg:>8} {bytes} {bytes_per_sec}";
const UNPACK_TEMPLATE: &str = "{msg:>10} [{bar:30.green/dim}] {percent:>3}% {prefix:.dim}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Draws one bar for the download and one for unpacking.
#[derive(Default)]
pub struct BarRenderer {
    download: Option<ProgressBar>,
    unpack: Option<ProgressBar>,
}

impl BarRenderer {
    pub fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Start { total, .. } => {
                let bar = match total {
                    0 => ProgressBar::new_spinner().with_style(style(UNKNOWN_TEMPLATE)),
                    total => ProgressBar::new(*total).with_style(style(DOWNLOAD_TEMPLATE)),
                };
                bar.set_draw_target(ProgressDrawTarget::stderr());
                bar.set_message("Fetching");
                self.download = Some(bar);
            },
            ProgressEvent::Progress { loaded, .. } => {
                if let Some(bar) = &self.download {
                    bar.set_position(*loaded);
                }
            },
            ProgressEvent::Done { loaded, .. } => {
                if let Some(bar) = self.download.take() {
                    bar.set_position(*loaded);
                    bar.finish_with_message("Fetched");
                }
            },
            ProgressEvent::Error { error, .. } => {
                if let Some(bar) = self.download.take() {
                    bar.abandon_with_message(format!("Failed: {error}"));
                }
            },
            ProgressEvent::UnzipStart { total_bytes, .. } => {
                let bar = ProgressBar::new((*total_bytes).max(1)).with_style(style(UNPACK_TEMPLATE));
                bar.set_draw_target(ProgressDrawTarget::stderr());
                bar.set_message("Unpacking");
                self.unpack = Some(bar);
            },
            ProgressEvent::UnzipProgress { file, loaded_bytes, total_bytes, .. } => {
                if let Some(bar) = &self.unpack {
                    bar.set_length((*total_bytes).max(1));
                    bar.set_position(*loaded_bytes);
                    bar.set_prefix(file.clone());
                }
            },
            ProgressEvent::UnzipDone { total_files, .. } => {
                if let Some(bar) = self.unpack.take() {
                    bar.set_position(bar.length().unwrap_or(0));
                    bar.set_prefix(format!("{total_files} files"));
                    bar.finish_with_message("Unpacked");
                }
            },
        }
    }
}

/// Consume `receiver` until every publisher is gone.
///
/// With `json` set, each event is written to stdout as one JSON line instead
/// of being drawn.
pub async fn drain(mut receiver: Receiver<ProgressEvent>, json: bool) {
    let mut bars = BarRenderer::default();
    let mut stdout = std::io::stdout();
    loop {
        match receiver.recv().await {
            Ok(event) if json => match serde_json::to_string(&event) {
                Ok(line) => {
                    let _ = writeln!(stdout, "{line}");
                },
                Err(err) => tracing::debug!(error = %err, "could not serialise progress event"),
            },
            Ok(event) => bars.handle(&event),
            Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "progress renderer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
