use serde::Serialize;

/// A single progress record.
///
/// The serialized form is the broadcast wire format: a `type` tag in
/// kebab-case and camelCase field names, so the same record can be handed
/// straight to a UI, a diagnostics panel or a log line.
///
/// Download events (`Start`, `Progress`, `Done`, `Error`) are keyed by url.
/// A `total` of `0` means the size is unknown, never that the resource is
/// empty. Unpack events (`UnzipStart`, `UnzipProgress`, `UnzipDone`) describe
/// both archive expansion and cache restoration.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Start {
        url: String,
        loaded: u64,
        total: u64,
    },
    Progress {
        url: String,
        loaded: u64,
        total: u64,
    },
    Done {
        url: String,
        loaded: u64,
        total: u64,
    },
    Error {
        url: String,
        error: String,
    },
    UnzipStart {
        total_files: u64,
        total_bytes: u64,
    },
    UnzipProgress {
        file: String,
        file_index: u64,
        /// Percentage of the current file, `0..=100`.
        file_percent: u8,
        loaded_bytes: u64,
        total_bytes: u64,
    },
    UnzipDone {
        total_files: u64,
        total_bytes: u64,
    },
}

impl ProgressEvent {
    pub fn start(url: impl Into<String>, total: u64) -> Self {
        Self::Start { url: url.into(), loaded: 0, total }
    }

    pub fn progress(url: impl Into<String>, loaded: u64, total: u64) -> Self {
        Self::Progress { url: url.into(), loaded, total }
    }

    pub fn done(url: impl Into<String>, loaded: u64, total: u64) -> Self {
        Self::Done { url: url.into(), loaded, total }
    }

    pub fn error(url: impl Into<String>, error: impl ToString) -> Self {
        Self::Error { url: url.into(), error: error.to_string() }
    }

    /// The wire name of this event (the value of its `type` tag).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Progress { .. } => "progress",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::UnzipStart { .. } => "unzip-start",
            Self::UnzipProgress { .. } => "unzip-progress",
            Self::UnzipDone { .. } => "unzip-done",
        }
    }

    /// Returns `true` for the events that end a phase (`done`, `error`, `unzip-done`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. } | Self::UnzipDone { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_download_event_wire_format() {
        let event = ProgressEvent::progress("valve.zip", 512, 2048);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "progress", "url": "valve.zip", "loaded": 512, "total": 2048})
        );
    }

    #[test]
    fn test_start_always_reports_zero_loaded() {
        let event = ProgressEvent::start("valve.zip", 0);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "start", "url": "valve.zip", "loaded": 0, "total": 0})
        );
    }

    #[test]
    fn test_unzip_progress_wire_format() {
        let event = ProgressEvent::UnzipProgress {
            file: "cstrike/maps/de_dust2.bsp".to_string(),
            file_index: 3,
            file_percent: 50,
            loaded_bytes: 100,
            total_bytes: 400,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "unzip-progress",
                "file": "cstrike/maps/de_dust2.bsp",
                "fileIndex": 3,
                "filePercent": 50,
                "loadedBytes": 100,
                "totalBytes": 400,
            })
        );
    }

    #[rstest]
    #[case(ProgressEvent::start("a", 1))]
    #[case(ProgressEvent::progress("a", 1, 1))]
    #[case(ProgressEvent::done("a", 1, 1))]
    #[case(ProgressEvent::error("a", "boom"))]
    #[case(ProgressEvent::UnzipStart { total_files: 1, total_bytes: 1 })]
    #[case(ProgressEvent::UnzipDone { total_files: 1, total_bytes: 1 })]
    fn test_kind_matches_serialized_tag(#[case] event: ProgressEvent) {
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.kind());
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::done("a", 1, 1).is_terminal());
        assert!(ProgressEvent::error("a", "boom").is_terminal());
        assert!(!ProgressEvent::progress("a", 1, 1).is_terminal());
        assert!(!ProgressEvent::UnzipStart { total_files: 0, total_bytes: 0 }.is_terminal());
    }
}
