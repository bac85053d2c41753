use assetsync_remote::Validator;
use derive_more::Display;

/// How a sync brings the target up to date.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Mode {
    /// Replay the cached generation; no network access.
    #[display("restore")]
    Restore,
    /// Fetch and unpack the bundle, then cache it.
    #[display("download")]
    Download,
}

/// Restore only when durable storage exists and the server's validator is
/// known and identical to the cached one. Anything else, including an
/// unresolvable validator, downloads.
pub fn decide(available: bool, remote: Option<&Validator>, local: Option<&str>) -> Mode {
    match (available, remote, local) {
        (true, Some(remote), Some(local)) if remote.as_str() == local => Mode::Restore,
        _ => Mode::Download,
    }
}
