use crate::RemoteHandle;
use std::fmt;

/// Opaque identity of one version of the remote bundle.
///
/// Only ever compared for equality; never parsed or ordered.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Validator(String);
impl Validator {
    /// `None` for an empty or whitespace-only value.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        match value.trim().is_empty() {
            true => None,
            false => Some(Self(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl PartialEq<str> for Validator {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Works out which version of the bundle the server currently has.
///
/// In order of preference: the bundle's `ETag`, its `Last-Modified`, then
/// the trimmed contents of an optional sidecar version file. Every failure
/// along the way is logged and swallowed; a remote that cannot be
/// identified resolves to `None`.
#[derive(Clone)]
pub struct VersionResolver {
    remote: RemoteHandle,
    bundle_url: String,
    version_url: Option<String>,
}
impl VersionResolver {
    pub fn new(remote: RemoteHandle, bundle_url: impl Into<String>, version_url: Option<String>) -> Self {
        Self { remote, bundle_url: bundle_url.into(), version_url }
    }

    #[tracing::instrument(skip(self), fields(bundle = %self.bundle_url))]
    pub async fn resolve(&self) -> Option<Validator> {
        match self.remote.probe(&self.bundle_url).await {
            Ok(probe) => {
                let validator = probe.etag.and_then(Validator::new).or_else(|| probe.last_modified.and_then(Validator::new));
                if validator.is_some() {
                    tracing::debug!(validator = ?validator, "resolved from bundle headers");
                    return validator;
                }
            },
            Err(err) => tracing::debug!(error = %*err, "bundle probe failed"),
        }
        let version_url = self.version_url.as_deref()?;
        match self.remote.fetch_text(version_url).await {
            Ok(text) => {
                let validator = Validator::new(text.trim());
                tracing::debug!(validator = ?validator, "resolved from version file");
                validator
            },
            Err(err) => {
                tracing::debug!(error = %*err, url = version_url, "version file unavailable");
                None
            },
        }
    }
}
