//! Path validation for the target filesystem.
//!
//! Bundle entry names and cache keys end up as paths here, so anything that
//! could climb out of the filesystem root is rejected.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a target path.
///
/// Leading slashes are dropped (every path is relative to the filesystem
/// root), `.` components are removed and `..` is resolved as long as it never
/// leaves the root. Null bytes are rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use assetsync_storage::validate_path;
///
/// assert_eq!(validate_path("/rodir/valve/liblist.gam").unwrap(), Path::new("rodir/valve/liblist.gam"));
/// assert_eq!(validate_path("rodir/./valve//maps/").unwrap(), Path::new("rodir/valve/maps"));
/// assert!(validate_path("rodir/../../etc/passwd").is_err());
/// assert!(validate_path("").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// The directory that has to exist before `path` can be written, if any.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use assetsync_storage::parent_of;
///
/// assert_eq!(parent_of("rodir/valve/liblist.gam"), Some(Path::new("rodir/valve").to_path_buf()));
/// assert_eq!(parent_of("liblist.gam"), None);
/// ```
pub fn parent_of(path: impl AsRef<Path>) -> Option<PathBuf> {
    path.as_ref()
        .parent()
        .filter(|parent| parent.components().any(|c| matches!(c, Component::Normal(_))))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("rodir/valve/liblist.gam").unwrap(), Path::new("rodir/valve/liblist.gam"));
        assert_eq!(validate("cstrike").unwrap(), Path::new("cstrike"));
    }

    #[test]
    fn test_absolute_paths_are_rooted_at_the_target() {
        assert_eq!(validate("/rodir").unwrap(), Path::new("rodir"));
        assert_eq!(validate("//rodir//valve").unwrap(), Path::new("rodir/valve"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("rodir/../../etc").is_err());
        assert!(validate("..").is_err());
        // Resolving inside the root is fine.
        assert_eq!(validate("rodir/valve/../cstrike").unwrap(), Path::new("rodir/cstrike"));
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate("rodir/a\0b").is_err());
    }

    #[test]
    fn test_empty_paths() {
        assert!(validate("").is_err());
        assert!(validate("/").is_err());
        assert!(validate("./.").is_err());
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("a/b/c.txt"), Some(PathBuf::from("a/b")));
        assert_eq!(parent_of("/a/c.txt"), Some(PathBuf::from("/a")));
        assert_eq!(parent_of("c.txt"), None);
        assert_eq!(parent_of("/c.txt"), None);
    }
}
