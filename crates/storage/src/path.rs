//! Key validation and normalisation.
//!
//! Every backend addresses objects by a relative key. Keys are validated
//! before use so that nothing can escape the container root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage key for security and correctness.
/// Ensures that keys don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized key if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use media_storage::validate_path;
/// assert!(validate_path("2019/06/a.jpg").is_ok());
/// assert!(validate_path("a/../b.png").is_ok()); // (never leaves the root)
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("x/../2019//./06/a.jpg").unwrap(),
///     Path::new("2019/06/a.jpg")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
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

/// Validates an optional container prefix.
///
/// Unlike object keys, a prefix may name the root itself: `""`, `"."` and
/// `"/"` all normalise to `None`.
pub(crate) fn validate_prefix(prefix: Option<&Path>) -> Result<Option<PathBuf>> {
    let Some(prefix) = prefix else {
        return Ok(None);
    };
    let is_root = prefix.components().all(|c| matches!(c, Component::CurDir | Component::RootDir));
    if is_root {
        return Ok(None);
    }
    validate(prefix).map(Some)
}

/// Renders a validated key with `/` separators, as object stores and corpus
/// records expect regardless of platform.
pub fn key(path: impl AsRef<Path>) -> String {
    path.as_ref().components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate(Path::new("2019/06/a.jpg")).unwrap(), Path::new("2019/06/a.jpg"));
        assert_eq!(validate(Path::new("a.png")).unwrap(), Path::new("a.png"));
        assert_eq!(validate(Path::new("/leading/slash.gif")).unwrap(), Path::new("leading/slash.gif"));
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(validate(Path::new("a//b//c.jpg")).unwrap(), Path::new("a/b/c.jpg"));
        assert_eq!(validate(Path::new("a/./b/./c.jpg")).unwrap(), Path::new("a/b/c.jpg"));
        assert_eq!(validate(Path::new("a/b/")).unwrap(), Path::new("a/b"));
        assert_eq!(validate(Path::new("a/b/..")).unwrap(), Path::new("a"));
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate(Path::new("../etc/passwd")).is_err());
        assert!(validate(Path::new("a/../../b")).is_err());
        assert!(validate(Path::new("..")).is_err());
    }

    #[test]
    fn test_invalid_keys() {
        assert!(validate(Path::new("a\0b")).is_err());
        assert!(validate(Path::new("")).is_err());
        assert!(validate(Path::new("./.")).is_err());
        assert!(validate(Path::new("//")).is_err());
    }

    #[test]
    fn test_prefix_may_be_root() {
        assert_eq!(validate_prefix(None).unwrap(), None);
        assert_eq!(validate_prefix(Some(Path::new(""))).unwrap(), None);
        assert_eq!(validate_prefix(Some(Path::new("/"))).unwrap(), None);
        assert_eq!(validate_prefix(Some(Path::new("./"))).unwrap(), None);
        assert_eq!(validate_prefix(Some(Path::new("2019/"))).unwrap(), Some(PathBuf::from("2019")));
        assert!(validate_prefix(Some(Path::new("../up"))).is_err());
    }

    #[test]
    fn test_key_uses_forward_slashes() {
        let path: PathBuf = ["123", "456", "123456.geojson"].iter().collect();
        assert_eq!(key(&path), "123/456/123456.geojson");
        assert_eq!(key(Path::new("single.png")), "single.png");
    }
}
