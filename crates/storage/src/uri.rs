//! Opening storage backends from URIs.
//!
//! Supported forms:
//! - `file:///absolute/path` or a bare absolute path
//! - `s3://bucket/optional/prefix?region=..&endpoint=..` (feature `s3`)

use crate::BackendHandle;
use crate::backend::LocalBackend;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Open the backend addressed by `uri`. The URI becomes the backend's name.
///
/// # Errors
///
/// [`UnsupportedUri`](ErrorKind::UnsupportedUri) for unknown schemes, for
/// relative paths, and for `s3://` when the `s3` feature is disabled or the
/// credentials are not in the environment.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> media_storage::error::Result<()> {
/// let media = media_storage::open("file:///srv/media").await?;
/// assert_eq!(media.name(), "file:///srv/media");
/// # Ok(())
/// # }
/// ```
pub async fn open(uri: &str) -> Result<BackendHandle> {
    if Path::new(uri).is_absolute() {
        return Ok(Arc::new(LocalBackend::new(uri, uri)?));
    }
    let parsed = Url::parse(uri).or_raise(|| ErrorKind::UnsupportedUri(uri.to_string()))?;
    match parsed.scheme() {
        "file" => {
            let root = parsed.to_file_path().map_err(|()| ErrorKind::UnsupportedUri(uri.to_string()))?;
            Ok(Arc::new(LocalBackend::new(uri, root)?))
        },
        #[cfg(feature = "s3")]
        "s3" => open_s3(uri, &parsed).await,
        _ => exn::bail!(ErrorKind::UnsupportedUri(uri.to_string())),
    }
}

#[cfg(feature = "s3")]
async fn open_s3(uri: &str, parsed: &Url) -> Result<BackendHandle> {
    let bucket = parsed.host_str().filter(|b| !b.is_empty());
    let Some(bucket) = bucket else {
        exn::bail!(ErrorKind::UnsupportedUri(uri.to_string()));
    };
    let prefix = Some(parsed.path().trim_matches('/')).filter(|p| !p.is_empty()).map(str::to_string);
    let query = |name: &str| parsed.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned());
    let region = query("region").or_else(|| std::env::var("AWS_REGION").ok()).unwrap_or_else(|| "us-east-1".into());
    let (Ok(key_id), Ok(key_secret)) = (std::env::var("AWS_ACCESS_KEY_ID"), std::env::var("AWS_SECRET_ACCESS_KEY"))
    else {
        tracing::warn!(uri, "S3 credentials missing from environment");
        exn::bail!(ErrorKind::UnsupportedUri(uri.to_string()));
    };
    let backend =
        crate::backend::S3Backend::new(uri, bucket, prefix, region, query("endpoint"), key_id, key_secret).await?;
    Ok(Arc::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_bare_path_and_file_uri() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bare = temp_dir.path().to_str().unwrap();
        let backend = open(bare).await.unwrap();
        assert_eq!(backend.name(), bare);
        backend.write(Path::new("a.jpg"), b"jpeg").await.unwrap();

        let uri = Url::from_directory_path(temp_dir.path()).unwrap().to_string();
        let backend = open(&uri).await.unwrap();
        assert_eq!(backend.name(), uri);
        assert!(backend.exists(Path::new("a.jpg")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_uris() {
        for uri in ["ftp://example.com/media", "relative/dir", "gopher:thing"] {
            let err = open(uri).await.err().unwrap();
            assert!(matches!(&*err, ErrorKind::UnsupportedUri(u) if u == uri), "{uri}");
        }
    }
}
