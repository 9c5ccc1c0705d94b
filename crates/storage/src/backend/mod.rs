//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for storage operations across different containers (local
//! filesystem, in-memory, S3-compatible services).

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::Entry;
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<Entry>> + Send + 'a>>;

/// Unified interface for storage containers.
///
/// All storage operations are asynchronous to efficiently handle network
/// operations and concurrent access. The trait supports both local filesystem
/// and remote object storage. It's a glorified CRUD interface with a
/// delimiter-style listing.
///
/// # Key Handling
/// All keys are relative to the container root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use media_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_hardcoded_object(backend: &dyn StorageBackend) -> Result<u64> {
///     let key = Path::new("2019/06/a.jpg");
///     if backend.exists(key).await? {
///         let data = backend.read(key).await?;
///         Ok(data.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (usually the URI it was opened from).
    /// Used for logging only.
    fn name(&self) -> &str;

    /// List the immediate children of a container.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<Entry>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream the immediate children of the container `prefix` (the root
    /// when `None`).
    ///
    /// Objects are reported as [`EntryKind::Object`](crate::EntryKind::Object),
    /// nested containers as [`EntryKind::Container`](crate::EntryKind::Container)
    /// without descending into them; use [`walk`] for a recursive listing.
    ///
    /// # Notes
    /// - Listing a container that does not exist yields nothing rather than
    ///   an error, consistent with object stores where containers are only
    ///   implied by keys.
    /// - Ordering depends on the backend and must not be relied upon.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use media_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Some(Path::new("2019")));
    /// while let Some(entry) = stream.try_next().await? {
    ///     println!("{} (container: {})", entry.path.display(), entry.is_container());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> EntryStream<'a>;

    /// Check if an object exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read object contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use media_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let data = backend.read(Path::new("2019/06/a.jpg")).await?;
    /// println!("Read {} bytes", data.len());
    /// # Ok(())
    /// # }
    /// ```
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write object contents.
    ///
    /// Creates a new object or overwrites an existing one with the provided
    /// data. Implementations should create parent containers as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Get object metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<Entry>;
}

/// Recursively list every object beneath `prefix`.
///
/// Containers are descended into (depth-first) and never yielded themselves.
/// The first listing error is yielded and ends the walk: a partial listing
/// is not a listing.
///
/// # Examples
///
/// ```
/// use futures::TryStreamExt;
/// # use media_storage::{backend::StorageBackend, error::Result, walk};
/// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
/// let objects: Vec<_> = walk(backend, None).try_collect().await?;
/// # Ok(())
/// # }
/// ```
pub fn walk<'a>(backend: &'a dyn StorageBackend, prefix: Option<&'a Path>) -> EntryStream<'a> {
    Box::pin(stream! {
        let mut stack: Vec<Option<PathBuf>> = vec![prefix.map(Path::to_path_buf)];
        while let Some(current) = stack.pop() {
            let mut listing = backend.list_stream(current.as_deref());
            while let Some(entry) = listing.next().await {
                match entry {
                    Ok(entry) if entry.is_container() => stack.push(Some(entry.path)),
                    Ok(entry) => yield Ok(entry),
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                }
            }
        }
    })
}
