//! In-memory storage backend for testing.

use super::EntryStream;
use crate::error::{ErrorKind, Result};
use crate::path::{validate as validate_path, validate_prefix};
use crate::{Entry, StorageBackend};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Objects are stored in a sorted map behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation and
/// listings come back in a stable order. Containers are implied by keys, the
/// same way they are in an object store.
///
/// Individual keys can be marked as broken with [`with_failure`](Self::with_failure):
/// listing that container or reading that object then fails with a
/// [`BackendError`](ErrorKind::BackendError).
///
/// # Examples
///
/// ```
/// use media_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("2019/06/a.jpg", b"not really a jpeg"),
/// ]);
/// assert!(backend.exists(Path::new("2019/06/a.jpg")).await?);
/// assert!(backend.list(None).await?[0].is_container());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, (OffsetDateTime, Vec<u8>)>>,
    failures: HashSet<PathBuf>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failures: HashSet::new(),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make listing (when `path` is a container) or reading (when `path` is
    /// an object) fail.
    pub fn with_failure(mut self, path: impl AsRef<Path>) -> Self {
        let Ok(validated) = validate_path(path.as_ref()) else {
            panic!("MockBackend::with_failure: invalid path {}", path.as_ref().display());
        };
        self.failures.insert(validated);
        self
    }

    fn check_failure(&self, path: &Path) -> Result<()> {
        if self.failures.contains(path) {
            exn::bail!(ErrorKind::BackendError(format!("injected failure for {}", path.display())));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> EntryStream<'a> {
        let validated_prefix = match validate_prefix(prefix) {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        if let Some(pfx) = &validated_prefix
            && let Err(e) = self.check_failure(pfx)
        {
            return Box::pin(futures::stream::once(async { Err(e) }));
        }

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<Entry> = {
                let guard = self.storage.read().await;
                let mut containers = BTreeSet::new();
                let mut objects = Vec::new();
                for (path, (modified, data)) in guard.iter() {
                    let remainder = match &validated_prefix {
                        Some(pfx) => match path.strip_prefix(pfx) {
                            Ok(rest) => rest,
                            Err(_) => continue,
                        },
                        None => path.as_path(),
                    };
                    let mut components = remainder.components();
                    let Some(first) = components.next() else { continue };
                    let child = match &validated_prefix {
                        Some(pfx) => pfx.join(first),
                        None => PathBuf::from(first.as_os_str()),
                    };
                    if components.next().is_some() {
                        containers.insert(child);
                    } else {
                        objects.push(Entry::object(child, data.len() as u64, *modified));
                    }
                }
                containers.into_iter().map(Entry::container).chain(objects).collect()
            };
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        self.check_failure(&path)?;
        let (_modified, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn stat(&self, path: &Path) -> Result<Entry> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        if let Some((modified, data)) = guard.get(&path) {
            return Ok(Entry::object(path.clone(), data.len() as u64, *modified));
        }
        if guard.keys().any(|key| key.starts_with(&path)) {
            return Ok(Entry::container(path));
        }
        exn::bail!(ErrorKind::NotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("a.png"), b"hello").await.unwrap();
        assert_eq!(backend.read(Path::new("a.png")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("missing.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_synthesizes_containers() {
        let backend = MockBackend::with_files([
            ("a.jpg", Vec::from(*b"1")),
            ("x/b.jpg", Vec::from(*b"2")),
            ("x/c.jpg", Vec::from(*b"3")),
            ("x/y/d.jpg", Vec::from(*b"4")),
        ]);
        let root = backend.list(None).await.unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root[0], Entry::container("x"));
        assert_eq!(root[1].path, Path::new("a.jpg"));
        assert_eq!(root[1].size(), Some(1));

        let nested = backend.list(Some(Path::new("x"))).await.unwrap();
        let paths: Vec<_> = nested.iter().map(|e| (e.path.clone(), e.is_container())).collect();
        assert_eq!(
            paths,
            vec![(PathBuf::from("x/y"), true), (PathBuf::from("x/b.jpg"), false), (PathBuf::from("x/c.jpg"), false)]
        );
    }

    #[tokio::test]
    async fn test_walk_lists_every_object() {
        let backend = MockBackend::with_files([("a.jpg", "1"), ("x/b.jpg", "2"), ("x/y/d.jpg", "4")]);
        let all: Vec<_> = walk(&backend, None).try_collect().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| !e.is_container()));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = MockBackend::with_files([("x/b.jpg", "2"), ("c.jpg", "3")]).with_failure("x").with_failure("c.jpg");
        assert!(backend.list(Some(Path::new("x"))).await.is_err());
        assert!(backend.read(Path::new("c.jpg")).await.is_err());
        assert!(walk(&backend, None).try_collect::<Vec<_>>().await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_stat() {
        let backend = MockBackend::with_files([("dir/file.png", "12345")]);
        assert_eq!(backend.stat(Path::new("dir/file.png")).await.unwrap().size(), Some(5));
        assert!(backend.stat(Path::new("dir")).await.unwrap().is_container());
        backend.delete(Path::new("dir/file.png")).await.unwrap();
        let err = backend.stat(Path::new("dir/file.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
