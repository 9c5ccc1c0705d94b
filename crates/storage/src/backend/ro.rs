//! Read-only storage backend.
//!
//! This module provides a storage backend implementation that wraps other
//! implementations and prevents write operations from executing, but
//! indicating success on return. Used for dry runs.

use async_trait::async_trait;
use std::path::Path;

use crate::{BackendHandle, Entry, StorageBackend, backend::EntryStream, error::Result};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> EntryStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tracing::info!(backend = self.inner.name(), path = %path.display(), bytes = data.len(), "Skipping write during dry run");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(backend = self.inner.name(), path = %path.display(), "Skipping delete during dry run");
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<Entry> {
        self.inner.stat(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_writes_are_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = LocalBackend::new("local", temp_dir.path()).unwrap();
        local.write(Path::new("keep.geojson"), b"{}").await.unwrap();
        let backend = ReadOnlyBackend::new(Arc::new(local));

        backend.write(Path::new("new.geojson"), b"{}").await.unwrap();
        assert!(!backend.exists(Path::new("new.geojson")).await.unwrap());

        backend.delete(Path::new("keep.geojson")).await.unwrap();
        assert_eq!(backend.read(Path::new("keep.geojson")).await.unwrap(), b"{}");
    }
}
