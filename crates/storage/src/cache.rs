//! Explicit cache of opened backends, keyed by URI.

use crate::BackendHandle;
use crate::error::Result;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Opened backends keyed by the URI they were opened from.
///
/// Owned by whoever composes the application and passed by reference; there
/// is no process-wide instance. The lock is held while a backend is being
/// opened so that concurrent callers for the same URI share one handle.
#[derive(Default)]
pub struct BackendCache {
    backends: Mutex<HashMap<String, BackendHandle>>,
}

impl BackendCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `uri`, opening and storing it first if
    /// needed.
    pub async fn get_or_open(&self, uri: &str) -> Result<BackendHandle> {
        let mut backends = self.backends.lock().await;
        if let Some(backend) = backends.get(uri) {
            return Ok(backend.clone());
        }
        let backend = crate::open(uri).await?;
        tracing::debug!(uri, "Opened storage backend");
        backends.insert(uri.to_string(), backend.clone());
        Ok(backend)
    }

    pub async fn len(&self) -> usize {
        self.backends.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_callers_share_handle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let uri = temp_dir.path().to_str().unwrap().to_string();
        let cache = Arc::new(BackendCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let uri = uri.clone();
                tokio::spawn(async move { cache.get_or_open(&uri).await.unwrap() })
            })
            .collect();
        let mut opened = Vec::new();
        for handle in handles {
            opened.push(handle.await.unwrap());
        }
        assert!(opened.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_open_is_not_cached() {
        let cache = BackendCache::new();
        assert!(cache.get_or_open("ftp://nowhere").await.is_err());
        assert!(cache.is_empty().await);
    }
}
