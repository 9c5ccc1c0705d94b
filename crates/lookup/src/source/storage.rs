use super::{DocumentStream, Source, SourceDocument};
use crate::error::ErrorKind;
use async_stream::stream;
use exn::ResultExt;
use media_storage::{BackendHandle, path_key, walk};
use std::path::PathBuf;

const RECORD_EXTENSION: &str = "geojson";

/// Every `.geojson` object beneath an optional prefix of a storage
/// container. Other objects are ignored.
pub struct StorageSource {
    backend: BackendHandle,
    prefix: Option<PathBuf>,
}

impl StorageSource {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, prefix: None }
    }

    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

impl Source for StorageSource {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn documents(&self) -> DocumentStream<'_> {
        Box::pin(stream! {
            for await entry in walk(self.backend.as_ref(), self.prefix.as_deref()) {
                let entry = match entry.or_raise(|| ErrorKind::Storage) {
                    Ok(entry) => entry,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                if entry.path.extension().is_none_or(|ext| ext != RECORD_EXTENSION) {
                    continue;
                }
                match self.backend.read(&entry.path).await.or_raise(|| ErrorKind::Storage) {
                    Ok(body) => yield Ok(SourceDocument { locator: path_key(&entry.path), body }),
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                }
            }
        })
    }
}
