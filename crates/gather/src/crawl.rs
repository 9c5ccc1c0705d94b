use crate::error::{ErrorKind, Result};
use crate::mime::{is_image, mime_type};
use crate::{GatherResult, TextExtractor};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use media_signature::SignatureEngine;
use media_storage::{BackendHandle, walk};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Crawls a storage container for images.
///
/// Cheap to clone: the backend, engine configuration and extractor are
/// shared.
#[derive(Clone)]
pub struct Gatherer {
    backend: BackendHandle,
    engine: SignatureEngine,
    extractor: Option<Arc<dyn TextExtractor>>,
    prefix: Option<PathBuf>,
}

impl Gatherer {
    pub fn new(backend: BackendHandle, engine: SignatureEngine) -> Self {
        Self { backend, engine, extractor: None, prefix: None }
    }

    /// Extract text from every gathered image.
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// Only crawl beneath `prefix` instead of the whole container.
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Gather a single object.
    ///
    /// Returns `Ok(None)` for objects that are not images (by extension).
    /// Read, fingerprint and text extraction failures are errors; perceptual
    /// hash failures are logged by the engine and only leave their slot out.
    pub async fn gather_file(&self, path: &Path, cancel: &CancellationToken) -> Result<Option<GatherResult>> {
        let Some(mime) = mime_type(path).filter(|m| is_image(m)) else {
            tracing::trace!(path = %path.display(), "Skipping non-image object");
            return Ok(None);
        };
        let data = self.backend.read(path).await.or_raise(|| ErrorKind::Read(path.to_path_buf()))?;

        let image_text = match &self.extractor {
            Some(extractor) => {
                Some(extractor.extract(path, &data).await.or_raise(|| ErrorKind::TextExtraction(path.to_path_buf()))?)
            },
            None => None,
        };
        let signatures =
            self.engine.compute(data, cancel).await.or_raise(|| ErrorKind::Signature(path.to_path_buf()))?;
        for failure in &signatures.failures {
            tracing::debug!(
                path = %path.display(),
                approach = failure.approach.map(|a| a.label()).unwrap_or("decode"),
                reason = %failure.message,
                "Perceptual hash omitted"
            );
        }

        Ok(Some(GatherResult {
            path: path.to_path_buf(),
            mime_type: mime.to_string(),
            fingerprint: signatures.fingerprint,
            image_hashes: signatures.hashes,
            image_text,
        }))
    }

    /// Recursively crawl the container, yielding a [`GatherResult`] for
    /// every image object.
    ///
    /// Order follows the backend's listing order. The first listing or
    /// gathering error is yielded and ends the stream. Cancellation ends the
    /// stream quietly; nothing is yielded once it has been observed.
    pub fn crawl<'a>(&'a self, cancel: CancellationToken) -> impl Stream<Item = Result<GatherResult>> + Send + 'a {
        stream!({
            tracing::debug!(backend = self.backend.name(), prefix = ?self.prefix, "Crawl started");
            let mut entries = walk(self.backend.as_ref(), self.prefix.as_deref());
            loop {
                if cancel.is_cancelled() {
                    tracing::debug!("Crawl cancelled");
                    return;
                }
                let entry = match entries.next().await {
                    Some(Ok(entry)) => entry,
                    Some(Err(e)) => {
                        yield Err(e.raise(ErrorKind::Listing));
                        return;
                    },
                    None => break,
                };
                match self.gather_file(&entry.path, &cancel).await {
                    // Signatures computed while cancellation arrived may be incomplete.
                    Ok(Some(_)) if cancel.is_cancelled() => return,
                    Ok(Some(result)) => {
                        tracing::debug!(path = %result.path.display(), "Gathered image");
                        yield Ok(result);
                    },
                    Ok(None) => {},
                    Err(e) => {
                        tracing::error!(path = %entry.path.display(), "Failed to gather image");
                        yield Err(e);
                        return;
                    },
                }
            }
        })
    }
}
