//! Fan-out of gathered results to a caller-supplied handler.
//!
//! The crawl runs on one task and feeds a bounded channel. Every result
//! received from it is handed to the handler on a task of its own. Crawl
//! failures are fatal, handler failures (errors or panics) are logged and
//! counted. Dispatch returns once the crawl and every handler have finished.

use crate::error::{Error, ErrorKind, Result};
use crate::{GatherResult, Gatherer};
use async_trait::async_trait;
use futures::TryStreamExt;
use media_asyncutils::{Fatal, OnFatal, Policy, TaskGroup};
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Results buffered between the crawl and the dispatcher.
const CHANNEL_CAPACITY: usize = 64;
const CRAWL_TASK: &str = "crawl";

/// Receives every [`GatherResult`] of a dispatch.
///
/// Implemented for any `Fn(GatherResult) -> impl Future<Output = Result<()>>`,
/// so a closure will usually do.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, result: GatherResult) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(GatherResult) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, result: GatherResult) -> Result<()> {
        self(result).await
    }
}

/// Counters of a completed dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Results handed to the handler.
    pub dispatched: usize,
    /// Handler invocations that failed or panicked.
    pub failed: usize,
}

impl Gatherer {
    /// Crawl the container and run `handler` on every result concurrently.
    ///
    /// Handlers run and complete in no particular order. A crawl error is
    /// returned only after every handler already dispatched has finished;
    /// results the crawl produced before failing are still dispatched.
    /// Cancellation stops the crawl; it is not an error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_gather::{GatherResult, Gatherer};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example(gatherer: Gatherer) -> media_gather::error::Result<()> {
    /// let summary = gatherer
    ///     .dispatch(
    ///         |result: GatherResult| async move {
    ///             println!("{} {}", result.path.display(), result.fingerprint);
    ///             Ok::<(), media_gather::error::Error>(())
    ///         },
    ///         CancellationToken::new(),
    ///     )
    ///     .await?;
    /// println!("{} images, {} failed", summary.dispatched, summary.failed);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, fields(backend = self.backend().name()))]
    pub async fn dispatch<H: Handler>(&self, handler: H, cancel: CancellationToken) -> Result<DispatchSummary> {
        let handler = Arc::new(handler);
        let (sender, mut receiver) = mpsc::channel::<GatherResult>(CHANNEL_CAPACITY);
        let mut tasks = TaskGroup::<Error>::new(OnFatal::Drain);

        let crawler = self.clone();
        tasks.spawn(Policy::Fatal, CRAWL_TASK, async move {
            let mut results = pin!(crawler.crawl(cancel));
            while let Some(result) = results.try_next().await? {
                if sender.send(result).await.is_err() {
                    break;
                }
            }
            Ok(())
        });

        let mut dispatched = 0;
        loop {
            tokio::select! {
                received = receiver.recv() => {
                    // Closed once the crawl task has finished, whatever the outcome.
                    let Some(result) = received else { break };
                    dispatched += 1;
                    let handler = handler.clone();
                    let label = result.path.display().to_string();
                    tasks.spawn(Policy::Report, label, async move { handler.handle(result).await });
                },
                // Reap finished handlers as we go.
                Some(()) = tasks.join_next(), if !tasks.is_empty() => {},
            }
        }

        let summary = tasks.wait().await.map_err(|fatal| match fatal {
            Fatal::Failed { error, .. } => error,
            Fatal::Panicked { label, message } => Error::from(ErrorKind::Panicked(format!("{label}: {message}"))),
        })?;
        tracing::info!(dispatched, failed = summary.reported, "Dispatch complete");
        Ok(DispatchSummary { dispatched, failed: summary.reported })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::png;
    use media_signature::SignatureEngine;
    use media_storage::backend::MockBackend;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn gatherer(backend: MockBackend) -> Gatherer {
        Gatherer::new(Arc::new(backend), SignatureEngine::default())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_every_image_reaches_handler() {
        let image = png(1);
        let gatherer = gatherer(MockBackend::with_files([
            ("a.jpg", image.clone()),
            ("b.png", image.clone()),
            ("c.txt", b"text".to_vec()),
        ]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = seen.clone();
            move |result: GatherResult| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push((result.path, result.fingerprint));
                    Ok::<(), Error>(())
                }
            }
        };

        let summary = gatherer.dispatch(handler, CancellationToken::new()).await.unwrap();
        assert_eq!(summary, DispatchSummary { dispatched: 2, failed: 0 });
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, Path::new("a.jpg"));
        assert_eq!(seen[1].0, Path::new("b.png"));
        assert_eq!(seen[0].1, seen[1].1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handler_failures_are_not_fatal() {
        let gatherer = gatherer(MockBackend::with_files([("a.png", png(1)), ("b.png", png(2)), ("c.png", png(3))]));
        let handler = |result: GatherResult| async move {
            match result.path.to_str() {
                Some("a.png") => exn::bail!(ErrorKind::Handler(result.path.clone())),
                Some("b.png") => panic!("handler bug"),
                _ => Ok(()),
            }
        };
        let summary = gatherer.dispatch(handler, CancellationToken::new()).await.unwrap();
        assert_eq!(summary, DispatchSummary { dispatched: 3, failed: 2 });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_returns_after_every_handler_finished() {
        let gatherer = gatherer(MockBackend::with_files((0..10u8).map(|i| (format!("{i}.png"), png(i)))));
        let finished = Arc::new(AtomicUsize::new(0));
        let handler = {
            let finished = finished.clone();
            move |_: GatherResult| {
                let finished = finished.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), Error>(())
                }
            }
        };
        let summary = gatherer.dispatch(handler, CancellationToken::new()).await.unwrap();
        assert_eq!(summary.dispatched, 10);
        assert_eq!(finished.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crawl_error_is_fatal_after_draining_handlers() {
        let gatherer = gatherer(MockBackend::with_files([("a.png", png(1)), ("b.png", png(2))]).with_failure("b.png"));
        let handled = Arc::new(Mutex::new(Vec::<PathBuf>::new()));
        let handler = {
            let handled = handled.clone();
            move |result: GatherResult| {
                let handled = handled.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    handled.lock().unwrap().push(result.path);
                    Ok::<(), Error>(())
                }
            }
        };
        let err = gatherer.dispatch(handler, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Read(path) if path == Path::new("b.png")));
        assert_eq!(*handled.lock().unwrap(), vec![PathBuf::from("a.png")]);
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_is_not_an_error() {
        let gatherer = gatherer(MockBackend::with_files([("a.png", png(1))]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let handler = |_: GatherResult| async { Ok::<(), Error>(()) };
        let summary = gatherer.dispatch(handler, cancel).await.unwrap();
        assert_eq!(summary, DispatchSummary::default());
    }
}
