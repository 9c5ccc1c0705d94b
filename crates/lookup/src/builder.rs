//! Concurrent construction of a [`Lookup`].

use crate::error::{Error, ErrorKind, Result};
use crate::index::{Insertion, SignatureIndex};
use crate::{ExtractionRule, Lookup, OwnerId, Source};
use exn::ResultExt;
use futures::StreamExt;
use media_asyncutils::{Fatal, OnFatal, Policy, TaskGroup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// What a conflicting signature does to the build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// The first conflict fails the whole build.
    Strict,
    /// Conflicts are logged and recorded; the first owner is kept.
    #[default]
    Report,
}

/// A signature claimed by a second, different owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub signature: String,
    /// The owner the index kept.
    pub existing: OwnerId,
    /// The owner that was rejected.
    pub incoming: OwnerId,
    /// Name of the rule that extracted the pair.
    pub rule: String,
    pub source: String,
    /// Locator of the document with the rejected claim.
    pub locator: String,
}

/// Builds a [`Lookup`] from any number of sources.
///
/// # Examples
///
/// ```no_run
/// use media_lookup::{ConflictPolicy, ExtractionRule, LookupBuilder, source::GitSource};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> media_lookup::error::Result<()> {
/// let lookup = LookupBuilder::new([ExtractionRule::fingerprint()])
///     .source(GitSource::new("https://github.com/sfomuseum-data/sfomuseum-data-media"))
///     .policy(ConflictPolicy::Strict)
///     .build(CancellationToken::new())
///     .await?;
/// println!("{} fingerprints already in the corpus", lookup.len());
/// # Ok(())
/// # }
/// ```
pub struct LookupBuilder {
    rules: Vec<ExtractionRule>,
    sources: Vec<Box<dyn Source>>,
    policy: ConflictPolicy,
}

impl LookupBuilder {
    pub fn new(rules: impl IntoIterator<Item = ExtractionRule>) -> Self {
        Self { rules: rules.into_iter().collect(), sources: Vec::new(), policy: ConflictPolicy::default() }
    }

    pub fn source(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read every source concurrently into one index.
    ///
    /// A source failure, or a conflict under [`ConflictPolicy::Strict`],
    /// aborts the other sources and fails the build. Cancellation stops
    /// every source before its next document and still returns the partial
    /// lookup, flagged as incomplete.
    #[instrument(skip_all, fields(sources = self.sources.len(), rules = self.rules.len()))]
    pub async fn build(self, cancel: CancellationToken) -> Result<Lookup> {
        let index = Arc::new(SignatureIndex::new());
        let rules: Arc<[ExtractionRule]> = self.rules.into();
        let interrupted = Arc::new(AtomicBool::new(false));
        let (conflict_sender, mut conflict_receiver) = mpsc::unbounded_channel();
        let mut tasks = TaskGroup::<Error>::new(OnFatal::Abort);

        for source in self.sources {
            let append = Append {
                index: index.clone(),
                rules: rules.clone(),
                policy: self.policy,
                conflicts: conflict_sender.clone(),
                cancel: cancel.clone(),
                interrupted: interrupted.clone(),
            };
            let label = source.name().to_string();
            tasks.spawn(Policy::Fatal, label, async move { append.run(source.as_ref()).await });
        }
        drop(conflict_sender);

        tasks.wait().await.map_err(|fatal| match fatal {
            Fatal::Failed { error, .. } => error,
            Fatal::Panicked { label, message } => Error::from(ErrorKind::Panicked(format!("{label}: {message}"))),
        })?;

        let mut conflicts = Vec::new();
        while let Ok(conflict) = conflict_receiver.try_recv() {
            conflicts.push(conflict);
        }
        // Every task has been joined, so nothing else holds the index.
        let entries = match Arc::try_unwrap(index) {
            Ok(index) => index.into_map(),
            Err(shared) => shared.snapshot(),
        };
        let complete = !interrupted.load(Ordering::SeqCst);
        tracing::info!(signatures = entries.len(), conflicts = conflicts.len(), complete, "Lookup built");
        Ok(Lookup::new(entries, conflicts, complete))
    }
}

/// Shared state of one source task.
struct Append {
    index: Arc<SignatureIndex>,
    rules: Arc<[ExtractionRule]>,
    policy: ConflictPolicy,
    conflicts: mpsc::UnboundedSender<Conflict>,
    cancel: CancellationToken,
    interrupted: Arc<AtomicBool>,
}

impl Append {
    async fn run(&self, source: &dyn Source) -> Result<()> {
        let name = source.name();
        let mut documents = source.documents();
        let (mut read, mut skipped) = (0usize, 0usize);
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(source = name, read, "Lookup source cancelled");
                self.interrupted.store(true, Ordering::SeqCst);
                return Ok(());
            }
            let Some(document) = documents.next().await else { break };
            let document = document.or_raise(|| ErrorKind::Source(name.to_string()))?;
            read += 1;
            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&document.body) else {
                tracing::trace!(source = name, locator = %document.locator, "Skipping document that is not JSON");
                skipped += 1;
                continue;
            };
            for rule in self.rules.iter() {
                let Some((signature, owner)) = rule.extract(&value) else {
                    continue;
                };
                let Insertion::Conflict { existing } = self.index.insert(&signature, owner) else {
                    continue;
                };
                tracing::warn!(
                    source = name,
                    locator = %document.locator,
                    rule = %rule,
                    signature = %signature,
                    existing,
                    incoming = owner,
                    "Signature already belongs to another record"
                );
                if self.policy == ConflictPolicy::Strict {
                    exn::bail!(ErrorKind::Conflict {
                        signature,
                        existing,
                        incoming: owner,
                        source: name.to_string(),
                        locator: document.locator.clone(),
                    });
                }
                let conflict = Conflict {
                    signature,
                    existing,
                    incoming: owner,
                    rule: rule.name.clone(),
                    source: name.to_string(),
                    locator: document.locator.clone(),
                };
                // The receiver outlives every task.
                let _ = self.conflicts.send(conflict);
            }
        }
        tracing::debug!(source = name, read, skipped, "Lookup source finished");
        Ok(())
    }
}
