//! A scope of tokio tasks that is joined exactly once.
//!
//! Every task is spawned with a [`Policy`] deciding what its failure means:
//! a `Fatal` task failing fails the whole group, a `Report` task failing is
//! logged and counted. Panics are caught at the task boundary and treated as
//! failures under the same policy, so a panicking task never takes the group
//! down with it.

use derive_more::Display;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;

/// What the failure of a task means for the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// The first fatal failure becomes the result of [`TaskGroup::wait`].
    Fatal,
    /// Logged and counted in [`Summary::reported`]; never fails the group.
    Report,
}

/// What happens to the remaining tasks once a fatal failure is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFatal {
    /// Let every task that is already running finish.
    #[default]
    Drain,
    /// Abort every remaining task.
    Abort,
}

/// Counters for a group that finished without a fatal failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Tasks that returned `Ok`.
    pub succeeded: usize,
    /// `Report` tasks that returned an error or panicked.
    pub reported: usize,
}

/// The fatal failure that ended a group.
#[derive(Debug, Display)]
pub enum Fatal<E> {
    #[display("task `{label}` failed")]
    Failed { label: String, error: E },
    #[display("task `{label}` panicked: {message}")]
    Panicked { label: String, message: String },
}
impl<E> Fatal<E> {
    pub fn label(&self) -> &str {
        match self {
            Self::Failed { label, .. } | Self::Panicked { label, .. } => label,
        }
    }
}

enum Outcome<E> {
    Succeeded,
    Failed { policy: Policy, label: String, error: E },
    Panicked { policy: Policy, label: String, message: String },
}

/// A set of spawned tasks with per-task failure policies.
///
/// # Examples
///
/// ```
/// use media_asyncutils::{OnFatal, Policy, TaskGroup};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut group = TaskGroup::<String>::new(OnFatal::Drain);
/// group.spawn(Policy::Report, "flaky", async { Err("nope".to_string()) });
/// group.spawn(Policy::Fatal, "main", async { Ok(()) });
/// let summary = group.wait().await.unwrap();
/// assert_eq!((summary.succeeded, summary.reported), (1, 1));
/// # }
/// ```
pub struct TaskGroup<E> {
    tasks: JoinSet<Outcome<E>>,
    on_fatal: OnFatal,
    fatal: Option<Fatal<E>>,
    summary: Summary,
}

impl<E: Debug + Send + 'static> TaskGroup<E> {
    pub fn new(on_fatal: OnFatal) -> Self {
        Self {
            tasks: JoinSet::new(),
            on_fatal,
            fatal: None,
            summary: Summary::default(),
        }
    }

    /// Spawn `future` on the current runtime. `label` names the task in logs
    /// and in the [`Fatal`] error (an object key, a source name, ...).
    pub fn spawn<F>(&mut self, policy: Policy, label: impl Into<String>, future: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let label = label.into();
        self.tasks.spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => Outcome::Succeeded,
                Ok(Err(error)) => Outcome::Failed { policy, label, error },
                Err(payload) => Outcome::Panicked { policy, label, message: panic_message(payload.as_ref()) },
            }
        });
    }

    /// Number of tasks that have not been joined yet.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether a fatal failure has been observed. Callers feeding the group
    /// should stop spawning once this is true.
    pub fn has_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Join the next finished task and account for its outcome. Returns
    /// `None` once the group is empty.
    ///
    /// Cancel-safe, so it can be used as a `tokio::select!` branch.
    pub async fn join_next(&mut self) -> Option<()> {
        let joined = self.tasks.join_next().await?;
        match joined {
            Ok(outcome) => self.record(outcome),
            // Only reachable after `abort_all`; panics are caught in the task.
            Err(err) if err.is_cancelled() => {},
            Err(err) => tracing::error!(error = %err, "Task failed to join"),
        }
        Some(())
    }

    fn record(&mut self, outcome: Outcome<E>) {
        let (policy, fatal) = match outcome {
            Outcome::Succeeded => {
                self.summary.succeeded += 1;
                return;
            },
            Outcome::Failed { policy, label, error } => {
                match policy {
                    Policy::Report => tracing::warn!(task = %label, ?error, "Task failed"),
                    Policy::Fatal => tracing::error!(task = %label, ?error, "Fatal task failed"),
                }
                (policy, Fatal::Failed { label, error })
            },
            Outcome::Panicked { policy, label, message } => {
                tracing::error!(task = %label, panic = %message, "Task panicked");
                (policy, Fatal::Panicked { label, message })
            },
        };
        match policy {
            Policy::Report => self.summary.reported += 1,
            Policy::Fatal if self.fatal.is_none() => {
                self.fatal = Some(fatal);
                if self.on_fatal == OnFatal::Abort {
                    self.tasks.abort_all();
                }
            },
            // Only the first fatal failure is kept; later ones are logged above.
            Policy::Fatal => {},
        }
    }

    /// Join every task, then report the first fatal failure or the summary.
    pub async fn wait(mut self) -> Result<Summary, Fatal<E>> {
        while self.join_next().await.is_some() {}
        match self.fatal.take() {
            Some(fatal) => Err(fatal),
            None => Ok(self.summary),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_group() {
        let summary = TaskGroup::<String>::new(OnFatal::Drain).wait().await.unwrap();
        assert_eq!(summary, Summary::default());
    }

    #[tokio::test]
    async fn test_reported_failures_do_not_fail_group() {
        let mut group = TaskGroup::<String>::new(OnFatal::Drain);
        group.spawn(Policy::Report, "a.jpg", async { Err("corrupt".to_string()) });
        group.spawn(Policy::Report, "b.png", async { panic!("handler bug") });
        group.spawn(Policy::Report, "c.gif", async { Ok(()) });
        group.spawn(Policy::Fatal, "crawl", async { Ok(()) });
        let summary = group.wait().await.unwrap();
        assert_eq!(summary, Summary { succeeded: 2, reported: 2 });
    }

    #[rstest]
    #[case::error(false)]
    #[case::panic(true)]
    #[tokio::test]
    async fn test_fatal_failure_names_task(#[case] panics: bool) {
        let mut group = TaskGroup::<String>::new(OnFatal::Drain);
        group.spawn(Policy::Fatal, "crawl", async move {
            if panics {
                panic!("listing exploded");
            }
            Err("listing failed".to_string())
        });
        let fatal = group.wait().await.unwrap_err();
        assert_eq!(fatal.label(), "crawl");
        match fatal {
            Fatal::Failed { error, .. } => assert!(!panics && error == "listing failed"),
            Fatal::Panicked { message, .. } => assert!(panics && message == "listing exploded"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drain_lets_running_tasks_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::<String>::new(OnFatal::Drain);
        for i in 0..4 {
            let finished = finished.clone();
            group.spawn(Policy::Report, format!("slow-{i}"), async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        group.spawn(Policy::Fatal, "crawl", async { Err("boom".to_string()) });
        assert!(group.wait().await.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_abort_cancels_remaining_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::<String>::new(OnFatal::Abort);
        for i in 0..4 {
            let finished = finished.clone();
            group.spawn(Policy::Report, format!("stuck-{i}"), async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        group.spawn(Policy::Fatal, "source", async { Err("clone failed".to_string()) });
        let fatal = tokio::time::timeout(Duration::from_secs(5), group.wait()).await.unwrap().unwrap_err();
        assert_eq!(fatal.label(), "source");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_only_first_fatal_is_kept() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut group = TaskGroup::<String>::new(OnFatal::Drain);
        group.spawn(Policy::Fatal, "first", async { Err("first".to_string()) });
        group.spawn(Policy::Fatal, "second", async move {
            let _ = rx.await;
            Err("second".to_string())
        });
        group.join_next().await.unwrap();
        assert!(group.has_fatal());
        tx.send(()).unwrap();
        assert_eq!(group.wait().await.unwrap_err().label(), "first");
    }
}
