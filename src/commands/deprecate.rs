use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::ResultExt;
use media_asyncutils::{OnFatal, Policy, TaskGroup};
use media_records::{RecordId, RecordStore};
use media_storage::BackendCache;
use std::process::ExitCode;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct DeprecateArgs {
    /// Container holding the records.
    pub uri: String,

    /// Records to deprecate.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<RecordId>,

    /// Log what would be written instead of writing it.
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: DeprecateArgs, cache: &BackendCache, cancel: CancellationToken) -> Result<ExitCode> {
    let backend = cache.get_or_open(&args.uri).await.or_raise(|| ErrorKind::Open(args.uri.clone()))?;
    let store = Arc::new(if args.dry_run { RecordStore::dry_run(backend) } else { RecordStore::new(backend) });
    let now = OffsetDateTime::now_utc();

    // Updates serialise on the store's lock; failures are reported per record.
    let mut tasks = TaskGroup::<media_records::error::Error>::new(OnFatal::Drain);
    for id in args.ids {
        if cancel.is_cancelled() {
            break;
        }
        let store = store.clone();
        tasks.spawn(Policy::Report, id.to_string(), async move { store.deprecate(id, now).await.map(|_| ()) });
    }

    let summary = match tasks.wait().await {
        Ok(summary) => summary,
        Err(fatal) => exn::bail!(ErrorKind::Task(fatal.label().to_string())),
    };
    tracing::info!(deprecated = summary.succeeded, failed = summary.reported, dry_run = args.dry_run, "Deprecated records");
    Ok(match summary.reported {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
