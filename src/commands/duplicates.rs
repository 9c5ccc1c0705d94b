use crate::commands::gather::GatherArgs;
use crate::commands::lookup::LookupArgs;
use crate::commands::print_json_line;
use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::ResultExt;
use media_config::Config;
use media_gather::GatherResult;
use media_lookup::{Lookup, OwnerId};
use media_storage::BackendCache;
use serde::Serialize;
use std::iter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct DuplicatesArgs {
    #[command(flatten)]
    pub gather: GatherArgs,
    #[command(flatten)]
    pub lookup: LookupArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Duplicate {
    path: PathBuf,
    signature: String,
    owner: OwnerId,
}

/// Every signature of `result` that some record already owns.
fn duplicates(lookup: &Lookup, result: &GatherResult) -> Vec<Duplicate> {
    let signatures = iter::once(result.fingerprint.as_str()).chain(result.image_hashes.iter().map(|h| h.hash.as_str()));
    lookup
        .matches(signatures)
        .into_iter()
        .map(|found| Duplicate { path: result.path.clone(), signature: found.signature, owner: found.owner })
        .collect()
}

pub async fn run(
    args: DuplicatesArgs,
    config: &Config,
    cache: &BackendCache,
    cancel: CancellationToken,
) -> Result<ExitCode> {
    let lookup = Arc::new(args.lookup.build(&config.lookup, cache, cancel.clone()).await?);
    if cancel.is_cancelled() {
        return Ok(ExitCode::FAILURE);
    }
    let gatherer = args.gather.gatherer(&config.gather, cache).await?;

    let summary = gatherer
        .dispatch(
            move |result: GatherResult| {
                let lookup = lookup.clone();
                async move {
                    for duplicate in duplicates(&lookup, &result) {
                        print_json_line(&duplicate)
                            .or_raise(|| media_gather::error::ErrorKind::Handler(result.path.clone()))?;
                    }
                    Ok::<(), media_gather::error::Error>(())
                }
            },
            cancel,
        )
        .await
        .or_raise(|| ErrorKind::Gather)?;

    tracing::info!(images = summary.dispatched, failed = summary.failed, "Compared against lookup");
    Ok(match summary.failed {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
