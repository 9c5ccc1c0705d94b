use crate::commands::print_json_line;
use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::ResultExt;
use media_config::{Config, GatherConfig};
use media_gather::{CommandExtractor, GatherResult, Gatherer};
use media_signature::{Approach, FingerprintAlgorithm, SignatureEngine};
use media_storage::BackendCache;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct GatherArgs {
    /// Container to crawl: an absolute path, `file://` or `s3://` URI.
    pub uri: String,

    /// Only crawl beneath this key.
    #[arg(long)]
    pub prefix: Option<PathBuf>,

    /// Perceptual hash to compute (`avg`, `diff`, `phash`). Repeat for
    /// several; replaces the configured approaches.
    #[arg(long = "approach", value_name = "APPROACH")]
    pub approaches: Vec<Approach>,

    /// Content digest used as the fingerprint (`sha1`, `blake3`).
    #[arg(long)]
    pub fingerprint: Option<FingerprintAlgorithm>,

    /// Skip text extraction even when it is configured.
    #[arg(long)]
    pub no_text: bool,
}

impl GatherArgs {
    /// A gatherer for the container, command line options taking
    /// precedence over configuration.
    pub async fn gatherer(&self, config: &GatherConfig, cache: &BackendCache) -> Result<Gatherer> {
        let backend = cache.get_or_open(&self.uri).await.or_raise(|| ErrorKind::Open(self.uri.clone()))?;
        let approaches = if self.approaches.is_empty() { &config.approaches } else { &self.approaches };
        let engine = SignatureEngine::new(self.fingerprint.unwrap_or(config.fingerprint), approaches.iter().copied());

        let mut gatherer = Gatherer::new(backend, engine);
        if let Some(prefix) = self.prefix.as_ref().or(config.prefix.as_ref()) {
            gatherer = gatherer.with_prefix(prefix.clone());
        }
        if !self.no_text
            && let Some(text) = &config.text
        {
            let extractor =
                CommandExtractor::discover(&text.program, text.args.clone()).or_raise(|| ErrorKind::Extractor)?;
            gatherer = gatherer.with_extractor(extractor);
        }
        Ok(gatherer)
    }
}

pub async fn run(args: GatherArgs, config: &Config, cache: &BackendCache, cancel: CancellationToken) -> Result<ExitCode> {
    let gatherer = args.gatherer(&config.gather, cache).await?;
    let summary = gatherer
        .dispatch(
            |result: GatherResult| async move {
                print_json_line(&result)
                    .or_raise(|| media_gather::error::ErrorKind::Handler(result.path.clone()))
            },
            cancel,
        )
        .await
        .or_raise(|| ErrorKind::Gather)?;

    tracing::info!(images = summary.dispatched, failed = summary.failed, "Gathered");
    Ok(match summary.failed {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
