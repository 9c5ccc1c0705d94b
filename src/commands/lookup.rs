use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::ResultExt;
use media_config::{Config, LookupConfig};
use media_lookup::source::{GitSource, StorageSource};
use media_lookup::{ConflictPolicy, ExtractionRule, Lookup, LookupBuilder};
use media_storage::BackendCache;
use std::io::Write;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct LookupArgs {
    /// Git repository of existing records. Repeatable; added to the
    /// configured repositories.
    #[arg(long = "repository", value_name = "URL")]
    pub repositories: Vec<String>,

    /// Container of existing records. Repeatable; added to the configured
    /// containers.
    #[arg(long = "container", value_name = "URI")]
    pub containers: Vec<String>,

    /// Extraction rule (`fingerprint`, `imagehash:<approach>`). Repeat for
    /// several; replaces the configured rules.
    #[arg(long = "rule", value_name = "RULE")]
    pub rules: Vec<ExtractionRule>,

    /// Fail on the first signature claimed by two different records.
    #[arg(long)]
    pub strict: bool,
}

impl LookupArgs {
    /// Build the lookup from every configured and requested source.
    pub async fn build(&self, config: &LookupConfig, cache: &BackendCache, cancel: CancellationToken) -> Result<Lookup> {
        let rules = if self.rules.is_empty() { &config.rules } else { &self.rules };
        let policy = if self.strict { ConflictPolicy::Strict } else { config.conflicts };

        let mut builder = LookupBuilder::new(rules.iter().cloned()).policy(policy);
        for url in config.repositories.iter().chain(&self.repositories) {
            builder = builder.source(GitSource::new(url.clone()));
        }
        for uri in config.containers.iter().chain(&self.containers) {
            let backend = cache.get_or_open(uri).await.or_raise(|| ErrorKind::Open(uri.clone()))?;
            builder = builder.source(StorageSource::new(backend));
        }

        let lookup = builder.build(cancel).await.or_raise(|| ErrorKind::Lookup)?;
        if !lookup.is_complete() {
            tracing::warn!(signatures = lookup.len(), "Lookup build interrupted, index is partial");
        }
        Ok(lookup)
    }
}

pub async fn run(args: LookupArgs, config: &Config, cache: &BackendCache, cancel: CancellationToken) -> Result<ExitCode> {
    let lookup = args.build(&config.lookup, cache, cancel).await?;
    let json = serde_json::to_string_pretty(&lookup.to_sorted()).or_raise(|| ErrorKind::Output)?;
    writeln!(std::io::stdout().lock(), "{json}").or_raise(|| ErrorKind::Output)?;

    tracing::info!(signatures = lookup.len(), conflicts = lookup.conflicts().len(), "Lookup built");
    Ok(if lookup.is_complete() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
