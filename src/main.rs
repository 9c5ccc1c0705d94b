//! `media`: gather image signatures from a storage container and
//! cross-reference them against the records of an existing corpus.

mod commands;
mod error;

use crate::commands::{deprecate, duplicates, gather, lookup};
use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser, Subcommand};
use exn::ResultExt;
use media_config::Config;
use media_storage::BackendCache;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "media", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON). Defaults to `config.toml`
    /// in the per-user configuration directory, when present.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (`-v` debug, `-vv` trace). Overrides `RUST_LOG`.
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a container and print the signatures of every image, one JSON
    /// document per line.
    Gather(gather::GatherArgs),
    /// Build the signature lookup of an existing corpus and print it.
    Lookup(lookup::LookupArgs),
    /// Crawl a container and print every image whose signature already
    /// belongs to a record in the corpus.
    Duplicates(duplicates::DuplicatesArgs),
    /// Mark records as deprecated.
    Deprecate(deprecate::DeprecateArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    match run(cli, cancel).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let cache = BackendCache::new();
    match cli.command {
        Command::Gather(args) => gather::run(args, &config, &cache, cancel).await,
        Command::Lookup(args) => lookup::run(args, &config, &cache, cancel).await,
        Command::Duplicates(args) => duplicates::run(args, &config, &cache, cancel).await,
        Command::Deprecate(args) => deprecate::run(args, &cache, cancel).await,
    }
}

/// Logs go to stderr so that stdout only carries results.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupted, finishing in-flight work");
        cancel.cancel();
    }
}
