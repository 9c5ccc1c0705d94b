//! Gather Error Types
//!
//! Every error raised while gathering a single object carries that object's
//! key, so a failed crawl says which object stopped it.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A gather error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for gather operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The container could not be listed.
    #[display("failed to list storage container")]
    Listing,
    #[display("failed to read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("failed to compute signatures for {}", _0.display())]
    Signature(#[error(not(source))] PathBuf),
    #[display("failed to extract text from {}", _0.display())]
    TextExtraction(#[error(not(source))] PathBuf),
    /// The configured text extraction program is not installed.
    #[display("text extraction program not found: {_0}")]
    ExtractorNotFound(#[error(not(source))] String),
    /// The text extraction program ran but did not succeed.
    #[display("text extraction program exited with {_0}")]
    ExtractorFailed(#[error(not(source))] String),
    /// Raised by [`Handler`](crate::Handler) implementations.
    #[display("handler failed for {}", _0.display())]
    Handler(#[error(not(source))] PathBuf),
    /// A task of the gathering pipeline panicked.
    #[display("task panicked: {_0}")]
    Panicked(#[error(not(source))] String),
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Listing | Self::Read(_))
    }
}
