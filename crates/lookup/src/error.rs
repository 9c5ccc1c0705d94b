//! Lookup Error Types

use crate::OwnerId;
use derive_more::{Display, Error};

/// A lookup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lookup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// Two records claim the same signature (strict builds only).
    #[display("signature {signature} already belongs to {existing}, also claimed by {incoming} in {locator} ({source})")]
    Conflict {
        #[error(not(source))]
        signature: String,
        #[error(not(source))]
        existing: OwnerId,
        #[error(not(source))]
        incoming: OwnerId,
        /// Name of the source holding the rejected claim.
        #[error(not(source))]
        source: String,
        /// Document holding the rejected claim.
        #[error(not(source))]
        locator: String,
    },
    /// A source failed to produce its documents.
    #[display("lookup source failed: {_0}")]
    Source(#[error(not(source))] String),
    /// An extraction rule could not be parsed.
    #[display("invalid extraction rule: {_0}")]
    InvalidRule(#[error(not(source))] String),
    #[display("git executable not found")]
    GitNotFound,
    #[display("git failed: {_0}")]
    GitFailed(#[error(not(source))] String),
    /// The git object stream did not match the batch format.
    #[display("malformed git object stream: {_0}")]
    GitProtocol(#[error(not(source))] String),
    Storage,
    Io,
    #[display("source task panicked: {_0}")]
    Panicked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Source(_) | Self::GitFailed(_) | Self::Storage | Self::Io)
    }
}
