//! Signature Error Types

use derive_more::{Display, Error};

/// A signature error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for signature operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration named a perceptual-hash approach that does not exist.
    #[display("unknown image hash approach: {_0}")]
    UnknownApproach(#[error(not(source))] String),
    /// Configuration named a fingerprint algorithm that does not exist.
    #[display("unknown fingerprint algorithm: {_0}")]
    UnknownAlgorithm(#[error(not(source))] String),
    /// The fingerprint task itself did not complete.
    #[display("failed to compute fingerprint")]
    Fingerprint,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fingerprint)
    }
}
