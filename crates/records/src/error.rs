//! Record Error Types

use crate::RecordId;
use derive_more::{Display, Error};

/// A record error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// Record ids are strictly positive.
    #[display("invalid record id: {_0}")]
    InvalidId(#[error(not(source))] RecordId),
    #[display("could not read record {_0}")]
    Read(#[error(not(source))] RecordId),
    #[display("could not write record {_0}")]
    Write(#[error(not(source))] RecordId),
    /// The stored document is not JSON, or lacks a `properties` object.
    #[display("malformed record {id}: {reason}")]
    Malformed {
        #[error(not(source))]
        id: RecordId,
        #[error(not(source))]
        reason: String,
    },
    #[display("could not export record {_0}")]
    Export(#[error(not(source))] RecordId),
    #[display("could not format timestamp")]
    Timestamp,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Write(_))
    }
}
