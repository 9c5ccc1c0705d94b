//! Where record documents come from.

mod git;
mod storage;

pub use self::git::GitSource;
pub use self::storage::StorageSource;
use crate::error::Result;
use futures::Stream;
use std::pin::Pin;

pub type DocumentStream<'a> = Pin<Box<dyn Stream<Item = Result<SourceDocument>> + Send + 'a>>;

/// One serialised record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Where the document came from (an object key, a blob id), for logs.
    pub locator: String,
    pub body: Vec<u8>,
}

/// Anything that can produce a stream of record documents.
///
/// An error item is fatal to the build; sources should yield it and stop.
pub trait Source: Send + Sync {
    /// Label for logs and errors (usually the URI it was opened from).
    fn name(&self) -> &str;

    fn documents(&self) -> DocumentStream<'_>;
}
