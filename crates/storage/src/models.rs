//! Storage listing models.

use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// What a listed key refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A stored object with content.
    Object {
        /// Object size in bytes
        size: u64,
        /// Last modified timestamp
        modified: OffsetDateTime,
    },
    /// A directory-like key that groups further entries (a filesystem
    /// directory, or an S3 common prefix).
    Container,
}

/// One entry returned by a storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative key from storage root
    pub path: PathBuf,
    pub kind: EntryKind,
}
impl Entry {
    pub fn object(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Object { size, modified },
        }
    }

    pub fn container(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Container,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, EntryKind::Container)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Object size, `None` for containers.
    pub fn size(&self) -> Option<u64> {
        match self.kind {
            EntryKind::Object { size, .. } => Some(size),
            EntryKind::Container => None,
        }
    }
}
