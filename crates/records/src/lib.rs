//! Corpus records that are rewritten in place.
//!
//! Records live in a storage container under the nested id layout produced
//! by [`id_to_rel_path`]. Every change goes through [`RecordStore::update`],
//! which holds one lock from the read until the write has landed so that two
//! changes to the same corpus can never interleave.

pub mod error;
mod export;
mod path;
mod store;

pub use self::export::{Exporter, PrettyJson};
pub use self::path::id_to_rel_path;
pub use self::store::{RecordStore, deprecate_record};

/// Numeric identifier of a corpus record.
pub type RecordId = i64;
