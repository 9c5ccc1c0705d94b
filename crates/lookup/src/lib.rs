//! Lookup index of signatures already present in a corpus.
//!
//! A [`LookupBuilder`] pulls record documents from any number of
//! [`Source`]s concurrently, extracts `(signature, owner)` pairs from each
//! with every [`ExtractionRule`], and inserts them into one shared
//! [`SignatureIndex`]. A signature claimed by two different owners is a
//! [`Conflict`], which either fails the build or is recorded, depending on
//! the [`ConflictPolicy`].

mod builder;
mod document;
pub mod error;
mod index;
mod lookup;
mod rule;
pub mod source;

pub use crate::builder::{Conflict, ConflictPolicy, LookupBuilder};
pub use crate::document::{extract_owner, field};
pub use crate::index::{Insertion, SignatureIndex};
pub use crate::lookup::{Lookup, Match};
pub use crate::rule::ExtractionRule;
pub use crate::source::{Source, SourceDocument};

/// Identifier of the record that owns a signature.
pub type OwnerId = i64;
