//! Gathering images from a storage container.
//!
//! A [`Gatherer`] walks a container, keeps the objects whose extension maps
//! to an `image/*` MIME type, and computes a [`GatherResult`] for each of
//! them. [`Gatherer::crawl`] exposes the results as a stream;
//! [`Gatherer::dispatch`] hands every result to a [`Handler`] on its own task.

mod crawl;
mod dispatch;
pub mod error;
mod mime;
mod result;
mod text;

pub use crate::crawl::Gatherer;
pub use crate::dispatch::{DispatchSummary, Handler};
pub use crate::mime::{is_image, mime_type};
pub use crate::result::GatherResult;
pub use crate::text::{CommandExtractor, TextExtractor};
