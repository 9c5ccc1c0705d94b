pub mod backend;
mod cache;
pub mod error;
mod models;
mod path;
mod uri;

pub use crate::backend::{StorageBackend, walk};
pub use crate::cache::BackendCache;
pub use crate::models::{Entry, EntryKind};
pub use crate::path::{key as path_key, validate as validate_path};
pub use crate::uri::open;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
