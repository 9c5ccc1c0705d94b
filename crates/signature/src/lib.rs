mod approach;
mod engine;
pub mod error;
mod fingerprint;

pub use crate::approach::{Approach, ImageHash};
pub use crate::engine::{HashFailure, SignatureEngine, Signatures};
pub use crate::fingerprint::FingerprintAlgorithm;
