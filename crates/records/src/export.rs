use crate::RecordId;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde_json::Value;

/// Final formatting step applied to a record before it is written back.
///
/// Corpora usually have their own canonical serialisation (key order,
/// indentation, validation); plug it in here.
pub trait Exporter: Send + Sync {
    fn export(&self, id: RecordId, record: &Value) -> Result<Vec<u8>>;
}

/// Pretty-printed JSON with a trailing newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrettyJson;

impl Exporter for PrettyJson {
    fn export(&self, id: RecordId, record: &Value) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(record).or_raise(|| ErrorKind::Export(id))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
