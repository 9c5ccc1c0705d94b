//! Text extraction collaborator.
//!
//! Extraction itself is somebody else's problem: the gatherer only needs the
//! extracted bytes. [`CommandExtractor`] delegates to an external program.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Extracts text from an image object.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from `data`, the full contents of the object at `path`.
    async fn extract(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>>;
}

/// Runs an external program on a temporary copy of the object and returns
/// whatever it prints on standard output.
///
/// The copy's path is passed as the last argument, after any configured
/// arguments. It keeps the original extension since most OCR tools care.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect() }
    }

    /// Find `program` on `PATH`.
    pub fn discover(program: &str, args: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let path = which::which(program).or_raise(|| ErrorKind::ExtractorNotFound(program.to_string()))?;
        tracing::debug!(program = %path.display(), "Discovered text extraction program");
        Ok(Self::new(path, args))
    }
}

#[async_trait]
impl TextExtractor for CommandExtractor {
    async fn extract(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>> {
        let suffix = path.extension().and_then(|e| e.to_str()).map(|e| format!(".{e}")).unwrap_or_default();
        let copy = tempfile::Builder::new().prefix("media-").suffix(&suffix).tempfile().or_raise(|| ErrorKind::Io)?;
        tokio::fs::write(copy.path(), data).await.or_raise(|| ErrorKind::Io)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(copy.path())
            .kill_on_drop(true)
            .output()
            .await
            .or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            tracing::warn!(
                program = %self.program.display(),
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Text extraction failed"
            );
            exn::bail!(ErrorKind::ExtractorFailed(output.status.to_string()));
        }
        Ok(output.stdout)
    }
}
