//! Records from a git repository.
//!
//! The repository is cloned bare into a temporary directory, then every
//! object in it is streamed through `git cat-file --batch`. Every blob is
//! yielded, whatever path it lives at and whichever commit introduced it,
//! so historical versions of records are seen too.

use super::{DocumentStream, Source, SourceDocument};
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// A git repository, by URL or local path.
pub struct GitSource {
    url: String,
}

impl GitSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn git() -> Result<PathBuf> {
        which::which("git").or_raise(|| ErrorKind::GitNotFound)
    }

    async fn clone_bare(&self, git: &Path, into: &Path) -> Result<()> {
        tracing::info!(url = %self.url, "Cloning repository");
        let output = Command::new(git)
            .args(["clone", "--bare", "--quiet", "--"])
            .arg(&self.url)
            .arg(into)
            .kill_on_drop(true)
            .output()
            .await
            .or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            exn::bail!(ErrorKind::GitFailed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(())
    }
}

/// Header line of one `cat-file --batch` record: `<oid> <type> <size>`, or
/// `<oid> missing`.
#[derive(Debug, PartialEq, Eq)]
struct ObjectHeader {
    oid: String,
    kind: String,
    size: usize,
}

async fn read_header<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<ObjectHeader>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.or_raise(|| ErrorKind::Io)? == 0 {
        return Ok(None);
    }
    let mut fields = line.split_whitespace();
    let oid = fields.next().ok_or_raise(|| ErrorKind::GitProtocol(line.clone()))?.to_string();
    let kind = fields.next().ok_or_raise(|| ErrorKind::GitProtocol(line.clone()))?.to_string();
    let size = match fields.next() {
        Some(size) => size.parse::<usize>().or_raise(|| ErrorKind::GitProtocol(line.clone()))?,
        None if kind == "missing" => 0,
        None => exn::bail!(ErrorKind::GitProtocol(line)),
    };
    Ok(Some(ObjectHeader { oid, kind, size }))
}

/// Object contents followed by the terminating newline.
async fn read_body<R: AsyncBufRead + Unpin>(reader: &mut R, size: usize) -> Result<Vec<u8>> {
    let mut body = vec![0; size + 1];
    reader.read_exact(&mut body).await.or_raise(|| ErrorKind::GitProtocol("truncated object".to_string()))?;
    body.truncate(size);
    Ok(body)
}

/// Every blob in the bare repository at `repository`.
///
/// Standard error is drained on its own task while objects are read, and
/// becomes the [`GitFailed`](ErrorKind::GitFailed) message if `git` exits
/// unsuccessfully.
fn blobs(git: PathBuf, repository: PathBuf) -> impl Stream<Item = Result<SourceDocument>> + Send {
    stream!({
        let child = Command::new(&git)
            .arg("--git-dir")
            .arg(&repository)
            .args(["cat-file", "--batch-all-objects", "--batch", "--unordered"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .or_raise(|| ErrorKind::Io);
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let (Some(stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            yield Err(exn::Exn::from(ErrorKind::GitProtocol("missing standard streams".to_string())));
            return;
        };
        let errors = tokio::spawn(async move {
            let mut message = Vec::new();
            // A read error only loses the diagnostic, not the objects.
            let _ = stderr.read_to_end(&mut message).await;
            message
        });

        let mut reader = BufReader::new(stdout);
        let mut count = 0usize;
        loop {
            let header = match read_header(&mut reader).await {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            if header.kind == "missing" {
                continue;
            }
            let body = match read_body(&mut reader, header.size).await {
                Ok(body) => body,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            if header.kind == "blob" {
                count += 1;
                yield Ok(SourceDocument { locator: header.oid, body });
            }
        }

        let status = match child.wait().await.or_raise(|| ErrorKind::Io) {
            Ok(status) => status,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        if status.success() {
            tracing::debug!(repository = %repository.display(), blobs = count, "Finished reading repository objects");
            return;
        }
        let message = errors.await.unwrap_or_default();
        yield Err(exn::Exn::from(ErrorKind::GitFailed(String::from_utf8_lossy(&message).trim().to_string())));
    })
}

impl Source for GitSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn documents(&self) -> DocumentStream<'_> {
        Box::pin(stream!({
            let git = match Self::git() {
                Ok(git) => git,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            // Removed on drop, once the stream is finished with.
            let checkout = match tempfile::Builder::new().prefix("media-lookup-").tempdir().or_raise(|| ErrorKind::Io) {
                Ok(dir) => dir,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let repository = checkout.path().join("repository.git");
            if let Err(e) = self.clone_bare(&git, &repository).await {
                yield Err(e);
                return;
            }

            for await document in blobs(git, repository) {
                yield document;
            }
        }))
    }
}
