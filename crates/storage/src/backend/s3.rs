//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and others.
//!
//! Listing uses the `/` delimiter so that common prefixes come back as
//! containers, mirroring directories on the local backend.

use crate::{
    Entry, StorageBackend,
    backend::EntryStream,
    error::{ErrorKind, Result},
    path::validate_prefix,
    validate_path,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    primitives::{ByteStream, DateTime},
};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;
const DELIMITER: &str = "/";

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use media_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "s3://my-bucket/media",
///     "my-bucket",
///     Some("media/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as the container root)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = validate_prefix(prefix.as_deref().map(Path::new))?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        let credentials = Credentials::new(key_id, key_secret, None, None, "media-storage");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, path: &Path) -> Result<String> {
        let validated = crate::path_key(validate_path(path)?);
        Ok(self.prefixed(&validated))
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{DELIMITER}{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }

    /// The S3 listing prefix for a container: always ends with the
    /// delimiter, or is absent for the bucket root.
    fn container_key(&self, container: Option<&Path>) -> Result<Option<String>> {
        Ok(match (validate_prefix(container)?, &self.prefix) {
            (Some(container), _) => Some(format!("{}{DELIMITER}", self.prefixed(&crate::path_key(container)))),
            (None, Some(prefix)) => Some(format!("{}{DELIMITER}", prefix.trim_end_matches('/'))),
            (None, None) => None,
        })
    }

    /// The relative key of a listed S3 key, or `None` (logged) when it
    /// cannot be addressed as a relative key. `a//b.jpg` and `./a.jpg` are
    /// legal S3 keys but normalise to different keys.
    fn listed_path(&self, key: &str) -> Option<PathBuf> {
        let relative = match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.trim_end_matches('/')).and_then(|s| s.strip_prefix(DELIMITER)),
            None => Some(key),
        };
        match relative.map(|relative| (relative, validate_path(relative))) {
            Some((relative, Ok(path))) if crate::path_key(&path) == relative => Some(path),
            _ => {
                tracing::warn!(backend = %self.name, key, "Skipping S3 key that is not a normalised relative key");
                None
            },
        }
    }

    /// The container named by a common prefix, which ends with exactly one
    /// delimiter.
    fn listed_container(&self, common_prefix: &str) -> Option<PathBuf> {
        self.listed_path(common_prefix.strip_suffix(DELIMITER).unwrap_or(common_prefix))
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    async fn list_page(
        &self,
        container: Option<String>,
        token: Option<String>,
    ) -> Result<(Vec<Entry>, Option<String>)> {
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(container.clone())
            .delimiter(DELIMITER)
            .set_continuation_token(token)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to list {}", container.as_deref().unwrap_or("/"))))?;

        let mut entries = Vec::new();
        for common in output.common_prefixes() {
            if let Some(path) = common.prefix().and_then(|prefix| self.listed_container(prefix)) {
                entries.push(Entry::container(path));
            }
        }
        for object in output.contents() {
            let Some(key) = object.key() else { continue };
            // Zero-byte "directory marker" objects some tools create.
            if key.ends_with('/') {
                continue;
            }
            let modified = match object.last_modified() {
                Some(dt) => Self::parse_datetime(dt)?,
                None => OffsetDateTime::UNIX_EPOCH,
            };
            let Some(path) = self.listed_path(key) else { continue };
            let size = u64::try_from(object.size().unwrap_or(0)).unwrap_or(0);
            entries.push(Entry::object(path, size, modified));
        }
        Ok((entries, output.next_continuation_token().map(str::to_string)))
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> EntryStream<'a> {
        let container = match self.container_key(prefix) {
            Ok(container) => container,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream! {
            let mut token = None;
            loop {
                let (entries, next) = match self.list_page(container.clone(), token.take()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                for entry in entries {
                    yield Ok(entry);
                }
                match next {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(e).or_raise(|| ErrorKind::Network(format!("failed to check {key}"))),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Network(format!("failed to read {key}"))),
        };
        let body = output.body.collect().await.or_raise(|| ErrorKind::Network(format!("failed to read {key}")))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to write {key}")))?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        // S3 deletes are idempotent; check first to honour the NotFound contract.
        if !self.exists(path).await? {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to delete {key}")))?;
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<Entry> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Network(format!("failed to stat {key}"))),
        };
        let modified = match output.last_modified() {
            Some(dt) => Self::parse_datetime(dt)?,
            None => OffsetDateTime::UNIX_EPOCH,
        };
        let size = u64::try_from(output.content_length().unwrap_or(0)).unwrap_or(0);
        Ok(Entry::object(validate_path(path)?, size, modified))
    }
}
