//! Fingerprint and perceptual hashes for one object.
//!
//! The fingerprint is computed over the raw bytes and is the only result
//! that can fail the computation. Perceptual hashes need a decoded image;
//! decode failures and failed approaches are collected as [`HashFailure`]s
//! and their slots are left out of [`Signatures::hashes`].

use crate::error::{ErrorKind, Result};
use crate::{Approach, FingerprintAlgorithm, ImageHash};
use exn::ResultExt;
use image::DynamicImage;
use std::sync::Arc;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio_util::sync::CancellationToken;

/// A perceptual hash that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFailure {
    /// `None` when the image itself could not be decoded.
    pub approach: Option<Approach>,
    pub message: String,
}

/// Everything the engine computed for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signatures {
    pub fingerprint: String,
    /// In configured approach order.
    pub hashes: Vec<ImageHash>,
    pub failures: Vec<HashFailure>,
}

/// Computes [`Signatures`] for object contents.
///
/// # Examples
///
/// ```
/// use media_signature::{Approach, FingerprintAlgorithm, SignatureEngine};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> media_signature::error::Result<()> {
/// let engine = SignatureEngine::new(FingerprintAlgorithm::Sha1, Approach::DEFAULT);
/// let signatures = engine.compute(b"not an image".to_vec(), &CancellationToken::new()).await?;
/// assert_eq!(signatures.fingerprint.len(), 40);
/// assert!(signatures.hashes.is_empty());
/// assert_eq!(signatures.failures.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SignatureEngine {
    algorithm: FingerprintAlgorithm,
    approaches: Arc<[Approach]>,
}

impl Default for SignatureEngine {
    fn default() -> Self {
        Self::new(FingerprintAlgorithm::default(), Approach::DEFAULT)
    }
}

impl SignatureEngine {
    /// Duplicate approaches are dropped, keeping the first occurrence.
    pub fn new(algorithm: FingerprintAlgorithm, approaches: impl IntoIterator<Item = Approach>) -> Self {
        let mut unique: Vec<Approach> = Vec::new();
        for approach in approaches {
            if !unique.contains(&approach) {
                unique.push(approach);
            }
        }
        Self { algorithm, approaches: unique.into() }
    }

    pub fn algorithm(&self) -> FingerprintAlgorithm {
        self.algorithm
    }

    pub fn approaches(&self) -> &[Approach] {
        &self.approaches
    }

    /// Fingerprint `data` and hash it with every configured approach.
    ///
    /// Cancellation skips approaches that have not started yet; approaches
    /// already running are left to finish. Fails only when the fingerprint
    /// task does not complete.
    pub async fn compute(&self, data: Vec<u8>, cancel: &CancellationToken) -> Result<Signatures> {
        let data: Arc<[u8]> = data.into();
        let algorithm = self.algorithm;
        let fingerprint = spawn_blocking({
            let data = data.clone();
            move || algorithm.digest(&data)
        });
        let decoded = spawn_blocking(move || image::load_from_memory(&data));

        let mut failures = Vec::new();
        let hashes = match decoded.await {
            Ok(Ok(image)) => self.hash_all(Arc::new(image), cancel, &mut failures).await,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Failed to decode image, skipping perceptual hashes");
                failures.push(HashFailure { approach: None, message: err.to_string() });
                Vec::new()
            },
            Err(err) => {
                tracing::error!(error = %err, "Image decoding task failed");
                failures.push(HashFailure { approach: None, message: err.to_string() });
                Vec::new()
            },
        };

        let fingerprint = fingerprint.await.or_raise(|| ErrorKind::Fingerprint)?;
        Ok(Signatures { fingerprint, hashes, failures })
    }

    async fn hash_all(
        &self,
        image: Arc<DynamicImage>,
        cancel: &CancellationToken,
        failures: &mut Vec<HashFailure>,
    ) -> Vec<ImageHash> {
        let mut running: Vec<(Approach, JoinHandle<Option<ImageHash>>)> = Vec::with_capacity(self.approaches.len());
        for &approach in self.approaches.iter() {
            if cancel.is_cancelled() {
                tracing::debug!(approach = %approach, "Cancelled before hashing");
                continue;
            }
            let image = image.clone();
            let cancel = cancel.clone();
            let handle = spawn_blocking(move || {
                // The blocking pool may be saturated; look again once scheduled.
                if cancel.is_cancelled() {
                    return None;
                }
                Some(approach.hash(&image))
            });
            running.push((approach, handle));
        }

        let mut hashes = Vec::with_capacity(running.len());
        for (approach, handle) in running {
            match handle.await {
                Ok(Some(hash)) => hashes.push(hash),
                Ok(None) => {},
                Err(err) => {
                    tracing::warn!(approach = %approach, error = %err, "Image hash approach failed");
                    failures.push(HashFailure { approach: Some(approach), message: err.to_string() });
                },
            }
        }
        hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(seed: u8) -> Vec<u8> {
        let image = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8 ^ seed, (y * 8) as u8, seed]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[tokio::test]
    async fn test_hashes_follow_configured_order() {
        let engine = SignatureEngine::new(
            FingerprintAlgorithm::Sha1,
            [Approach::Perceptual, Approach::Average, Approach::Perceptual, Approach::Difference],
        );
        assert_eq!(engine.approaches(), &[Approach::Perceptual, Approach::Average, Approach::Difference]);

        let signatures = engine.compute(png_bytes(1), &CancellationToken::new()).await.unwrap();
        let approaches: Vec<_> = signatures.hashes.iter().map(|h| h.approach).collect();
        assert_eq!(approaches, engine.approaches());
        assert!(signatures.failures.is_empty());
    }

    #[tokio::test]
    async fn test_fingerprint_survives_decode_failure() {
        let engine = SignatureEngine::default();
        let data = b"\x89PNG\r\n\x1a\ntruncated".to_vec();
        let expected = FingerprintAlgorithm::Sha1.digest(&data);
        let signatures = engine.compute(data, &CancellationToken::new()).await.unwrap();
        assert_eq!(signatures.fingerprint, expected);
        assert!(signatures.hashes.is_empty());
        assert_eq!(signatures.failures.len(), 1);
        assert_eq!(signatures.failures[0].approach, None);
    }

    #[tokio::test]
    async fn test_identical_bytes_identical_signatures() {
        let engine = SignatureEngine::default();
        let cancel = CancellationToken::new();
        let a = engine.compute(png_bytes(3), &cancel).await.unwrap();
        let b = engine.compute(png_bytes(3), &cancel).await.unwrap();
        let c = engine.compute(png_bytes(4), &cancel).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[tokio::test]
    async fn test_cancelled_engine_still_fingerprints() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let signatures = SignatureEngine::default().compute(png_bytes(5), &cancel).await.unwrap();
        assert_eq!(signatures.fingerprint.len(), 40);
        assert!(signatures.hashes.is_empty());
        assert!(signatures.failures.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blake3_fingerprint() {
        let engine = SignatureEngine::new(FingerprintAlgorithm::Blake3, [Approach::Average]);
        let signatures = engine.compute(png_bytes(6), &CancellationToken::new()).await.unwrap();
        assert_eq!(signatures.fingerprint.len(), 64);
        assert_eq!(signatures.hashes.len(), 1);
        assert!(signatures.hashes[0].hash.starts_with("a:"));
    }
}
