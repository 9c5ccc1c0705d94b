//! Exact-content fingerprints.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Digest used for the content fingerprint.
///
/// Corpus records store SHA-1 fingerprints, so that is the default; BLAKE3 is
/// available for containers that are never compared against them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    #[default]
    Sha1,
    Blake3,
}

impl FingerprintAlgorithm {
    /// Lower-case hex digest of `data`.
    ///
    /// ```
    /// use media_signature::FingerprintAlgorithm;
    /// assert_eq!(
    ///     FingerprintAlgorithm::Sha1.digest(b"abc"),
    ///     "a9993e364706816aba3e25717850c26c9cd0d89d",
    /// );
    /// ```
    pub fn digest(&self, data: &[u8]) -> String {
        match self {
            Self::Sha1 => hex::encode(Sha1::digest(data)),
            Self::Blake3 => blake3::hash(data).to_hex().to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for FingerprintAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FingerprintAlgorithm {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "blake3" => Ok(Self::Blake3),
            _ => Err(ErrorKind::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sha1(FingerprintAlgorithm::Sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709")]
    #[case::blake3(FingerprintAlgorithm::Blake3, "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262")]
    fn test_empty_input(#[case] algorithm: FingerprintAlgorithm, #[case] expected: &str) {
        assert_eq!(algorithm.digest(b""), expected);
    }

    #[test]
    fn test_identical_bytes_identical_fingerprint() {
        let a = vec![7u8; 4096];
        let b = a.clone();
        assert_eq!(FingerprintAlgorithm::Sha1.digest(&a), FingerprintAlgorithm::Sha1.digest(&b));
        assert_ne!(FingerprintAlgorithm::Sha1.digest(&a), FingerprintAlgorithm::Sha1.digest(&a[1..]));
    }

    #[test]
    fn test_parse() {
        assert_eq!("SHA1".parse::<FingerprintAlgorithm>().unwrap(), FingerprintAlgorithm::Sha1);
        assert_eq!("blake3".parse::<FingerprintAlgorithm>().unwrap(), FingerprintAlgorithm::Blake3);
        assert_eq!(
            "md5".parse::<FingerprintAlgorithm>().unwrap_err(),
            ErrorKind::UnknownAlgorithm("md5".to_string())
        );
    }
}
