//! Perceptual-hash approaches.

use crate::error::ErrorKind;
use image::DynamicImage;
use image::imageops::FilterType;
use image_hasher::{BitOrder, HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width and height of every perceptual hash, in bits.
const HASH_SIZE: u32 = 8;

/// A perceptual-hash approach.
///
/// Approaches are a closed set: configuration that names anything else is
/// rejected with [`ErrorKind::UnknownApproach`] when it is parsed, never when
/// an image is being hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Approach {
    /// Mean-threshold hash (`avg`).
    Average,
    /// Horizontal gradient hash (`diff`).
    Difference,
    /// DCT-based hash (`phash`).
    Perceptual,
}

impl Approach {
    pub const ALL: [Approach; 3] = [Self::Average, Self::Difference, Self::Perceptual];

    /// Approaches used when nothing is configured.
    pub const DEFAULT: [Approach; 2] = [Self::Average, Self::Difference];

    /// Name used in configuration, logs and record property names
    /// (`media:imagehash_<label>`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Difference => "diff",
            Self::Perceptual => "phash",
        }
    }

    /// Single-letter kind that prefixes every hash string.
    pub fn kind(&self) -> char {
        match self {
            Self::Average => 'a',
            Self::Difference => 'd',
            Self::Perceptual => 'p',
        }
    }

    /// Hash a decoded image. Pure CPU work: call from a blocking context.
    ///
    /// Images are shrunk with a bilinear filter and bits are written first
    /// pixel first, so average hashes line up with those already stored by
    /// goimagehash. Difference and perceptual hashes use different pixel
    /// comparisons there and will not match hashes from that library.
    pub fn hash(&self, image: &DynamicImage) -> ImageHash {
        let config = HasherConfig::new()
            .hash_size(HASH_SIZE, HASH_SIZE)
            .resize_filter(FilterType::Triangle)
            .bit_order(BitOrder::MsbFirst);
        let config = match self {
            Self::Average => config.hash_alg(HashAlg::Mean),
            Self::Difference => config.hash_alg(HashAlg::Gradient),
            Self::Perceptual => config.hash_alg(HashAlg::Mean).preproc_dct(),
        };
        let hash = config.to_hasher().hash_image(image);
        ImageHash {
            approach: *self,
            hash: format!("{}:{}", self.kind(), hex::encode(hash.as_bytes())),
        }
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Approach {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg" | "average" => Ok(Self::Average),
            "diff" | "difference" => Ok(Self::Difference),
            "phash" | "perceptual" => Ok(Self::Perceptual),
            _ => Err(ErrorKind::UnknownApproach(s.to_string())),
        }
    }
}

impl TryFrom<String> for Approach {
    type Error = ErrorKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Approach> for String {
    fn from(value: Approach) -> Self {
        value.label().to_string()
    }
}

/// One perceptual hash of an image, e.g. `a:ffd8c0c0e0f0f8fc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageHash {
    pub approach: Approach,
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use rstest::rstest;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width) as u8])))
    }

    #[rstest]
    #[case("avg", Approach::Average)]
    #[case("Difference", Approach::Difference)]
    #[case(" phash ", Approach::Perceptual)]
    fn test_parse(#[case] input: &str, #[case] expected: Approach) {
        assert_eq!(input.parse::<Approach>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_approach_is_config_error() {
        assert_eq!("ext".parse::<Approach>().unwrap_err(), ErrorKind::UnknownApproach("ext".to_string()));
        assert!(serde_json::from_str::<Approach>("\"wavelet\"").is_err());
    }

    #[test]
    fn test_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Approach::ALL).unwrap(), r#"["avg","diff","phash"]"#);
        let parsed: Vec<Approach> = serde_json::from_str(r#"["avg","diff"]"#).unwrap();
        assert_eq!(parsed, Approach::DEFAULT);
    }

    #[rstest]
    #[case(Approach::Average)]
    #[case(Approach::Difference)]
    #[case(Approach::Perceptual)]
    fn test_hash_format(#[case] approach: Approach) {
        let hash = approach.hash(&gradient(64, 64));
        assert_eq!(hash.approach, approach);
        let (kind, hex) = hash.hash.split_once(':').unwrap();
        assert_eq!(kind.chars().next(), Some(approach.kind()));
        // 8x8 bits
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_similar_images_share_average_hash() {
        let small = gradient(64, 64);
        let large = gradient(256, 256);
        assert_eq!(Approach::Average.hash(&small).hash, Approach::Average.hash(&large).hash);
    }

    #[test]
    fn test_average_hash_bits_start_at_top_left() {
        let halves = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 0 } else { 255 }])));
        assert_eq!(Approach::Average.hash(&halves).hash, "a:0f0f0f0f0f0f0f0f");
    }
}
