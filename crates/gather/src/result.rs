use media_signature::ImageHash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

/// Signatures gathered for one image object.
///
/// Serialises with PascalCase field names, the shape downstream record
/// construction consumes:
///
/// ```json
/// {"Path":"2019/a.jpg","MimeType":"image/jpeg","Fingerprint":"…","ImageHashes":[{"Approach":"avg","Hash":"a:…"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatherResult {
    /// Key of the object within the crawled container.
    pub path: PathBuf,
    pub mime_type: String,
    pub fingerprint: String,
    pub image_hashes: Vec<ImageHash>,
    /// Only present when text extraction is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "lossy_text")]
    pub image_text: Option<Vec<u8>>,
}

impl GatherResult {
    /// The hash produced by `approach`, if it succeeded.
    pub fn image_hash(&self, approach: media_signature::Approach) -> Option<&str> {
        self.image_hashes.iter().find(|h| h.approach == approach).map(|h| h.hash.as_str())
    }
}

/// Extracted text is usually UTF-8 but nothing guarantees it.
mod lossy_text {
    use super::*;

    pub fn serialize<S: Serializer>(text: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        text.as_deref().map(String::from_utf8_lossy).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(String::into_bytes))
    }
}
