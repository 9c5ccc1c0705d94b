use crate::OwnerId;
use crate::document::{extract_owner, field};
use crate::error::ErrorKind;
use media_signature::Approach;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const ID_PATH: &str = "properties.wof:id";
const FINGERPRINT_PATH: &str = "properties.media:fingerprint";
const IMAGE_HASH_PREFIX: &str = "properties.media:imagehash_";

/// Which pair of fields identifies a signature and its owner in a record.
///
/// Presets are written as strings: `fingerprint`, or `imagehash:<approach>`
/// (`imagehash` alone means the average hash). Custom rules are given as a
/// table with all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleSpec")]
pub struct ExtractionRule {
    pub name: String,
    /// Dotted path to the owner identifier.
    pub id_path: String,
    /// Dotted path to the signature string.
    pub signature_path: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleSpec {
    Preset(String),
    Custom { name: String, id_path: String, signature_path: String },
}

impl ExtractionRule {
    pub fn new(name: impl Into<String>, id_path: impl Into<String>, signature_path: impl Into<String>) -> Self {
        Self { name: name.into(), id_path: id_path.into(), signature_path: signature_path.into() }
    }

    /// `properties.wof:id` → `properties.media:fingerprint`.
    pub fn fingerprint() -> Self {
        Self::new("fingerprint", ID_PATH, FINGERPRINT_PATH)
    }

    /// `properties.wof:id` → `properties.media:imagehash_<label>`.
    pub fn image_hash(approach: Approach) -> Self {
        Self::new(format!("imagehash:{approach}"), ID_PATH, format!("{IMAGE_HASH_PREFIX}{}", approach.label()))
    }

    /// Extract `(signature, owner)` from a record. `None` when either field
    /// is missing or has the wrong type; such records are skipped.
    ///
    /// ```
    /// use media_lookup::ExtractionRule;
    /// let doc = serde_json::json!({"properties": {"wof:id": 1, "media:fingerprint": "abc"}});
    /// assert_eq!(ExtractionRule::fingerprint().extract(&doc), Some(("abc".to_string(), 1)));
    /// ```
    pub fn extract(&self, document: &Value) -> Option<(String, OwnerId)> {
        let owner = field(document, &self.id_path).and_then(extract_owner)?;
        let signature = field(document, &self.signature_path)?.as_str()?;
        if signature.is_empty() {
            return None;
        }
        Some((signature.to_string(), owner))
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for ExtractionRule {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            None if s.trim() == "fingerprint" => Ok(Self::fingerprint()),
            None if s.trim() == "imagehash" => Ok(Self::image_hash(Approach::Average)),
            Some(("imagehash", approach)) => approach
                .parse()
                .map(Self::image_hash)
                .map_err(|_| ErrorKind::InvalidRule(s.to_string())),
            _ => Err(ErrorKind::InvalidRule(s.to_string())),
        }
    }
}

impl TryFrom<RuleSpec> for ExtractionRule {
    type Error = ErrorKind;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        match spec {
            RuleSpec::Preset(preset) => preset.parse(),
            RuleSpec::Custom { name, id_path, signature_path } => {
                if id_path.is_empty() || signature_path.is_empty() {
                    return Err(ErrorKind::InvalidRule(name));
                }
                Ok(Self::new(name, id_path, signature_path))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("fingerprint", FINGERPRINT_PATH)]
    #[case("imagehash", "properties.media:imagehash_avg")]
    #[case("imagehash:avg", "properties.media:imagehash_avg")]
    #[case("imagehash:diff", "properties.media:imagehash_diff")]
    #[case("imagehash:phash", "properties.media:imagehash_phash")]
    fn test_presets(#[case] input: &str, #[case] signature_path: &str) {
        let rule: ExtractionRule = input.parse().unwrap();
        assert_eq!(rule.id_path, ID_PATH);
        assert_eq!(rule.signature_path, signature_path);
    }

    #[rstest]
    #[case("imagehash:ext")]
    #[case("sha256")]
    #[case("")]
    fn test_invalid_presets(#[case] input: &str) {
        assert_eq!(input.parse::<ExtractionRule>().unwrap_err(), ErrorKind::InvalidRule(input.to_string()));
    }

    #[test]
    fn test_deserialize_preset_or_custom() {
        let rules: Vec<ExtractionRule> = serde_json::from_value(json!([
            "fingerprint",
            {"name": "legacy", "id_path": "id", "signature_path": "fp"},
        ]))
        .unwrap();
        assert_eq!(rules[0], ExtractionRule::fingerprint());
        assert_eq!(rules[1], ExtractionRule::new("legacy", "id", "fp"));
        assert!(serde_json::from_value::<ExtractionRule>(json!("imagehash:wavelet")).is_err());
    }

    #[rstest]
    #[case::string_id(json!({"properties": {"wof:id": "7", "media:fingerprint": "abc"}}), Some(("abc", 7)))]
    #[case::missing_id(json!({"properties": {"media:fingerprint": "abc"}}), None)]
    #[case::missing_signature(json!({"properties": {"wof:id": 7}}), None)]
    #[case::empty_signature(json!({"properties": {"wof:id": 7, "media:fingerprint": ""}}), None)]
    #[case::numeric_signature(json!({"properties": {"wof:id": 7, "media:fingerprint": 12}}), None)]
    #[case::not_a_feature(json!([1, 2, 3]), None)]
    fn test_extract(#[case] document: Value, #[case] expected: Option<(&str, OwnerId)>) {
        let extracted = ExtractionRule::fingerprint().extract(&document);
        assert_eq!(extracted.as_ref().map(|(s, o)| (s.as_str(), *o)), expected);
    }
}
