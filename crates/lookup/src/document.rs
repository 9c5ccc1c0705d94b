//! Field access on record documents.
//!
//! Records are GeoJSON features whose property names contain colons
//! (`wof:id`, `media:fingerprint`) but never dots, so a dotted path is
//! unambiguous.

use crate::OwnerId;
use serde_json::Value;

/// Follow a dotted path (`properties.wof:id`) into a JSON document.
///
/// ```
/// let doc = serde_json::json!({"properties": {"wof:id": 1234}});
/// assert_eq!(media_lookup::field(&doc, "properties.wof:id"), Some(&serde_json::json!(1234)));
/// assert_eq!(media_lookup::field(&doc, "properties.wof:name"), None);
/// ```
pub fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Read an owner identifier: an integer, or a string holding one.
pub fn extract_owner(value: &Value) -> Option<OwnerId> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_field_paths() {
        let doc = json!({
            "type": "Feature",
            "properties": {"wof:id": 1, "media:properties": {"sizes": [{"w": 10}]}},
        });
        assert_eq!(field(&doc, "type"), Some(&json!("Feature")));
        assert_eq!(field(&doc, "properties.media:properties.sizes.0.w"), Some(&json!(10)));
        assert_eq!(field(&doc, "properties.wof:id.deeper"), None);
        assert_eq!(field(&doc, "geometry"), None);
    }

    #[rstest]
    #[case(json!(1234567), Some(1234567))]
    #[case(json!("1234567"), Some(1234567))]
    #[case(json!(" 42 "), Some(42))]
    #[case(json!(-1), Some(-1))]
    #[case(json!(1.5), None)]
    #[case(json!("abc"), None)]
    #[case(json!(null), None)]
    #[case(json!([1]), None)]
    fn test_extract_owner(#[case] value: Value, #[case] expected: Option<OwnerId>) {
        assert_eq!(extract_owner(&value), expected);
    }
}
