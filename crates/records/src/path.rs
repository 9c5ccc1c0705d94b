use crate::RecordId;
use crate::error::{ErrorKind, Result};
use std::path::PathBuf;

/// Relative key of a record: the decimal id split into groups of three
/// digits, one directory per group, followed by `<id>.geojson`.
///
/// ```
/// # use media_records::id_to_rel_path;
/// # use std::path::Path;
/// assert_eq!(id_to_rel_path(1234567).unwrap(), Path::new("123/456/7/1234567.geojson"));
/// ```
pub fn id_to_rel_path(id: RecordId) -> Result<PathBuf> {
    if id <= 0 {
        exn::bail!(ErrorKind::InvalidId(id));
    }
    let digits = id.to_string();
    let mut path = PathBuf::new();
    let mut rest = digits.as_str();
    while !rest.is_empty() {
        let (group, tail) = rest.split_at(rest.len().min(3));
        path.push(group);
        rest = tail;
    }
    path.push(format!("{digits}.geojson"));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case(1, "1/1.geojson")]
    #[case(101, "101/101.geojson")]
    #[case(1234, "123/4/1234.geojson")]
    #[case(1234567, "123/456/7/1234567.geojson")]
    #[case(85633041, "856/330/41/85633041.geojson")]
    fn test_nested_layout(#[case] id: RecordId, #[case] expected: &str) {
        assert_eq!(id_to_rel_path(id).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    fn test_rejects_non_positive(#[case] id: RecordId) {
        let err = id_to_rel_path(id).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidId(id));
    }
}
