//! Extension-based MIME type detection.
//!
//! Only the extension is consulted; object contents are never sniffed.

use std::path::Path;

const IMAGE_PREFIX: &str = "image/";

/// Look up the MIME type for `path` by its extension (case-insensitive).
///
/// ```
/// use media_gather::mime_type;
/// assert_eq!(mime_type("2019/06/a.JPG"), Some("image/jpeg"));
/// assert_eq!(mime_type("notes.txt"), Some("text/plain; charset=utf-8"));
/// assert_eq!(mime_type("README"), None);
/// ```
pub fn mime_type(path: impl AsRef<Path>) -> Option<&'static str> {
    let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "ico" => "image/vnd.microsoft.icon",
        "jpe" | "jpeg" | "jpg" => "image/jpeg",
        "jxl" => "image/jxl",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",

        "css" => "text/css; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "htm" | "html" => "text/html; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",

        "geojson" => "application/geo+json",
        "gz" => "application/gzip",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",

        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mov" => "video/quicktime",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Whether `mime` is an image MIME type, the only kind that is gathered.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with(IMAGE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.jpg", Some("image/jpeg"))]
    #[case("nested/dir/b.PNG", Some("image/png"))]
    #[case("c.tiff", Some("image/tiff"))]
    #[case("d.geojson", Some("application/geo+json"))]
    #[case("e.txt", Some("text/plain; charset=utf-8"))]
    #[case("f.unknown", None)]
    #[case("no-extension", None)]
    // A dotfile has no extension.
    #[case(".png", None)]
    fn test_mime_type(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(mime_type(path), expected);
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("image/gif"));
        assert!(!is_image("application/json"));
        assert!(!is_image("text/plain; charset=utf-8"));
    }
}
