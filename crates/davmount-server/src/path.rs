//! URL-to-path translation.
//!
//! Virtual paths are carried internally as canonical segment sequences;
//! URL form exists only at the protocol boundary.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except unreserved characters is percent-encoded in hrefs.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Canonicalise a request URL path into segments.
///
/// Percent-decodes, splits on `/`, and drops empty segments from
/// leading, trailing or doubled separators. Returns `None` (→ 400) for
/// non-UTF-8 escapes, `.` or `..` segments, or embedded NUL bytes.
pub fn parse_path(raw: &str) -> Option<Vec<String>> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    let mut segments = Vec::new();
    for part in decoded.split('/') {
        if part.is_empty() {
            continue;
        }
        if part == "." || part == ".." || part.contains('\0') {
            return None;
        }
        segments.push(part.to_string());
    }
    Some(segments)
}

/// Percent-encode a single path segment for use in URLs.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Render a path as an absolute, percent-encoded href. Collections get
/// a trailing slash.
pub fn to_href(path: &[String], is_dir: bool) -> String {
    let joined = path
        .iter()
        .map(|segment| encode_segment(segment))
        .collect::<Vec<_>>()
        .join("/");
    let mut href = format!("/{}", joined);
    if is_dir && !href.ends_with('/') {
        href.push('/');
    }
    href
}

/// The display name of a path: its last segment, or `/` for the root.
pub fn display_name(path: &[String]) -> &str {
    path.last().map(String::as_str).unwrap_or("/")
}

/// Subtree dump format selected by the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Json,
    Zip,
}

/// Look for a `json` or `zip` key in the query string.
pub fn dump_format(query: Option<&str>) -> Option<DumpFormat> {
    for pair in query?.split('&') {
        match pair.split('=').next().unwrap_or("") {
            "json" => return Some(DumpFormat::Json),
            "zip" => return Some(DumpFormat::Zip),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segments_are_dropped() {
        assert_eq!(parse_path("//a///b/").unwrap(), vec!["a", "b"]);
        assert_eq!(parse_path("/").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn dot_segments_are_rejected() {
        assert!(parse_path("/a/../b").is_none());
        assert!(parse_path("/./a").is_none());
        assert!(parse_path("/a/%2e%2e/b").is_none());
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(parse_path("/a%00b").is_none());
    }

    #[test]
    fn percent_decoding_applies_before_split() {
        assert_eq!(parse_path("/a%2Fb").unwrap(), vec!["a", "b"]);
        assert_eq!(parse_path("/sp%20ace").unwrap(), vec!["sp ace"]);
    }

    #[test]
    fn hrefs_are_percent_encoded() {
        let path = vec!["sp ace".to_string(), "x&y".to_string()];
        assert_eq!(to_href(&path, false), "/sp%20ace/x%26y");
        assert_eq!(to_href(&path, true), "/sp%20ace/x%26y/");
        assert_eq!(to_href(&[], true), "/");
    }

    #[test]
    fn query_selects_dump_format() {
        assert_eq!(dump_format(Some("json")), Some(DumpFormat::Json));
        assert_eq!(dump_format(Some("a=1&zip")), Some(DumpFormat::Zip));
        assert_eq!(dump_format(Some("jsonp")), None);
        assert_eq!(dump_format(None), None);
    }
}
