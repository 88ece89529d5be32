//! Text decoding and logical-name path helpers.

use std::borrow::Cow;

use memchr::memmem;

/// Extract the declared encoding from an XML declaration.
///
/// Scans the first bytes of a document for `<?xml ... encoding="..." ?>` and
/// returns the encoding label if present.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    // Only the document prologue is relevant
    let prefix = &bytes[..bytes.len().min(200)];

    let xml_start = memmem::find(prefix, b"<?xml")?;
    let decl = &prefix[xml_start..];
    let decl_end = memmem::find(decl, b"?>").unwrap_or(decl.len());
    let decl = &decl[..decl_end];

    let enc_pos = memmem::find(decl, b"encoding=")?;
    let after_enc = &decl[enc_pos + 9..];
    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value = &after_enc[1..];
    let value_end = value.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&value[..value_end]).ok()
}

/// Decode raw document bytes to text.
///
/// The declared encoding (if any, and not UTF-8) is tried first, then UTF-8,
/// then Windows-1252 as a permissive fallback. The second value of the
/// returned pair is `true` when decoding was lossy — a single malformed
/// document must not block processing of the rest of the container, so the
/// caller records a warning and continues with the fallback text.
pub fn decode_text<'a>(bytes: &'a [u8], declared: Option<&str>) -> (Cow<'a, str>, bool) {
    if let Some(label) = declared
        && let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes())
        && encoding != encoding_rs::UTF_8
    {
        let (result, _, malformed) = encoding.decode(bytes);
        return (result, malformed);
    }

    // UTF-8 (handles BOM automatically)
    let (result, _, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return (result, false);
    }

    // Fallback: Windows-1252 (common in old ebooks, superset of ISO-8859-1)
    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    (result, true)
}

/// Compute the href of `target` relative to the directory of `from`.
///
/// Both are `/`-separated logical names. Used when injecting `<link>` and
/// `<script>` references into content documents that may live in a different
/// directory than the referenced asset.
pub fn relative_href(from: &str, target: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').collect();

    let common = from_dir
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend(&target_parts[common..]);
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_xml_encoding() {
        assert_eq!(
            extract_xml_encoding(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>"),
            Some("UTF-8")
        );
        assert_eq!(
            extract_xml_encoding(b"<?xml version='1.0' encoding='iso-8859-1'?>"),
            Some("iso-8859-1")
        );
        assert_eq!(extract_xml_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(extract_xml_encoding(b"<html><body/></html>"), None);
    }

    #[test]
    fn test_decode_utf8() {
        let (text, lossy) = decode_text("caf\u{e9}".as_bytes(), None);
        assert_eq!(text, "caf\u{e9}");
        assert!(!lossy);
    }

    #[test]
    fn test_decode_declared_latin1() {
        // 0xE9 is 'e acute' in Latin-1 but malformed UTF-8
        let bytes = b"caf\xe9";
        let (text, lossy) = decode_text(bytes, Some("iso-8859-1"));
        assert_eq!(text, "caf\u{e9}");
        assert!(!lossy);
    }

    #[test]
    fn test_decode_fallback_windows_1252() {
        let bytes = b"caf\xe9";
        let (text, lossy) = decode_text(bytes, None);
        assert_eq!(text, "caf\u{e9}");
        assert!(lossy);
    }

    #[test]
    fn test_relative_href_same_dir() {
        assert_eq!(relative_href("OEBPS/ch01.xhtml", "OEBPS/style.css"), "style.css");
        assert_eq!(relative_href("ch01.xhtml", "style.css"), "style.css");
    }

    #[test]
    fn test_relative_href_subdir() {
        assert_eq!(
            relative_href("OEBPS/ch01.xhtml", "OEBPS/css/kobo.css"),
            "css/kobo.css"
        );
    }

    #[test]
    fn test_relative_href_parent_dir() {
        assert_eq!(relative_href("OEBPS/text/ch01.xhtml", "style.css"), "../../style.css");
        assert_eq!(
            relative_href("OEBPS/text/ch01.xhtml", "OEBPS/css/kobo.css"),
            "../css/kobo.css"
        );
    }
}
