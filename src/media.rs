//! Closed media type registry for container entries.
//!
//! Every entry in a container carries exactly one media type from this
//! registry. Detection is done via file extension first, then magic bytes.

/// Media type of a container entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// XHTML content document
    Xhtml,
    /// Legacy HTML content document
    Html,
    /// CSS stylesheet
    Css,
    /// JavaScript asset
    Javascript,
    /// NCX table of contents
    Ncx,
    /// OPF package document
    Opf,
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
    /// GIF image
    Gif,
    /// SVG image (vector)
    Svg,
    /// WebP image
    WebP,
    /// TrueType font
    Ttf,
    /// OpenType font
    Otf,
    /// WOFF font
    Woff,
    /// Unknown/binary format
    Binary,
}

impl MediaType {
    /// Get the MIME type string for this media type.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaType::Xhtml => "application/xhtml+xml",
            MediaType::Html => "text/html",
            MediaType::Css => "text/css",
            MediaType::Javascript => "application/x-javascript",
            MediaType::Ncx => "application/x-dtbncx+xml",
            MediaType::Opf => "application/oebps-package+xml",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Svg => "image/svg+xml",
            MediaType::WebP => "image/webp",
            MediaType::Ttf => "font/ttf",
            MediaType::Otf => "font/otf",
            MediaType::Woff => "font/woff",
            MediaType::Binary => "application/octet-stream",
        }
    }

    /// Look up a media type from a MIME string (as found in an OPF manifest).
    pub fn from_mime(mime: &str) -> Option<MediaType> {
        match mime {
            "application/xhtml+xml" => Some(MediaType::Xhtml),
            "text/html" => Some(MediaType::Html),
            "text/css" => Some(MediaType::Css),
            "application/x-javascript" | "application/javascript" | "text/javascript" => {
                Some(MediaType::Javascript)
            }
            "application/x-dtbncx+xml" => Some(MediaType::Ncx),
            "application/oebps-package+xml" => Some(MediaType::Opf),
            "image/jpeg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/gif" => Some(MediaType::Gif),
            "image/svg+xml" => Some(MediaType::Svg),
            "image/webp" => Some(MediaType::WebP),
            "font/ttf" | "application/x-font-ttf" => Some(MediaType::Ttf),
            "font/otf" | "application/vnd.ms-opentype" => Some(MediaType::Otf),
            "font/woff" | "application/font-woff" => Some(MediaType::Woff),
            "application/octet-stream" => Some(MediaType::Binary),
            _ => None,
        }
    }

    /// Check if this is an HTML-family content document.
    pub fn is_html(self) -> bool {
        matches!(self, MediaType::Xhtml | MediaType::Html)
    }

    /// Check if this media type represents an image.
    pub fn is_image(self) -> bool {
        matches!(
            self,
            MediaType::Jpeg | MediaType::Png | MediaType::Gif | MediaType::Svg | MediaType::WebP
        )
    }

    /// Check if this media type represents a font.
    pub fn is_font(self) -> bool {
        matches!(self, MediaType::Ttf | MediaType::Otf | MediaType::Woff)
    }
}

/// Detect the media type of a container entry from its path and raw bytes.
///
/// Extension-based detection runs first (faster, most common case), then
/// magic byte detection for files with unhelpful names.
pub fn detect_media_type(path: &str, data: &[u8]) -> MediaType {
    let path_lower = path.to_lowercase();

    if path_lower.ends_with(".xhtml") || path_lower.ends_with(".xhtm") {
        return MediaType::Xhtml;
    }
    if path_lower.ends_with(".html") || path_lower.ends_with(".htm") {
        return MediaType::Html;
    }
    if path_lower.ends_with(".css") {
        return MediaType::Css;
    }
    if path_lower.ends_with(".js") {
        return MediaType::Javascript;
    }
    if path_lower.ends_with(".ncx") {
        return MediaType::Ncx;
    }
    if path_lower.ends_with(".opf") {
        return MediaType::Opf;
    }
    if path_lower.ends_with(".jpg") || path_lower.ends_with(".jpeg") {
        return MediaType::Jpeg;
    }
    if path_lower.ends_with(".png") {
        return MediaType::Png;
    }
    if path_lower.ends_with(".gif") {
        return MediaType::Gif;
    }
    if path_lower.ends_with(".svg") {
        return MediaType::Svg;
    }
    if path_lower.ends_with(".webp") {
        return MediaType::WebP;
    }
    if path_lower.ends_with(".ttf") {
        return MediaType::Ttf;
    }
    if path_lower.ends_with(".otf") {
        return MediaType::Otf;
    }
    if path_lower.ends_with(".woff") {
        return MediaType::Woff;
    }

    detect_by_magic(data)
}

/// Detect a media type from magic bytes alone.
fn detect_by_magic(data: &[u8]) -> MediaType {
    if data.len() >= 4 {
        // JPEG: FF D8 FF
        if data[0] == 0xFF && data[1] == 0xD8 {
            return MediaType::Jpeg;
        }
        // PNG: 89 50 4E 47 (.PNG)
        if data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47 {
            return MediaType::Png;
        }
        // GIF: 47 49 46 (GIF)
        if data[0] == 0x47 && data[1] == 0x49 && data[2] == 0x46 {
            return MediaType::Gif;
        }
        // TrueType: 00 01 00 00
        if data[0] == 0x00 && data[1] == 0x01 && data[2] == 0x00 && data[3] == 0x00 {
            return MediaType::Ttf;
        }
        // OpenType: 4F 54 54 4F (OTTO)
        if data[0] == 0x4F && data[1] == 0x54 && data[2] == 0x54 && data[3] == 0x4F {
            return MediaType::Otf;
        }
        // WOFF: 77 4F 46 46 (wOFF)
        if data[0] == 0x77 && data[1] == 0x4F && data[2] == 0x46 && data[3] == 0x46 {
            return MediaType::Woff;
        }
    }

    // XML-ish content: sniff the first tag
    let head = &data[..data.len().min(256)];
    if let Ok(text) = std::str::from_utf8(head) {
        let text = text.trim_start();
        if text.starts_with("<?xml") || text.starts_with("<!DOCTYPE html") || text.starts_with("<html") {
            return MediaType::Xhtml;
        }
    }

    MediaType::Binary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect_media_type("ch01.xhtml", &[]), MediaType::Xhtml);
        assert_eq!(detect_media_type("page.HTML", &[]), MediaType::Html);
        assert_eq!(detect_media_type("style.css", &[]), MediaType::Css);
        assert_eq!(detect_media_type("kobo.js", &[]), MediaType::Javascript);
        assert_eq!(detect_media_type("toc.ncx", &[]), MediaType::Ncx);
        assert_eq!(detect_media_type("content.opf", &[]), MediaType::Opf);
        assert_eq!(detect_media_type("cover.jpeg", &[]), MediaType::Jpeg);
        assert_eq!(detect_media_type("font.woff", &[]), MediaType::Woff);
        assert_eq!(detect_media_type("unknown", &[]), MediaType::Binary);
    }

    #[test]
    fn test_detect_by_magic_bytes() {
        let jpeg_data = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(detect_media_type("unknown", &jpeg_data), MediaType::Jpeg);

        let png_data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_media_type("unknown", &png_data), MediaType::Png);

        assert_eq!(
            detect_media_type("unknown", b"<?xml version=\"1.0\"?><html/>"),
            MediaType::Xhtml
        );
    }

    #[test]
    fn test_mime_round_trip() {
        for mt in [
            MediaType::Xhtml,
            MediaType::Html,
            MediaType::Css,
            MediaType::Javascript,
            MediaType::Jpeg,
            MediaType::Woff,
        ] {
            assert_eq!(MediaType::from_mime(mt.mime_type()), Some(mt));
        }
        assert_eq!(MediaType::from_mime("application/x-rarely-seen"), None);
    }

    #[test]
    fn test_classification() {
        assert!(MediaType::Xhtml.is_html());
        assert!(MediaType::Html.is_html());
        assert!(!MediaType::Css.is_html());

        assert!(MediaType::Png.is_image());
        assert!(!MediaType::Ttf.is_image());

        assert!(MediaType::Otf.is_font());
        assert!(!MediaType::Jpeg.is_font());
    }
}
