//! Markup sanitation for foreign-origin cruft.
//!
//! Two stages with a fixed order. Text-level rules run on the raw document
//! *before* parsing, because the patterns they remove (office-suite export
//! artifacts, stray self-closed tags) are often not well-formed enough to
//! survive a strict parse. Tree-level rules run after parsing. Every rule is
//! idempotent: its postcondition is "pattern no longer matches", so running
//! the sanitizer twice yields a byte-identical result.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::Document;

macro_rules! rule {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Microsoft Office export artifacts
rule!(MS_PARA_RE, r"\s*<o:p>\s*</o:p>");
rule!(MS_TAG_RE, r"(?i)</?st1:\w+[^>]*>");
rule!(
    MS_XMLNS_RE,
    r#"\s+xmlns:(?:o|st1|w|m)="urn:schemas-microsoft-com:[^"]*""#
);

// Malformed self-closing / unclosed tag forms
rule!(CLOSED_META_LINK_RE, r"<(meta|link)\s+([^>]*?)\s*></(?:meta|link)>");
rule!(SELF_CLOSED_SCRIPT_RE, r"<script\s+([^>]*?)\s*/>");
rule!(SELF_CLOSED_P_RE, r"<p([^>/]*)/>");

// Non-UTF-8 encoding declarations (content is transcoded before this runs)
rule!(XML_DECL_ENCODING_RE, r#"(<\?xml[^>]*?encoding=)["'][^"']+["']"#);

// Punctuation smartening
rule!(ELLIPSIS_RE, r"(\w)\s?\.\s*\.\s*\.");
rule!(TRIPLE_DASH_RE, r"---");
rule!(DOUBLE_DASH_RE, r"--");

/// Apply the pre-parse cruft-removal rules, in order.
pub fn clean_text(html: &str) -> String {
    let html = MS_PARA_RE.replace_all(html, " ");
    let html = MS_TAG_RE.replace_all(&html, "");
    let html = MS_XMLNS_RE.replace_all(&html, "");
    let html = strip_replacement_chars(&html);
    html.into_owned()
}

/// Apply the forced-cleanup rules for markup a strict parse rejects, in
/// order: `<meta>`/`<link>` pairs become self-closing, self-closed
/// `<script/>` and `<p/>` are forced open (attributes preserved), and any
/// non-UTF-8 encoding declaration is rewritten to UTF-8.
pub fn forced_cleanup_text(html: &str) -> String {
    let html = XML_DECL_ENCODING_RE.replace(html, "${1}\"UTF-8\"");
    let html = CLOSED_META_LINK_RE.replace_all(&html, "<$1 $2 />");
    let html = SELF_CLOSED_SCRIPT_RE.replace_all(&html, "<script $1></script>");
    let html = SELF_CLOSED_P_RE.replace_all(&html, "<p$1></p>");
    html.into_owned()
}

/// Smarten ASCII punctuation: dash runs become spaced en/em dashes, three-dot
/// runs after a word become a single ellipsis character.
///
/// Only ASCII source forms are rewritten so the rules cannot match their own
/// output. Comment regions are passed through untouched — the dash rules
/// would otherwise eat the `<!--`/`-->` delimiters.
pub fn smarten_punctuation_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find("<!--") {
        out.push_str(&smarten_chunk(&rest[..start]));
        match rest[start..].find("-->") {
            Some(end) => {
                out.push_str(&rest[start..start + end + 3]);
                rest = &rest[start + end + 3..];
            }
            None => {
                // Unterminated comment: leave the remainder alone
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(&smarten_chunk(rest));
    out
}

fn smarten_chunk(text: &str) -> String {
    let text = ELLIPSIS_RE.replace_all(text, "${1}\u{2026}");
    let text = TRIPLE_DASH_RE.replace_all(&text, " \u{2013} ");
    let text = DOUBLE_DASH_RE.replace_all(&text, " \u{2014} ");
    strip_replacement_chars(&text).into_owned()
}

fn strip_replacement_chars(html: &str) -> Cow<'_, str> {
    if html.contains('\u{fffd}') {
        Cow::Owned(html.replace('\u{fffd}', ""))
    } else {
        Cow::Borrowed(html)
    }
}

/// Check for headings with no text content. Used to avoid dirtying documents
/// that need no tree-level cleanup.
pub fn has_empty_headings(doc: &Document) -> bool {
    find_empty_headings(doc).next().is_some()
}

/// Remove every heading element whose recursive text content is empty or
/// whitespace-only. Such headings produce spurious navigation entries on the
/// device. Returns whether anything was removed.
pub fn remove_empty_headings(doc: &mut Document) -> bool {
    let empty: Vec<_> = find_empty_headings(doc).collect();
    for id in &empty {
        doc.detach(*id);
    }
    !empty.is_empty()
}

fn find_empty_headings(doc: &Document) -> impl Iterator<Item = crate::dom::NodeId> + '_ {
    doc.descendants(doc.document()).filter(|&id| {
        doc.element_local(id)
            .is_some_and(|tag| matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6"))
            && doc.text_content(id).trim().is_empty()
    })
}
