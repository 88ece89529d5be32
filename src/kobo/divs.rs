//! Fixed two-level body wrapper.
//!
//! The device applies column/pagination CSS against `div#book-columns >
//! div#book-inner`; wrapping every document's body content in exactly this
//! pair makes unpredictable source structure render uniformly.

use crate::dom::{Attr, Document, NodeId, QName};
use crate::error::{Error, Result};

/// Identifier of the outer wrapper div.
pub const OUTER_WRAPPER_ID: &str = "book-columns";
/// Identifier of the inner wrapper div.
pub const INNER_WRAPPER_ID: &str = "book-inner";

/// Check whether a document already carries the full wrapper pair.
pub fn is_wrapped(doc: &Document) -> bool {
    find_wrapper(doc, OUTER_WRAPPER_ID).is_some() && find_wrapper(doc, INNER_WRAPPER_ID).is_some()
}

/// Wrap all body children in `div#book-columns > div#book-inner`.
///
/// Detection goes by the wrapper identifiers, not by position: a document
/// carrying both is left untouched (`false`). A document carrying exactly
/// one of the two is half-wrapped — re-wrapping it would nest or duplicate
/// identifiers, so that is a contract violation, not a recoverable state.
/// A document without a body is left untouched.
pub fn ensure_wrapped(doc: &mut Document) -> Result<bool> {
    let Some(body) = doc.body() else {
        return Ok(false);
    };

    let outer = find_wrapper(doc, OUTER_WRAPPER_ID);
    let inner = find_wrapper(doc, INNER_WRAPPER_ID);
    match (outer, inner) {
        (Some(_), Some(_)) => return Ok(false),
        (None, None) => {}
        _ => {
            return Err(Error::StructuralInvariant(format!(
                "document carries only one of #{OUTER_WRAPPER_ID}/#{INNER_WRAPPER_ID}"
            )));
        }
    }

    // Wrapper divs inherit the body's namespace prefix
    let prefix = doc
        .element_name(body)
        .and_then(|name| name.prefix.clone());
    let inner_div = make_div(doc, prefix.clone(), INNER_WRAPPER_ID);
    let outer_div = make_div(doc, prefix, OUTER_WRAPPER_ID);

    let children: Vec<NodeId> = doc.children(body).collect();
    for child in children {
        doc.append(inner_div, child);
    }
    doc.append(outer_div, inner_div);
    doc.append(body, outer_div);

    Ok(true)
}

fn find_wrapper(doc: &Document, id: &str) -> Option<NodeId> {
    doc.find(|node| match &node.data {
        crate::dom::NodeData::Element { name, attrs } => {
            name.local == "div"
                && attrs
                    .iter()
                    .any(|a| a.name.local == "id" && a.value == id)
        }
        _ => false,
    })
}

fn make_div(doc: &mut Document, prefix: Option<String>, id: &str) -> NodeId {
    doc.create_element(
        QName::with_prefix(prefix, "div"),
        vec![Attr {
            name: QName::new("id"),
            value: id.to_string(),
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    const PAGE: &str = "<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>T</title></head>\
                        <body><p>One.</p>\n<p>Two.</p></body></html>";

    #[test]
    fn test_wraps_body_children() {
        let mut doc = parse_document(PAGE).unwrap();
        assert!(ensure_wrapped(&mut doc).unwrap());

        let body = doc.body().unwrap();
        let body_children: Vec<_> = doc.children(body).collect();
        assert_eq!(body_children.len(), 1);

        let outer = body_children[0];
        assert_eq!(doc.attr(outer, "id"), Some(OUTER_WRAPPER_ID));

        let inner: Vec<_> = doc.children(outer).collect();
        assert_eq!(inner.len(), 1);
        assert_eq!(doc.attr(inner[0], "id"), Some(INNER_WRAPPER_ID));

        // Original children (including the whitespace between them) moved inside
        let tags: Vec<_> = doc
            .children(inner[0])
            .filter_map(|id| doc.element_local(id))
            .collect();
        assert_eq!(tags, vec!["p", "p"]);
        assert_eq!(doc.text_content(inner[0]), "One.\nTwo.");
    }

    #[test]
    fn test_already_wrapped_is_noop() {
        let mut doc = parse_document(PAGE).unwrap();
        assert!(ensure_wrapped(&mut doc).unwrap());
        let before = crate::dom::serialize(&doc);

        assert!(!ensure_wrapped(&mut doc).unwrap());
        assert_eq!(crate::dom::serialize(&doc), before);
    }

    #[test]
    fn test_detection_by_identifier_not_position() {
        // Wrappers buried under an extra div still count as wrapped
        let page = "<html><body><div><div id=\"book-columns\"><div id=\"book-inner\">\
                    <p>x</p></div></div></div></body></html>";
        let mut doc = parse_document(page).unwrap();
        assert!(!ensure_wrapped(&mut doc).unwrap());
    }

    #[test]
    fn test_half_wrapped_is_invariant_violation() {
        let page = "<html><body><div id=\"book-inner\"><p>x</p></div></body></html>";
        let mut doc = parse_document(page).unwrap();
        assert!(matches!(
            ensure_wrapped(&mut doc),
            Err(Error::StructuralInvariant(_))
        ));
    }

    #[test]
    fn test_no_body_is_noop() {
        let mut doc = parse_document("<html><head><title>T</title></head></html>").unwrap();
        assert!(!ensure_wrapped(&mut doc).unwrap());
    }
}
