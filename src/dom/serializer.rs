//! Deterministic XHTML serialization from the arena DOM.
//!
//! Output is always UTF-8. Void elements self-close; every other element
//! gets an explicit closing tag even when empty — Kobo firmware mishandles
//! self-closed `<p/>` and `<script/>`, so the serializer never emits them.

use crate::dom::{Document, NodeData, NodeId};

/// Elements serialized in self-closing form when empty.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Serialize a document to UTF-8 bytes.
pub fn serialize(doc: &Document) -> Vec<u8> {
    let mut out = String::new();

    if doc.has_decl {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    }

    for child in doc.children(doc.document()) {
        serialize_node(doc, child, &mut out);
    }

    out.into_bytes()
}

fn serialize_node(doc: &Document, id: NodeId, out: &mut String) {
    let Some(node) = doc.get(id) else { return };

    match &node.data {
        NodeData::Document => {}
        NodeData::Element { name, attrs } => {
            let tag = name.as_markup();
            out.push('<');
            out.push_str(&tag);
            for attr in attrs {
                out.push(' ');
                out.push_str(&attr.name.as_markup());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }

            let has_children = doc.children(id).next().is_some();
            if !has_children && VOID_ELEMENTS.contains(&name.local.as_str()) {
                out.push_str(" />");
                return;
            }

            out.push('>');
            for child in doc.children(id) {
                serialize_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        NodeData::Text(text) => out.push_str(&escape_text(text)),
        NodeData::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::ProcessingInstruction(content) => {
            out.push_str("<?");
            out.push_str(content);
            out.push_str("?>");
        }
        NodeData::Doctype(content) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(content);
            out.push('>');
        }
    }
}

/// Escape XML special characters in text content.
fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape XML special characters in an attribute value.
fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    fn round_trip(input: &str) -> String {
        let doc = parse_document(input).unwrap();
        String::from_utf8(serialize(&doc)).unwrap()
    }

    #[test]
    fn test_serialize_preserves_structure_and_whitespace() {
        let input = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                     <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
                     <head><title>T</title></head>\n\
                     <body>\n  <p>Hello,   World!</p>\n</body>\n</html>";
        assert_eq!(round_trip(input), input);
    }

    #[test]
    fn test_serialize_is_stable() {
        // parse(serialize(x)) == serialize(x) after the first pass
        let input = "<html><body><p class=\"a\">A &amp; B</p><br/><p/></body></html>";
        let once = round_trip(input);
        let twice = round_trip(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_void_elements_self_close() {
        let output = round_trip("<head><link rel=\"stylesheet\" href=\"a.css\"></link><meta name=\"x\" content=\"y\"></meta></head>");
        assert!(output.contains("<link rel=\"stylesheet\" href=\"a.css\" />"));
        assert!(output.contains("<meta name=\"x\" content=\"y\" />"));
    }

    #[test]
    fn test_non_void_elements_stay_open() {
        let output = round_trip("<body><p/><script src=\"a.js\"/><div/></body>");
        assert!(output.contains("<p></p>"));
        assert!(output.contains("<script src=\"a.js\"></script>"));
        assert!(output.contains("<div></div>"));
    }

    #[test]
    fn test_escaping() {
        let output = round_trip("<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3</p>");
        assert!(output.contains("title=\"a &quot;b&quot;\""));
        assert!(output.contains("1 &lt; 2 &amp; 3"));
    }

    #[test]
    fn test_doctype_and_comment() {
        let input = "<!DOCTYPE html>\n<html><!-- note --><body></body></html>";
        assert_eq!(round_trip(input), input);
    }
}
