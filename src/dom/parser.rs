//! XHTML parsing into the arena DOM.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use crate::dom::{Attr, Document, QName};
use crate::error::{Error, Result};

/// Parse an XHTML document into a [`Document`].
///
/// Text content is kept byte-for-byte (no trimming); character and entity
/// references are resolved into the text stream. Fails with
/// [`Error::MalformedMarkup`] on input that is not well-formed — callers
/// fill in the logical name.
pub fn parse_document(text: &str) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    let mut doc = Document::new();
    let mut stack: Vec<crate::dom::NodeId> = vec![doc.document()];

    loop {
        match reader.read_event() {
            Ok(Event::Decl(_)) => {
                doc.has_decl = true;
            }
            Ok(Event::DocType(t)) => {
                let content = String::from_utf8_lossy(t.as_ref()).into_owned();
                let node = doc.create_doctype(content);
                doc.append(top(&stack), node);
            }
            Ok(Event::Start(e)) => {
                let el = make_element(&mut doc, &e)?;
                doc.append(top(&stack), el);
                stack.push(el);
            }
            Ok(Event::Empty(e)) => {
                let el = make_element(&mut doc, &e)?;
                doc.append(top(&stack), el);
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    stack.pop();
                } else {
                    return Err(malformed("unexpected closing tag"));
                }
            }
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(t.as_ref()).into_owned();
                doc.append_text(top(&stack), &raw);
            }
            Ok(Event::GeneralRef(r)) => {
                let name = String::from_utf8_lossy(r.as_ref()).into_owned();
                match resolve_reference(&name) {
                    Some(resolved) => doc.append_text(top(&stack), &resolved),
                    None => {
                        // Undefined entity: keep its spelled-out form
                        warn!(entity = %name, "unknown entity reference");
                        doc.append_text(top(&stack), &format!("&{};", name));
                    }
                }
            }
            Ok(Event::CData(c)) => {
                let content = String::from_utf8_lossy(c.as_ref()).into_owned();
                let node = doc.create_cdata(content);
                doc.append(top(&stack), node);
            }
            Ok(Event::Comment(c)) => {
                let content = String::from_utf8_lossy(c.as_ref()).into_owned();
                let node = doc.create_comment(content);
                doc.append(top(&stack), node);
            }
            Ok(Event::PI(p)) => {
                let content = String::from_utf8_lossy(p.as_ref()).into_owned();
                let node = doc.create_pi(content);
                doc.append(top(&stack), node);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
        }
    }

    if stack.len() > 1 {
        return Err(malformed("unexpected end of document"));
    }

    Ok(doc)
}

fn top(stack: &[crate::dom::NodeId]) -> crate::dom::NodeId {
    *stack.last().expect("parser stack never empty")
}

fn malformed(reason: &str) -> Error {
    Error::MalformedMarkup {
        name: String::new(),
        reason: reason.to_string(),
    }
}

fn make_element(doc: &mut Document, e: &BytesStart<'_>) -> Result<crate::dom::NodeId> {
    let name = qname_from_bytes(e.name().as_ref());

    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(&err.to_string()))?;
        let key = qname_from_bytes(attr.key.as_ref());
        let raw = String::from_utf8_lossy(attr.value.as_ref()).into_owned();
        attrs.push(Attr {
            name: key,
            value: unescape(&raw),
        });
    }

    Ok(doc.create_element(name, attrs))
}

fn qname_from_bytes(bytes: &[u8]) -> QName {
    let full = String::from_utf8_lossy(bytes);
    match full.split_once(':') {
        Some((prefix, local)) => QName::with_prefix(Some(prefix.to_string()), local),
        None => QName::new(full.into_owned()),
    }
}

/// Resolve a character or entity reference (the text between `&` and `;`).
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            num.parse::<u32>().ok()?
        };
        return char::from_u32(code).map(String::from);
    }

    let resolved = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "shy" => "\u{ad}",
        "hellip" => "\u{2026}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        _ => return None,
    };
    Some(resolved.to_string())
}

/// Resolve references inside an attribute value.
fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';') {
            Some(semi) if semi <= 10 => {
                let name = &after[..semi];
                match resolve_reference(name) {
                    Some(resolved) => out.push_str(&resolved),
                    None => {
                        out.push('&');
                        out.push_str(name);
                        out.push(';');
                    }
                }
                rest = &after[semi + 1..];
            }
            _ => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
