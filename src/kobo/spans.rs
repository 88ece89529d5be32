//! Sentence-level span injection.
//!
//! Walks a document's body and wraps every contiguous run of text in
//! `<span class="koboSpan" id="kobo.<paragraph>.<segment>">` markers. The
//! firmware uses the identifiers to track reading position, so they must be
//! contiguous and document-unique: a document is either processed in full or
//! skipped in full, never partially re-processed.
//!
//! The rendered output must not change. Text is split on sentence
//! boundaries, every chunk keeps its interior whitespace verbatim, and only
//! leading newline/tab pretty-printing artifacts are stripped.

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{Attr, Document, NodeData, NodeId, QName};

/// Class carried by every injected marker.
pub const MARKER_CLASS: &str = "koboSpan";
/// Identifier prefix of every injected marker.
pub const MARKER_ID_PREFIX: &str = "kobo.";

/// Default sentence boundary: sentence-ending punctuation, optional closing
/// quotes/brackets, then a whitespace run — or a run of hard line breaks.
/// Trailing whitespace belongs to the chunk before the boundary.
static SENTENCE_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?:]['"\u{201d}\u{2019})\]]*\s+|\n+"#).unwrap());

/// How an element participates in span injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeClass {
    /// Starts a fresh paragraph number when it first yields a span.
    Block,
    /// Text is wrapped under the nearest enclosing block's number.
    Inline,
    /// Own text is never wrapped; children are still traversed.
    Opaque,
}

fn classify(tag: &str) -> NodeClass {
    match tag {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "dt" | "dd" | "th" | "td"
        | "caption" | "div" | "blockquote" | "pre" | "figcaption" | "address" | "section"
        | "article" | "aside" | "header" | "footer" => NodeClass::Block,
        "html" | "head" | "body" | "table" | "thead" | "tbody" | "tfoot" | "tr" | "ul" | "ol"
        | "dl" | "select" | "option" | "img" | "br" | "hr" | "svg" | "math" | "video" | "audio"
        | "object" | "iframe" | "script" | "style" | "title" => NodeClass::Opaque,
        _ => NodeClass::Inline,
    }
}

/// Paragraph/segment numbering for a single traversal.
///
/// Owned by one [`Segmenter::add_spans`] call; every invocation numbers from
/// `kobo.1.1`, so a container instance stays reusable across documents.
struct Counters {
    paragraph: u32,
    segment: u32,
}

impl Counters {
    fn new() -> Self {
        Self {
            paragraph: 0,
            segment: 0,
        }
    }

    fn start_paragraph(&mut self) {
        self.paragraph += 1;
        self.segment = 0;
    }

    fn next_id(&mut self) -> String {
        self.segment += 1;
        format!("{}{}.{}", MARKER_ID_PREFIX, self.paragraph, self.segment)
    }
}

/// Check whether a document already carries markers anywhere.
pub fn has_markers(doc: &Document) -> bool {
    doc.descendants(doc.document()).any(|id| {
        doc.has_class(id, MARKER_CLASS)
            || doc
                .attr(id, "id")
                .is_some_and(|v| v.starts_with(MARKER_ID_PREFIX))
    })
}

/// Inject spans with the default segmentation rules.
///
/// Returns whether any marker was created; an already-processed document is
/// left untouched.
pub fn add_spans(doc: &mut Document) -> bool {
    Segmenter::default().add_spans(doc)
}

/// The text-segmentation engine.
///
/// The exact boundary pattern is behavior, not incidental detail, and some
/// books want different rules — so it is configurable rather than
/// hard-wired.
pub struct Segmenter {
    boundary: Regex,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            boundary: SENTENCE_BOUNDARY_RE.clone(),
        }
    }
}

impl Segmenter {
    /// Create a segmenter with a custom boundary pattern. Chunks end at the
    /// end of each non-overlapping match of `boundary`.
    pub fn with_boundary(boundary: Regex) -> Self {
        Self { boundary }
    }

    /// Inject spans into a document. Returns whether any marker was created.
    pub fn add_spans(&self, doc: &mut Document) -> bool {
        if has_markers(doc) {
            return false;
        }
        let Some(body) = doc.body() else {
            return false;
        };

        let mut counters = Counters::new();
        let mut pending = true;
        self.visit(doc, body, &mut counters, &mut pending)
    }

    fn visit(
        &self,
        doc: &mut Document,
        el: NodeId,
        counters: &mut Counters,
        pending: &mut bool,
    ) -> bool {
        let class = doc
            .element_local(el)
            .map(classify)
            .unwrap_or(NodeClass::Opaque);
        let mut changed = false;

        #[derive(Clone, Copy)]
        enum Child {
            Text,
            BlockElement,
            OtherElement,
            Skip,
        }

        let children: Vec<NodeId> = doc.children(el).collect();
        for child in children {
            let kind = match doc.get(child).map(|n| &n.data) {
                Some(NodeData::Text(_)) => Child::Text,
                Some(NodeData::Element { name, .. }) => {
                    if classify(&name.local) == NodeClass::Block {
                        Child::BlockElement
                    } else {
                        Child::OtherElement
                    }
                }
                _ => Child::Skip,
            };

            match kind {
                Child::Text if class != NodeClass::Opaque => {
                    changed |= self.wrap_text_node(doc, child, counters, pending);
                }
                Child::Text | Child::Skip => {}
                Child::BlockElement => {
                    let mut block_pending = true;
                    changed |= self.visit(doc, child, counters, &mut block_pending);
                }
                Child::OtherElement => {
                    changed |= self.visit(doc, child, counters, pending);
                }
            }
        }
        changed
    }

    /// Replace one text node with a marker per chunk, splicing the markers
    /// into the node's position so sibling order is preserved exactly.
    fn wrap_text_node(
        &self,
        doc: &mut Document,
        text_node: NodeId,
        counters: &mut Counters,
        pending: &mut bool,
    ) -> bool {
        let Some(text) = doc.text(text_node).map(str::to_string) else {
            return false;
        };
        let chunks = self.split(&text);
        if chunks.is_empty() {
            // Whitespace-only runs are inter-node formatting, not content
            return false;
        }

        if *pending {
            counters.start_paragraph();
            *pending = false;
        }

        let prefix = doc
            .parent(text_node)
            .and_then(|p| doc.element_name(p))
            .and_then(|name| name.prefix.clone());

        for chunk in chunks {
            let id = counters.next_id();
            let span = doc.create_element(
                QName::with_prefix(prefix.clone(), "span"),
                vec![
                    Attr {
                        name: QName::new("class"),
                        value: MARKER_CLASS.to_string(),
                    },
                    Attr {
                        name: QName::new("id"),
                        value: id,
                    },
                ],
            );
            // Leading newlines/tabs are pretty-printing artifacts
            let content = chunk.trim_start_matches(['\n', '\t']);
            let content_node = doc.create_text(content);
            doc.append(span, content_node);
            doc.insert_before(text_node, span);
        }
        doc.detach(text_node);
        true
    }

    /// Split text into sentence-like chunks.
    ///
    /// The chunks always concatenate back to the input: whitespace-only
    /// pieces between boundaries are merged into the following chunk (or the
    /// preceding one at end of text). Returns no chunks for whitespace-only
    /// input.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        for m in self.boundary.find_iter(text) {
            if m.end() < text.len() {
                pieces.push((start, m.end()));
                start = m.end();
            }
        }
        pieces.push((start, text.len()));

        let mut chunks: Vec<(usize, usize)> = Vec::new();
        let mut carry: Option<usize> = None;
        for (s, e) in pieces {
            if text[s..e].trim().is_empty() {
                carry.get_or_insert(s);
                continue;
            }
            chunks.push((carry.take().unwrap_or(s), e));
        }
        if carry.is_some()
            && let Some(last) = chunks.last_mut()
        {
            last.1 = text.len();
        }

        chunks.into_iter().map(|(s, e)| &text[s..e]).collect()
    }
}
