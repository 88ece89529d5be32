//! XHTML document model.
//!
//! Content documents are parsed event-by-event with quick-xml into an
//! arena-allocated tree and serialized back deterministically. Whitespace in
//! text is preserved verbatim; whitespace inside tag syntax is normalized on
//! output.

mod arena;
pub mod parser;
pub mod serializer;

pub use arena::{Attr, Document, Node, NodeData, NodeId, QName};
pub use parser::parse_document;
pub use serializer::serialize;
