//! # kepub
//!
//! A library for transforming the content documents of an e-book container
//! into Kobo's KEPUB flavor, so the device can track reading position at
//! sub-paragraph granularity.
//!
//! ## Features
//!
//! - Cached, transactional view of a multi-file container (logical names,
//!   media types, raw bytes, parsed trees, dirty tracking)
//! - Cleanup of office-suite markup cruft and malformed self-closing tags
//! - The fixed `book-columns`/`book-inner` body wrapper
//! - Sentence-level `koboSpan` injection, idempotent and
//!   whitespace-preserving
//!
//! ## Quick Start
//!
//! ```no_run
//! use kepub::{Container, MediaType};
//!
//! // The packaging layer extracts the EPUB and lists its manifest
//! let mut container = Container::new("/tmp/book");
//! container.insert_entry("OEBPS/ch01.xhtml", MediaType::Xhtml);
//! container.insert_entry("OEBPS/ch02.xhtml", MediaType::Xhtml);
//!
//! // The KEPUB pipeline
//! container.clean_markup()?;
//! container.add_kobo_divs()?;
//! container.add_kobo_spans()?;
//!
//! // The dirty set tells the packaging layer what to re-register
//! for name in container.dirty_names() {
//!     println!("changed: {name}");
//! }
//! # Ok::<(), kepub::Error>(())
//! ```

pub mod clean;
pub mod container;
pub mod dom;
pub mod error;
pub mod kobo;
pub mod media;
pub(crate) mod util;

pub use container::{Container, Entry, Normalize};
pub use error::{Error, Result};
pub use kobo::spans::Segmenter;
pub use media::MediaType;
