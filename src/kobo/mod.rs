//! Kobo-specific document transforms.
//!
//! - [`divs`]: the fixed two-level body wrapper the device's pagination CSS
//!   expects.
//! - [`spans`]: sentence-level `koboSpan` markers that let the firmware
//!   track reading position at sub-paragraph granularity.
//!
//! Both transforms are idempotent: an already-processed document is left
//! untouched and the operation reports `false`.

pub mod divs;
pub mod spans;

pub use divs::{ensure_wrapped, is_wrapped};
pub use spans::{Segmenter, add_spans, has_markers};
