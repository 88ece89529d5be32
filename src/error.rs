//! Error types for kepub operations.

use thiserror::Error;

/// Errors that can occur while transforming a KEPUB container.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("No container entry named '{0}'")]
    NotFound(String),

    #[error("Container entry '{0}' already exists")]
    DuplicateName(String),

    #[error("Declared encoding '{encoding}' cannot decode '{name}'")]
    Encoding { name: String, encoding: String },

    #[error("Failed to parse '{name}': {reason}")]
    MalformedMarkup { name: String, reason: String },

    #[error("Structural invariant violated: {0}")]
    StructuralInvariant(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedFormat(String),
}

impl Error {
    /// Attach a logical name to a parse failure.
    pub(crate) fn into_markup_error(self, name: &str) -> Error {
        match self {
            Error::Xml(e) => Error::MalformedMarkup {
                name: name.to_string(),
                reason: e.to_string(),
            },
            Error::MalformedMarkup { reason, .. } => Error::MalformedMarkup {
                name: name.to_string(),
                reason,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
