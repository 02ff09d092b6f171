//! FetchXML parse errors

/// Errors raised while walking a FetchXML document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The XML itself is not well formed.
    #[error("Malformed FetchXML at byte {position}: {message}")]
    Malformed {
        /// Byte offset reported by the reader.
        position: u64,
        /// Reader error message.
        message: String,
    },

    /// The input contains no element at all.
    #[error("FetchXML document is empty")]
    Empty,

    /// The root element is not `<fetch>`.
    #[error("Unexpected root element <{found}>, expected <fetch>")]
    UnexpectedRoot { found: String },

    /// A second top-level element follows the root.
    #[error("Unexpected element <{found}> after the root element")]
    TrailingElement { found: String },

    /// The document ended while an element was still open.
    #[error("Unclosed element <{name}>")]
    Unclosed { name: String },

    /// An element is missing an attribute the grammar requires.
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
}

impl ParseError {
    /// Creates a new malformed-document error.
    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }
}
