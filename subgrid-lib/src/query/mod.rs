//! FetchXML query analysis and paging.
//!
//! - [`QueryDocument`] walks a query once and exposes its structure
//! - the `parse_*` functions answer one question per call
//! - [`rewrite`] injects page and window size for a grid page

mod analyzer;
mod document;
mod paging;

pub use analyzer::*;
pub use document::AGGREGATE_LITERAL;
pub use document::AttributeRef;
pub use document::LinkEntity;
pub use document::OrderDirective;
pub use document::QueryDocument;
pub use paging::rewrite;
pub use paging::set_fetch_attributes;
