//! FetchXML subgrid library
//!
//! Turns a FetchXML query into a paged, display-ready grid: the query is
//! analysed and rewritten for paging, records and metadata are fetched from a
//! [`service::DataService`], and every record is projected into cells whose
//! display value depends on the attribute type and where the attribute comes
//! from (root entity, link-entity or aggregate alias).

pub mod config;
pub mod error;
pub mod grid;
pub mod model;
pub mod projection;
pub mod query;
pub mod service;
pub mod webapi;

pub use error::Error;
pub use grid::GridLoader;
pub use grid::GridPage;
pub use grid::GridState;
