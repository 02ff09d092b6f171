//! Typed models

mod item;
mod metadata;
mod record;

pub use item::*;
pub use metadata::*;
pub use record::*;
