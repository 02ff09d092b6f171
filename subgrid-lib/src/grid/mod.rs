//! Grid orchestration.
//!
//! [`GridLoader`] turns a query into a [`GridPage`] of projected items with
//! its [`PageWindow`], and into a [`GridHeader`] of columns. [`GridState`]
//! keeps what the grid shows across fetch cycles.

mod columns;
mod loader;
mod state;
mod window;

pub use columns::Column;
pub use columns::GridHeader;
pub use columns::MIN_COLUMN_WIDTH;
pub use columns::column_width;
pub use columns::sort_columns;
pub use loader::GridLoader;
pub use loader::GridPage;
pub use state::CycleTicket;
pub use state::GridState;
pub use window::PageWindow;
