//! Cell-related types
//!
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location (e.g., "N18")

mod address;
mod date;
mod value;

pub use address::CellAddress;
pub use date::{serial_to_datetime, DATE1904_OFFSET};
pub use value::{CellError, CellValue, SharedString};
