//! # tally-core
//!
//! Core data structures shared by the sheet-tally crates.
//!
//! - [`CellValue`] - a raw cell value as read from a workbook
//! - [`serial_to_datetime`] - calendar view of a date cell's serial
//! - [`CellAddress`] - an A1-style cell address resolved to zero-based indices
//! - [`SheetGrid`] - a dense, positional 2-D grid of cell values
//!
//! ## Example
//!
//! ```rust
//! use tally_core::{CellAddress, CellValue, SheetGrid};
//!
//! let mut grid = SheetGrid::new(2, 2);
//! grid.set(0, 1, CellValue::string("Hdr"));
//!
//! let addr = CellAddress::parse("B1").unwrap();
//! assert_eq!(grid.get(addr.row as usize, addr.col as usize).and_then(|v| v.as_string()), Some("Hdr"));
//! ```

pub mod cell;
pub mod error;
pub mod grid;

pub use cell::{
    serial_to_datetime, CellAddress, CellError, CellValue, SharedString, DATE1904_OFFSET,
};
pub use error::{Error, Result};
pub use grid::SheetGrid;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Largest sheet extent, in cells, that is materialised as a dense grid
pub const MAX_GRID_CELLS: usize = 1 << 24;
