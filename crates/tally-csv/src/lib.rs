//! # tally-csv
//!
//! Writes a [`SheetGrid`](tally_core::SheetGrid) as delimited text.

mod error;
mod options;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvWriteOptions, LineTerminator};
pub use writer::{format_value, CsvWriter};
