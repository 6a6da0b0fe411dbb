//! # tally-xlsx
//!
//! XLSX (Office Open XML) reader and writer for sheet-tally.
//!
//! The reader exposes a workbook's sheet names and decodes one sheet at a
//! time into a positional [`SheetGrid`](tally_core::SheetGrid). The writer
//! serializes an ordered set of named grids into a new workbook. Styles are
//! read only to tell dates from numbers. Formulas and merged ranges are out
//! of scope in both directions.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{XlsxError, XlsxResult};
pub use reader::{XlsxReader, XlsxWorkbook};
pub use writer::XlsxWriter;
