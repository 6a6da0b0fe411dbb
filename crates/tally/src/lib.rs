//! # tally
//!
//! Cell-by-cell aggregation of structurally similar spreadsheets.
//!
//! For each sheet name found in the input, the first file defining it fixes
//! the sheet's shape and fallback content (the template). Every file holding
//! a sheet of that name then adds its numbers into the matching positions.
//! A position that received a number holds the sum; every other position
//! keeps the template's value, so headers and labels survive.
//!
//! Unreadable files and sheets are logged and skipped. They never abort a
//! batch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tally::{aggregate, parse_targets, resolve_input, sample_details, DetailOptions, XlsxOpener};
//!
//! let input = resolve_input(Path::new("reports.zip"))?;
//! let result = aggregate(input.files(), &XlsxOpener);
//! result.write("summary.xlsx")?;
//!
//! let targets = parse_targets(["Cafeteria:N18"])?;
//! let table = sample_details(input.files(), &targets, &XlsxOpener, &DetailOptions::default());
//! table.write("detail.csv", &Default::default())?;
//!
//! input.cleanup()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod accumulate;
pub mod book;
pub mod coerce;
pub mod compose;
pub mod detail;
pub mod error;
pub mod source;
pub mod template;

#[cfg(test)]
mod testing;

pub use accumulate::{accumulate, Accumulation, AccumulatorState, SheetFetch};
pub use book::{SheetBook, WorkbookOpener, XlsxOpener};
pub use coerce::{coerce_numeric, coerce_or_zero, coerce_text};
pub use compose::{aggregate, compose_sheet, Aggregation, AggregationStats, SheetOutput};
pub use detail::{
    parse_targets, sample_details, DetailOptions, DetailRow, DetailTable, DetailTarget,
};
pub use error::{TallyError, TallyResult};
pub use source::{is_spreadsheet, resolve_input, InputFiles, SPREADSHEET_EXTENSIONS};
pub use template::{build_templates, SheetTemplate, TemplatePass, TemplateRegistry};

pub use tally_core::{CellAddress, CellValue, SheetGrid};
pub use tally_csv::CsvWriteOptions;
