//! Error types for the aggregation engine

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`TallyError`]
pub type TallyResult<T> = std::result::Result<T, TallyError>;

/// Errors surfaced by the engine.
///
/// Per-file read failures during the aggregation and sampling passes are not
/// reported through this type to callers; they are logged and the file is
/// treated as contributing nothing.
#[derive(Debug, Error)]
pub enum TallyError {
    /// The input path is neither a directory, a spreadsheet nor a readable archive
    #[error("Unrecognized input '{}': {reason}", .path.display())]
    UnrecognizedInput { path: PathBuf, reason: String },

    /// A detail target specifier or its cell address is malformed
    #[error("Invalid detail target '{spec}': {reason}")]
    InvalidTarget { spec: String, reason: String },

    /// A workbook or one of its sheets could not be read
    #[error("Unreadable workbook: {0}")]
    Unreadable(String),

    /// Writing a spreadsheet output failed
    #[error("Failed to write '{}': {source}", .path.display())]
    WriteXlsx {
        path: PathBuf,
        #[source]
        source: tally_xlsx::XlsxError,
    },

    /// Writing a delimited-text output failed
    #[error("Failed to write '{}': {source}", .path.display())]
    WriteCsv {
        path: PathBuf,
        #[source]
        source: tally_csv::CsvError,
    },

    /// XLSX reader error
    #[error(transparent)]
    Xlsx(#[from] tally_xlsx::XlsxError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
