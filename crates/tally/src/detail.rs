//! Detail sampler
//!
//! Pulls a few named cells out of every input file into a flat table with
//! one row per file and a trailing totals row. Each file's sheet is read on
//! its own terms: bounds come from the file's grid, not from any template.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::{AHashMap, AHashSet};

use crate::book::{SheetBook, WorkbookOpener};
use crate::coerce::coerce_or_zero;
use crate::error::{TallyError, TallyResult};
use tally_core::{CellAddress, CellValue, SheetGrid};
use tally_csv::{CsvWriteOptions, CsvWriter};
use tally_xlsx::XlsxWriter;

/// Sheet name used when the table is written as a workbook
pub const DETAIL_SHEET_NAME: &str = "Sheet1";

/// A `"<sheet>:<cell>"` pair naming one sampled cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailTarget {
    sheet: String,
    cell: String,
    address: CellAddress,
}

impl DetailTarget {
    /// Build a target from its parts, validating the address
    pub fn new(sheet: &str, cell: &str) -> TallyResult<Self> {
        let spec = format!("{}:{}", sheet, cell);
        let sheet = sheet.trim();
        let cell = cell.trim();

        if sheet.is_empty() {
            return Err(TallyError::InvalidTarget {
                spec,
                reason: "empty sheet name".into(),
            });
        }
        let address = CellAddress::parse(cell).map_err(|e| TallyError::InvalidTarget {
            spec: spec.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            sheet: sheet.to_string(),
            cell: cell.to_string(),
            address,
        })
    }

    /// Parse `"<sheet>:<cell>"`, splitting at the first colon.
    ///
    /// ```
    /// use tally::DetailTarget;
    ///
    /// let target = DetailTarget::parse("Cafeteria:N18").unwrap();
    /// assert_eq!(target.address().position(), (17, 13));
    /// assert_eq!(target.column_key(), "Cafeteria_N18");
    /// ```
    pub fn parse(spec: &str) -> TallyResult<Self> {
        match spec.split_once(':') {
            Some((sheet, cell)) => Self::new(sheet, cell),
            None => Err(TallyError::InvalidTarget {
                spec: spec.to_string(),
                reason: "expected <sheet>:<cell>".into(),
            }),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// The cell address as the caller wrote it
    pub fn cell(&self) -> &str {
        &self.cell
    }

    pub fn address(&self) -> CellAddress {
        self.address
    }

    /// Column label in the detail table
    pub fn column_key(&self) -> String {
        format!("{}_{}", self.sheet, self.cell)
    }
}

impl fmt::Display for DetailTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sheet, self.cell)
    }
}

impl FromStr for DetailTarget {
    type Err = TallyError;

    fn from_str(s: &str) -> TallyResult<Self> {
        Self::parse(s)
    }
}

/// Parse every specifier up front. The first malformed one is an error;
/// targets sharing a column key collapse into the first.
pub fn parse_targets<I, S>(specs: I) -> TallyResult<Vec<DetailTarget>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = AHashSet::new();
    let mut targets = Vec::new();
    for spec in specs {
        let target = DetailTarget::parse(spec.as_ref())?;
        if seen.insert(target.column_key()) {
            targets.push(target);
        }
    }
    Ok(targets)
}

/// Labels of the non-numeric parts of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailOptions {
    /// Header of the file name column
    pub file_column: String,
    /// File name cell of the totals row
    pub totals_label: String,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            file_column: "文件名".to_string(),
            totals_label: "合计".to_string(),
        }
    }
}

/// One file's sampled values, in target order
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub file_name: String,
    pub values: Vec<f64>,
}

/// Per-file samples plus their column totals.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailTable {
    options: DetailOptions,
    columns: Vec<String>,
    rows: Vec<DetailRow>,
    totals: Vec<f64>,
}

impl DetailTable {
    /// Build a table, computing the totals row from `rows`
    pub fn new(options: DetailOptions, columns: Vec<String>, rows: Vec<DetailRow>) -> Self {
        let mut totals = vec![0.0; columns.len()];
        for row in &rows {
            for (total, value) in totals.iter_mut().zip(&row.values) {
                *total += value;
            }
        }
        Self {
            options,
            columns,
            rows,
            totals,
        }
    }

    /// Target column keys, without the file name column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[DetailRow] {
        &self.rows
    }

    /// Column sums over all file rows
    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    /// Header row, one row per file, then the totals row
    pub fn to_grid(&self) -> SheetGrid {
        let header = std::iter::once(self.options.file_column.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .map(CellValue::string)
            .collect::<Vec<_>>();

        let body = self.rows.iter().map(|row| {
            std::iter::once(CellValue::string(&row.file_name))
                .chain(row.values.iter().map(|&v| CellValue::Number(v)))
                .collect::<Vec<_>>()
        });

        let totals = std::iter::once(CellValue::string(&self.options.totals_label))
            .chain(self.totals.iter().map(|&v| CellValue::Number(v)))
            .collect::<Vec<_>>();

        SheetGrid::from_rows(std::iter::once(header).chain(body).chain(std::iter::once(totals)))
    }

    /// Write the table, as delimited text when the extension is `.csv`
    /// (any case) and as a workbook otherwise.
    pub fn write<P: AsRef<Path>>(&self, path: P, csv: &CsvWriteOptions) -> TallyResult<()> {
        let path = path.as_ref();
        let grid = self.to_grid();

        if is_csv_path(path) {
            CsvWriter::write_file(&grid, path, csv).map_err(|source| TallyError::WriteCsv {
                path: path.to_path_buf(),
                source,
            })?;
        } else {
            XlsxWriter::write_file([(DETAIL_SHEET_NAME, &grid)], path).map_err(|source| {
                TallyError::WriteXlsx {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        }

        tracing::info!(path = %path.display(), rows = self.rows.len(), "wrote detail table");
        Ok(())
    }

    /// Write the table as delimited text to any writer
    pub fn write_csv<W: Write>(&self, writer: W, csv: &CsvWriteOptions) -> TallyResult<()> {
        CsvWriter::write(&self.to_grid(), writer, csv).map_err(|source| TallyError::WriteCsv {
            path: PathBuf::from("-"),
            source,
        })
    }
}

fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Sample every target from every file.
///
/// A target reads as zero when its sheet is missing or unreadable, when the
/// address lies outside that file's grid, or when the value is not a number.
/// A file that cannot be opened gets a row of zeros.
pub fn sample_details<O: WorkbookOpener>(
    files: &[PathBuf],
    targets: &[DetailTarget],
    opener: &O,
    options: &DetailOptions,
) -> DetailTable {
    let columns = targets.iter().map(DetailTarget::column_key).collect();
    let mut rows = Vec::with_capacity(files.len());

    for path in files {
        let values = match opener.open(path) {
            Ok(mut book) => sample_book(&mut book, path, targets),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "sampling as zeros");
                vec![0.0; targets.len()]
            }
        };
        rows.push(DetailRow {
            file_name: file_name(path),
            values,
        });
    }

    DetailTable::new(options.clone(), columns, rows)
}

fn sample_book<B: SheetBook>(book: &mut B, path: &Path, targets: &[DetailTarget]) -> Vec<f64> {
    // Several targets often share a sheet; decode each sheet once per file
    let mut grids: AHashMap<&str, Option<SheetGrid>> = AHashMap::new();

    targets
        .iter()
        .map(|target| {
            let grid = grids.entry(target.sheet()).or_insert_with(|| {
                if !book.has_sheet(target.sheet()) {
                    return None;
                }
                book.read_sheet(target.sheet())
                    .map_err(|e| {
                        tracing::warn!(
                            sheet = target.sheet(),
                            file = %path.display(),
                            error = %e,
                            "sampling sheet as zeros"
                        );
                    })
                    .ok()
            });

            let (row, col) = target.address().position();
            grid.as_ref()
                .and_then(|g| g.get(row, col))
                .map_or(0.0, coerce_or_zero)
        })
        .collect()
}
