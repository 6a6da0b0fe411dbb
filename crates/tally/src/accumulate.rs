//! Accumulator (second pass)
//!
//! Every file's copy of a sheet is reconciled to the template shape purely
//! by position: `(i, j)` in the file meets `(i, j)` in the template. Cells the
//! file does not have read as blank, cells beyond the template are dropped.

use std::path::PathBuf;

use ahash::AHashMap;

use crate::book::{SheetBook, WorkbookOpener};
use crate::coerce::coerce_numeric;
use crate::template::TemplateRegistry;
use tally_core::SheetGrid;

/// Running sums for one sheet, always exactly the template's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorState {
    rows: usize,
    cols: usize,
    sum: Vec<f64>,
    contributed: Vec<bool>,
}

impl AccumulatorState {
    /// All-zero sums and no contributions
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            sum: vec![0.0; rows * cols],
            contributed: vec![false; rows * cols],
        }
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Sum at a position; zero outside the shape
    pub fn sum(&self, row: usize, col: usize) -> f64 {
        self.offset(row, col).map_or(0.0, |i| self.sum[i])
    }

    /// Whether any file contributed a number at a position
    pub fn contributed(&self, row: usize, col: usize) -> bool {
        self.offset(row, col).is_some_and(|i| self.contributed[i])
    }

    /// Fold one file's grid into the sums.
    ///
    /// Only the overlap of the two shapes is visited. Returns the number of
    /// numeric contributions made.
    pub fn fold(&mut self, grid: &SheetGrid) -> usize {
        let rows = self.rows.min(grid.rows());
        let cols = self.cols.min(grid.cols());
        let mut contributions = 0;

        for i in 0..rows {
            for j in 0..cols {
                if let Some(n) = coerce_numeric(grid.get_or_empty(i, j)) {
                    let k = i * self.cols + j;
                    self.sum[k] += n;
                    self.contributed[k] = true;
                    contributions += 1;
                }
            }
        }

        contributions
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }
}

/// What one file offers for one sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetFetch {
    /// The sheet was read
    Loaded(SheetGrid),
    /// The file has no sheet of that name
    Absent,
    /// The file or sheet could not be read
    Skipped(String),
}

impl SheetFetch {
    /// Fetch `name` from an opened book
    pub fn from_book<B: SheetBook>(book: &mut B, name: &str) -> Self {
        if !book.has_sheet(name) {
            return SheetFetch::Absent;
        }
        match book.read_sheet(name) {
            Ok(grid) => SheetFetch::Loaded(grid),
            Err(e) => SheetFetch::Skipped(e.to_string()),
        }
    }
}

/// Outcome of the accumulation pass, keyed by sheet name.
#[derive(Debug, Clone, Default)]
pub struct Accumulation {
    states: AHashMap<String, AccumulatorState>,
    /// Files that could not be opened at all
    pub unreadable_files: usize,
    /// Sheet reads that failed in files that did open
    pub skipped_sheets: usize,
}

impl Accumulation {
    /// Sums for one sheet name
    pub fn state(&self, name: &str) -> Option<&AccumulatorState> {
        self.states.get(name)
    }
}

/// Sum every file's contribution into per-sheet states.
///
/// Each file is opened once; every registered sheet is then fetched from it.
/// Absent, unreadable and skipped sheets all contribute nothing.
pub fn accumulate<O: WorkbookOpener>(
    files: &[PathBuf],
    opener: &O,
    registry: &TemplateRegistry,
) -> Accumulation {
    let mut acc = Accumulation {
        states: registry
            .iter()
            .map(|t| {
                let (rows, cols) = t.shape();
                (t.name().to_string(), AccumulatorState::new(rows, cols))
            })
            .collect(),
        ..Default::default()
    };

    for path in files {
        let mut book = match opener.open(path) {
            Ok(book) => book,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "file contributes nothing");
                acc.unreadable_files += 1;
                continue;
            }
        };

        for template in registry.iter() {
            let name = template.name();
            match SheetFetch::from_book(&mut book, name) {
                SheetFetch::Loaded(grid) => {
                    if grid.shape() != template.shape() {
                        tracing::debug!(
                            sheet = name,
                            file = %path.display(),
                            shape = ?grid.shape(),
                            template = ?template.shape(),
                            "reconciling shape"
                        );
                    }
                    if let Some(state) = acc.states.get_mut(name) {
                        let n = state.fold(&grid);
                        tracing::debug!(sheet = name, file = %path.display(), contributions = n);
                    }
                }
                SheetFetch::Absent => {}
                SheetFetch::Skipped(reason) => {
                    tracing::warn!(
                        sheet = name,
                        file = %path.display(),
                        error = %reason,
                        "sheet contributes nothing"
                    );
                    acc.skipped_sheets += 1;
                }
            }
        }
    }

    acc
}
