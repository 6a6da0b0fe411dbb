//! Output composer and the aggregation entry point

use std::path::{Path, PathBuf};

use ahash::AHashSet;

use crate::accumulate::{accumulate, AccumulatorState};
use crate::book::WorkbookOpener;
use crate::error::{TallyError, TallyResult};
use crate::template::{build_templates, SheetTemplate};
use tally_core::{CellValue, SheetGrid};
use tally_xlsx::XlsxWriter;

/// Longest sheet name a workbook accepts
const MAX_SHEET_NAME_LEN: usize = 31;

/// Merge sums with template values.
///
/// A position any file contributed a number to holds the sum; every other
/// position keeps the template's original value, text and blanks included.
pub fn compose_sheet(template: &SheetTemplate, state: &AccumulatorState) -> SheetGrid {
    let (rows, cols) = template.shape();
    let mut out = SheetGrid::new(rows, cols);

    for i in 0..rows {
        for j in 0..cols {
            let value = if state.contributed(i, j) {
                CellValue::Number(state.sum(i, j))
            } else {
                template.grid().get_or_empty(i, j).clone()
            };
            out.set(i, j, value);
        }
    }

    out
}

/// One named output sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetOutput {
    pub name: String,
    pub grid: SheetGrid,
}

/// Counters describing how much of the input was usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// Files in the input list
    pub files: usize,
    /// Files that could not be opened while building templates
    pub unreadable_files: usize,
    /// Sheet reads skipped in either pass
    pub skipped_sheets: usize,
    /// Sheets in the output
    pub sheets: usize,
}

/// Aggregated sheets in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub sheets: Vec<SheetOutput>,
    pub stats: AggregationStats,
}

impl Aggregation {
    /// Look up an output sheet by name
    pub fn sheet(&self, name: &str) -> Option<&SheetGrid> {
        self.sheets.iter().find(|s| s.name == name).map(|s| &s.grid)
    }

    /// Whether no sheet was discovered in any file
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Sheet names as written: a name equal to an earlier one ignoring case
    /// gets the smallest free numeric suffix, e.g. "SHEET1" after "Sheet1"
    /// becomes "SHEET11".
    pub fn output_names(&self) -> Vec<String> {
        let mut taken = AHashSet::new();
        let mut names = Vec::with_capacity(self.sheets.len());

        for sheet in &self.sheets {
            let mut name = sheet.name.clone();
            let mut suffix = 0u32;
            while !taken.insert(name.to_lowercase()) {
                suffix += 1;
                let digits = suffix.to_string();
                let keep = MAX_SHEET_NAME_LEN.saturating_sub(digits.len());
                name = sheet.name.chars().take(keep).collect::<String>() + &digits;
            }
            if suffix > 0 {
                tracing::warn!(
                    sheet = %sheet.name,
                    renamed = %name,
                    "sheet name differs from an earlier one only in case"
                );
            }
            names.push(name);
        }
        names
    }

    /// Write every sheet to one workbook, in discovery order, under
    /// [`output_names`](Self::output_names)
    pub fn write<P: AsRef<Path>>(&self, path: P) -> TallyResult<()> {
        let path = path.as_ref();
        let names = self.output_names();
        XlsxWriter::write_file(
            names
                .iter()
                .map(String::as_str)
                .zip(self.sheets.iter().map(|s| &s.grid)),
            path,
        )
        .map_err(|source| TallyError::WriteXlsx {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), sheets = self.sheets.len(), "wrote aggregate");
        Ok(())
    }
}

/// Run both passes over the ordered file list and compose the output.
///
/// Unreadable files and sheets are skipped, so this never fails; an input
/// with no readable sheet yields an empty [`Aggregation`].
pub fn aggregate<O: WorkbookOpener>(files: &[PathBuf], opener: &O) -> Aggregation {
    let pass = build_templates(files, opener);
    let acc = accumulate(files, opener, &pass.registry);

    let sheets: Vec<SheetOutput> = pass
        .registry
        .iter()
        .map(|template| {
            let (rows, cols) = template.shape();
            let grid = match acc.state(template.name()) {
                Some(state) => compose_sheet(template, state),
                None => compose_sheet(template, &AccumulatorState::new(rows, cols)),
            };
            SheetOutput {
                name: template.name().to_string(),
                grid,
            }
        })
        .collect();

    let stats = AggregationStats {
        files: files.len(),
        unreadable_files: pass.unreadable_files,
        skipped_sheets: pass.unreadable_sheets + acc.skipped_sheets,
        sheets: sheets.len(),
    };
    tracing::info!(
        files = stats.files,
        unreadable_files = stats.unreadable_files,
        skipped_sheets = stats.skipped_sheets,
        sheets = stats.sheets,
        "aggregation complete"
    );

    Aggregation { sheets, stats }
}
