//! In-memory workbooks for unit tests

use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::book::{SheetBook, WorkbookOpener};
use crate::error::{TallyError, TallyResult};
use tally_core::{CellValue, SheetGrid};

/// Sheets keyed by file path. A `None` grid lists the sheet but fails to read it.
#[derive(Debug, Default)]
pub(crate) struct MemoryOpener {
    books: AHashMap<PathBuf, Vec<(String, Option<SheetGrid>)>>,
}

impl MemoryOpener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_sheet(mut self, path: &str, name: &str, grid: SheetGrid) -> Self {
        self.books
            .entry(PathBuf::from(path))
            .or_default()
            .push((name.to_string(), Some(grid)));
        self
    }

    pub(crate) fn with_broken_sheet(mut self, path: &str, name: &str) -> Self {
        self.books
            .entry(PathBuf::from(path))
            .or_default()
            .push((name.to_string(), None));
        self
    }
}

#[derive(Debug)]
pub(crate) struct MemoryBook {
    sheets: Vec<(String, Option<SheetGrid>)>,
}

impl SheetBook for MemoryBook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(n, _)| n.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> TallyResult<SheetGrid> {
        match self.sheets.iter().find(|(n, _)| n == name) {
            Some((_, Some(grid))) => Ok(grid.clone()),
            Some((_, None)) => Err(TallyError::Unreadable(format!("sheet '{}' is corrupt", name))),
            None => Err(TallyError::Unreadable(format!("no sheet '{}'", name))),
        }
    }
}

impl WorkbookOpener for MemoryOpener {
    type Book = MemoryBook;

    fn open(&self, path: &Path) -> TallyResult<MemoryBook> {
        self.books
            .get(path)
            .map(|sheets| MemoryBook {
                sheets: sheets.clone(),
            })
            .ok_or_else(|| TallyError::Unreadable(format!("cannot open {}", path.display())))
    }
}

pub(crate) fn grid(rows: Vec<Vec<CellValue>>) -> SheetGrid {
    SheetGrid::from_rows(rows)
}

pub(crate) fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

/// Files A and B define sheet "S"; C does not.
pub(crate) fn three_files() -> MemoryOpener {
    MemoryOpener::new()
        .with_sheet(
            "a.xlsx",
            "S",
            grid(vec![
                vec![10.into(), "Hdr".into()],
                vec!["".into(), 5.into()],
            ]),
        )
        .with_sheet(
            "b.xlsx",
            "S",
            grid(vec![
                vec![20.into(), "Hdr".into()],
                vec!["".into(), "".into()],
            ]),
        )
        .with_sheet("c.xlsx", "Other", grid(vec![vec![1.into()]]))
}
