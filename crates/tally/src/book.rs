//! Workbook access seen from the engine
//!
//! The passes never talk to a file format directly. They go through
//! [`WorkbookOpener`] and [`SheetBook`], which are implemented for XLSX by
//! [`XlsxOpener`] and can be implemented over in-memory data for tests.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::error::TallyResult;
use tally_core::SheetGrid;
use tally_xlsx::{XlsxReader, XlsxWorkbook};

/// An opened workbook: a list of sheet names plus on-demand sheet decoding.
pub trait SheetBook {
    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Whether a sheet with exactly this name exists
    fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|n| n == name)
    }

    /// Decode one sheet into a positional grid
    fn read_sheet(&mut self, name: &str) -> TallyResult<SheetGrid>;
}

/// Opens a workbook file for one pass. Every pass opens every file afresh.
pub trait WorkbookOpener {
    type Book: SheetBook;

    fn open(&self, path: &Path) -> TallyResult<Self::Book>;
}

/// Opens `.xlsx` / `.xlsm` packages with [`tally_xlsx`].
///
/// Legacy `.xls` and binary `.xlsb` workbooks fail to open and are skipped
/// by the passes like any other unreadable file.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxOpener;

impl WorkbookOpener for XlsxOpener {
    type Book = XlsxWorkbook<BufReader<File>>;

    fn open(&self, path: &Path) -> TallyResult<Self::Book> {
        Ok(XlsxReader::open(path)?)
    }
}

impl<R: Read + Seek> SheetBook for XlsxWorkbook<R> {
    fn sheet_names(&self) -> Vec<String> {
        XlsxWorkbook::sheet_names(self)
    }

    fn has_sheet(&self, name: &str) -> bool {
        XlsxWorkbook::has_sheet(self, name)
    }

    fn read_sheet(&mut self, name: &str) -> TallyResult<SheetGrid> {
        Ok(XlsxWorkbook::read_sheet(self, name)?)
    }
}
