//! Template registry (first pass)
//!
//! For every sheet name seen anywhere in the input, the first file in list
//! order that yields a readable sheet of that name fixes the sheet's shape
//! and its fallback content. Later files are reconciled against it, never
//! the other way around.

use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::book::{SheetBook, WorkbookOpener};
use tally_core::SheetGrid;

/// The reference grid for one sheet name.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTemplate {
    name: String,
    grid: SheetGrid,
    source: PathBuf,
}

impl SheetTemplate {
    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original values of the first file defining the sheet
    pub fn grid(&self) -> &SheetGrid {
        &self.grid
    }

    /// `(rows, cols)` every contribution is reconciled to
    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    /// File the template was taken from
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Templates in discovery order, one per distinct sheet name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<SheetTemplate>,
    index: AHashMap<String, usize>,
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `grid` as the template for `name` unless one already exists.
    ///
    /// Returns whether the grid was registered. An existing template is never
    /// replaced.
    pub fn register(&mut self, name: &str, grid: SheetGrid, source: &Path) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.templates.len());
        self.templates.push(SheetTemplate {
            name: name.to_string(),
            grid,
            source: source.to_path_buf(),
        });
        true
    }

    /// Look up a template by sheet name
    pub fn get(&self, name: &str) -> Option<&SheetTemplate> {
        self.index.get(name).map(|&i| &self.templates[i])
    }

    /// Whether a template exists for this sheet name
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Templates in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &SheetTemplate> {
        self.templates.iter()
    }

    /// Number of distinct sheet names
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no sheet was discovered
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Outcome of the template pass.
#[derive(Debug, Clone, Default)]
pub struct TemplatePass {
    /// Registered templates
    pub registry: TemplateRegistry,
    /// Files that could not be opened at all
    pub unreadable_files: usize,
    /// Individual sheets that were listed but failed to decode
    pub unreadable_sheets: usize,
}

/// Build the template registry from the ordered file list.
///
/// Files that fail to open are skipped. A sheet that fails to decode is
/// skipped too, so the next file defining that name supplies the template.
pub fn build_templates<O: WorkbookOpener>(files: &[PathBuf], opener: &O) -> TemplatePass {
    let mut pass = TemplatePass::default();

    for path in files {
        let mut book = match opener.open(path) {
            Ok(book) => book,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                pass.unreadable_files += 1;
                continue;
            }
        };

        for name in book.sheet_names() {
            if pass.registry.contains(&name) {
                continue;
            }
            match book.read_sheet(&name) {
                Ok(grid) => {
                    tracing::debug!(
                        sheet = %name,
                        file = %path.display(),
                        rows = grid.rows(),
                        cols = grid.cols(),
                        "registered template"
                    );
                    pass.registry.register(&name, grid, path);
                }
                Err(e) => {
                    tracing::warn!(
                        sheet = %name,
                        file = %path.display(),
                        error = %e,
                        "skipping unreadable sheet"
                    );
                    pass.unreadable_sheets += 1;
                }
            }
        }
    }

    tracing::info!(
        sheets = pass.registry.len(),
        unreadable_files = pass.unreadable_files,
        "template pass complete"
    );
    pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{grid, paths, three_files, MemoryOpener};
    use pretty_assertions::assert_eq;
    use tally_core::CellValue;

    #[test]
    fn test_first_definer_wins() {
        let pass = build_templates(&paths(&["a.xlsx", "b.xlsx", "c.xlsx"]), &three_files());

        let names: Vec<&str> = pass.registry.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["S", "Other"]);

        let s = pass.registry.get("S").unwrap();
        assert_eq!(s.source(), Path::new("a.xlsx"));
        assert_eq!(s.grid().get(0, 0), Some(&CellValue::Number(10.0)));
        assert_eq!(s.shape(), (2, 2));
    }

    #[test]
    fn test_order_of_file_list_decides_template() {
        let pass = build_templates(&paths(&["b.xlsx", "a.xlsx"]), &three_files());
        let s = pass.registry.get("S").unwrap();
        assert_eq!(s.source(), Path::new("b.xlsx"));
        assert_eq!(s.grid().get(0, 0), Some(&CellValue::Number(20.0)));
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let pass = build_templates(&paths(&["missing.xlsx", "c.xlsx"]), &three_files());
        assert_eq!(pass.unreadable_files, 1);
        assert_eq!(pass.registry.len(), 1);
        assert!(pass.registry.contains("Other"));
    }

    #[test]
    fn test_broken_sheet_defers_to_next_file() {
        let opener = MemoryOpener::new()
            .with_broken_sheet("x.xlsx", "S")
            .with_sheet("x.xlsx", "T", grid(vec![vec![1.into()]]))
            .with_sheet("y.xlsx", "S", grid(vec![vec![2.into(), 3.into()]]));
        let pass = build_templates(&paths(&["x.xlsx", "y.xlsx"]), &opener);

        assert_eq!(pass.unreadable_sheets, 1);
        assert_eq!(pass.registry.get("S").unwrap().source(), Path::new("y.xlsx"));
        assert_eq!(pass.registry.get("S").unwrap().shape(), (1, 2));
        let names: Vec<&str> = pass.registry.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["T", "S"]);
    }

    #[test]
    fn test_register_never_replaces() {
        let mut registry = TemplateRegistry::new();
        assert!(registry.register("S", SheetGrid::new(1, 1), Path::new("a")));
        assert!(!registry.register("S", SheetGrid::new(3, 3), Path::new("b")));
        assert_eq!(registry.get("S").unwrap().shape(), (1, 1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let pass = build_templates(&[], &MemoryOpener::new());
        assert!(pass.registry.is_empty());
        assert_eq!(pass.unreadable_files, 0);
    }
}
