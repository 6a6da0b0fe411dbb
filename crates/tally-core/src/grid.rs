//! Dense positional grids
//!
//! A [`SheetGrid`] is what a worksheet looks like to the aggregation engine:
//! a rectangle of [`CellValue`]s anchored at A1, addressed purely by
//! `(row, col)`. There is no header row and no column naming.

use crate::cell::CellValue;
use crate::error::{Error, Result};
use crate::MAX_GRID_CELLS;

static EMPTY: CellValue = CellValue::Empty;

/// A rectangular, row-major grid of cell values anchored at A1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    rows: usize,
    cols: usize,
    cells: Vec<CellValue>,
}

impl SheetGrid {
    /// Create a grid of the given shape filled with empty cells
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![CellValue::Empty; rows * cols],
        }
    }

    /// Build a grid from row vectors; ragged rows are padded with empty cells
    /// to the width of the widest row.
    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = CellValue>,
    {
        let rows: Vec<Vec<CellValue>> = rows
            .into_iter()
            .map(|r| r.into_iter().collect())
            .collect();
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = Self::new(rows.len(), cols);
        for (i, row) in rows.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                grid.set(i, j, value);
            }
        }
        grid
    }

    /// Build a grid from sparse `(row, col, value)` cells.
    ///
    /// The extent runs from A1 to the last row and the last column holding a
    /// non-blank value, so leading blank rows and columns are kept and
    /// trailing ones are dropped.
    ///
    /// Fails with [`Error::GridTooLarge`] instead of allocating when the
    /// extent exceeds [`MAX_GRID_CELLS`], e.g. a lone value in the last row.
    pub fn from_sparse<I>(cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, u16, CellValue)>,
    {
        let cells: Vec<(u32, u16, CellValue)> = cells
            .into_iter()
            .filter(|(_, _, v)| !v.is_blank())
            .collect();
        let rows = cells.iter().map(|(r, _, _)| *r as usize + 1).max().unwrap_or(0);
        let cols = cells.iter().map(|(_, c, _)| *c as usize + 1).max().unwrap_or(0);
        if rows.saturating_mul(cols) > MAX_GRID_CELLS {
            return Err(Error::GridTooLarge { rows, cols });
        }

        let mut grid = Self::new(rows, cols);
        for (r, c, value) in cells {
            grid.set(r as usize, c as usize, value);
        }
        Ok(grid)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Whether the grid has no cells at all
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get the value at a position, or `None` outside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Get the value at a position, reading anything outside the grid as empty
    pub fn get_or_empty(&self, row: usize, col: usize) -> &CellValue {
        self.get(row, col).unwrap_or(&EMPTY)
    }

    /// Set the value at a position. Writes outside the grid are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col] = value;
        }
    }

    /// Iterate over rows as slices
    pub fn iter_rows(&self) -> impl Iterator<Item = &[CellValue]> {
        // chunks() panics on zero, and a zero-width grid has no cells anyway
        self.cells.chunks(self.cols.max(1))
    }

    /// Iterate over non-blank cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, &CellValue)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_blank())
            .map(move |(i, v)| (i / cols, i % cols, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_rows_pads_ragged_rows() {
        let grid = SheetGrid::from_rows(vec![
            vec![CellValue::from(1)],
            vec![CellValue::from(2), CellValue::from("x")],
        ]);
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid.get(0, 1), Some(&CellValue::Empty));
        assert_eq!(grid.get(1, 1), Some(&CellValue::from("x")));
    }

    #[test]
    fn test_from_sparse_anchors_at_a1() {
        let grid = SheetGrid::from_sparse(vec![
            (2, 1, CellValue::from(5)),
            (4, 3, CellValue::string("")),
            (0, 2, CellValue::Empty),
        ])
        .unwrap();
        assert_eq!(grid.shape(), (3, 2));
        assert_eq!(grid.get(2, 1), Some(&CellValue::Number(5.0)));
        assert_eq!(grid.get(0, 0), Some(&CellValue::Empty));
    }

    #[test]
    fn test_from_sparse_all_blank_is_empty() {
        let grid = SheetGrid::from_sparse(vec![(3, 3, CellValue::Empty)]).unwrap();
        assert_eq!(grid.shape(), (0, 0));
        assert!(grid.is_empty());
        assert_eq!(grid.iter_rows().count(), 0);
    }

    #[test]
    fn test_from_sparse_rejects_huge_extent() {
        let err = SheetGrid::from_sparse(vec![(1_048_575, 16_383, CellValue::from(1))]).unwrap_err();
        assert!(matches!(
            err,
            Error::GridTooLarge {
                rows: 1_048_576,
                cols: 16_384
            }
        ));

        // A full-width first row is fine
        let grid = SheetGrid::from_sparse(vec![(0, 16_383, CellValue::from(1))]).unwrap();
        assert_eq!(grid.shape(), (1, 16_384));
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut grid = SheetGrid::new(1, 1);
        grid.set(5, 5, CellValue::from(1));
        assert_eq!(grid.get(5, 5), None);
        assert_eq!(grid.get_or_empty(5, 5), &CellValue::Empty);
    }

    #[test]
    fn test_iter_cells_skips_blank() {
        let grid = SheetGrid::from_rows(vec![
            vec![CellValue::Empty, CellValue::from(1)],
            vec![CellValue::from("a"), CellValue::from("")],
        ]);
        let cells: Vec<_> = grid.iter_cells().map(|(r, c, _)| (r, c)).collect();
        assert_eq!(cells, vec![(0, 1), (1, 0)]);
    }
}
