//! Worksheet type

use ahash::AHashMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
///
/// Cells are stored sparsely, keyed by `(row, col)`.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Non-empty cells
    cells: AHashMap<(u32, u16), CellValue>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: AHashMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get cell value by address string (e.g., "A1")
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(&(row, col))
            .cloned()
            .unwrap_or(CellValue::Empty)
    }

    /// Get the cached value of a formula cell, or the cell value directly if not a formula
    pub fn get_calculated_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|v| v.effective_value().clone())
            .unwrap_or(CellValue::Empty)
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    ///
    /// Writing [`CellValue::Empty`] clears the cell.
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        validate_cell_position(row, col)?;
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&(row, col));
            }
            value => {
                self.cells.insert((row, col), value);
            }
        }
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by row and column indices
    ///
    /// A leading `=` is added when missing; `{=...}` array formulas are kept as written.
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        validate_cell_position(row, col)?;

        let formula = if formula.starts_with('=') || formula.starts_with("{=") {
            formula.to_string()
        } else {
            format!("={}", formula)
        };

        self.cells.insert((row, col), CellValue::formula(formula));
        Ok(())
    }

    // === Range Operations ===

    /// Get the used range (bounds of all non-empty cells)
    pub fn used_range(&self) -> Option<CellRange> {
        let mut keys = self.cells.keys();
        let &(first_row, first_col) = keys.next()?;
        let (mut min_row, mut min_col, mut max_row, mut max_col) =
            (first_row, first_col, first_row, first_col);
        for &(row, col) in keys {
            min_row = min_row.min(row);
            min_col = min_col.min(col);
            max_row = max_row.max(row);
            max_col = max_col.max(col);
        }
        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // === Formula calculation support ===

    /// Iterate over all formula cells: (row, col, formula_text), in row-major order
    pub fn formula_cells(&self) -> Vec<(u32, u16, &str)> {
        let mut cells: Vec<_> = self
            .cells
            .iter()
            .filter_map(|(&(row, col), value)| {
                value.formula_text().map(|text| (row, col, text))
            })
            .collect();
        cells.sort_by_key(|&(row, col, _)| (row, col));
        cells
    }

    /// Set the cached result value of a formula cell
    ///
    /// Fails if the cell doesn't exist or isn't a formula.
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        let cell = self.cells.get_mut(&(row, col)).ok_or_else(|| {
            Error::InvalidAddress(format!("Cell at ({}, {}) not found", row, col))
        })?;

        match cell {
            CellValue::Formula { cached, .. } => {
                *cached = Some(Box::new(value));
                Ok(())
            }
            _ => Err(Error::InvalidAddress(format!(
                "Cell at ({}, {}) is not a formula",
                row, col
            ))),
        }
    }
}

fn validate_cell_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col as u32, MAX_COLS - 1));
    }
    Ok(())
}
