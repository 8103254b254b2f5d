//! Read-only access to cell data during evaluation
//!
//! The evaluator never touches a grid directly. Everything it reads goes
//! through a [`CellOracle`]; [`EvaluationContext`] is the implementation
//! backed by a [`Workbook`].

use gridcalc_core::{CalcSettings, CellRange, CellValue, Workbook};

/// Opaque handle to a worksheet; handles order sheets by workbook position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetHandle(pub usize);

/// Opaque handle to one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellHandle {
    pub sheet: SheetHandle,
    pub row: u32,
    pub col: u16,
}

impl CellHandle {
    pub fn new(sheet: SheetHandle, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }
}

/// Cell-value source consulted by the evaluator and the built-in functions
pub trait CellOracle {
    /// Sheet that unqualified references point at
    fn current_sheet(&self) -> SheetHandle;

    /// The cell holding the formula, when known (used for implicit intersection)
    fn current_cell(&self) -> Option<CellHandle> {
        None
    }

    /// Map a sheet name to a handle
    fn resolve_sheet(&self, name: &str) -> Option<SheetHandle>;

    /// Read one cell
    fn resolve_cell_value(&self, cell: CellHandle) -> CellValue;

    /// Bounds of the populated cells on a sheet; `None` when the sheet holds nothing
    fn used_range(&self, _sheet: SheetHandle) -> Option<CellRange> {
        None
    }

    /// The part of a range worth reading
    ///
    /// Whole-column and whole-row ranges are clipped to the sheet's used range;
    /// `None` means nothing is left.
    fn effective_range(&self, sheet: SheetHandle, range: &CellRange) -> Option<CellRange> {
        if range.is_whole_columns() || range.is_whole_rows() {
            self.used_range(sheet).and_then(|used| range.clip(&used))
        } else {
            Some(*range)
        }
    }

    /// Enumerate a range's cells in row-major order
    fn expand_range(&self, sheet: SheetHandle, range: &CellRange) -> Vec<CellHandle> {
        match self.effective_range(sheet, range) {
            Some(range) => range
                .cells()
                .map(|(row, col)| CellHandle::new(sheet, row, col))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Formula text a defined name refers to
    fn resolve_name(&self, _name: &str) -> Option<String> {
        None
    }

    /// Calculation settings (date system, iteration)
    fn settings(&self) -> CalcSettings {
        CalcSettings::default()
    }
}

/// Context for formula evaluation backed by a workbook
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Workbook for cell lookups
    pub workbook: Option<&'a Workbook>,
    /// Current worksheet index
    pub current_sheet: usize,
    /// Current cell row
    pub current_row: u32,
    /// Current cell column
    pub current_col: u16,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(workbook: Option<&'a Workbook>, sheet: usize, row: u32, col: u16) -> Self {
        Self {
            workbook,
            current_sheet: sheet,
            current_row: row,
            current_col: col,
        }
    }

    /// Create a context without a workbook; every cell reads as empty
    pub fn simple() -> Self {
        Self::new(None, 0, 0, 0)
    }
}

impl CellOracle for EvaluationContext<'_> {
    fn current_sheet(&self) -> SheetHandle {
        SheetHandle(self.current_sheet)
    }

    fn current_cell(&self) -> Option<CellHandle> {
        self.workbook.map(|_| {
            CellHandle::new(
                SheetHandle(self.current_sheet),
                self.current_row,
                self.current_col,
            )
        })
    }

    fn resolve_sheet(&self, name: &str) -> Option<SheetHandle> {
        self.workbook?.sheet_index(name).map(SheetHandle)
    }

    fn resolve_cell_value(&self, cell: CellHandle) -> CellValue {
        self.workbook
            .and_then(|wb| wb.worksheet(cell.sheet.0))
            .map(|ws| ws.get_calculated_value_at(cell.row, cell.col))
            .unwrap_or(CellValue::Empty)
    }

    fn used_range(&self, sheet: SheetHandle) -> Option<CellRange> {
        self.workbook?.worksheet(sheet.0)?.used_range()
    }

    fn resolve_name(&self, name: &str) -> Option<String> {
        self.workbook?.defined_name(name).map(str::to_string)
    }

    fn settings(&self) -> CalcSettings {
        self.workbook
            .map(|wb| wb.settings().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        let ws = wb.worksheet_mut(1).unwrap();
        ws.set_cell_value("B2", 1.0).unwrap();
        ws.set_cell_value("B4", 2.0).unwrap();
        wb
    }

    #[test]
    fn test_resolve_sheet_and_values() {
        let wb = workbook();
        let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);
        let data = ctx.resolve_sheet("DATA").unwrap();
        assert_eq!(data, SheetHandle(1));
        assert_eq!(
            ctx.resolve_cell_value(CellHandle::new(data, 1, 1)),
            CellValue::Number(1.0)
        );
        assert_eq!(ctx.resolve_sheet("Nope"), None);
    }

    #[test]
    fn test_expand_is_row_major_and_clips_whole_columns() {
        let wb = workbook();
        let ctx = EvaluationContext::new(Some(&wb), 1, 0, 0);

        let cells = ctx.expand_range(SheetHandle(1), &CellRange::parse("A1:B2").unwrap());
        let coords: Vec<_> = cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

        let column = ctx.expand_range(SheetHandle(1), &CellRange::parse("B:B").unwrap());
        assert_eq!(column.len(), 3);

        let empty_sheet = ctx.expand_range(SheetHandle(0), &CellRange::parse("A:A").unwrap());
        assert!(empty_sheet.is_empty());
    }

    #[test]
    fn test_simple_context() {
        let ctx = EvaluationContext::simple();
        assert_eq!(ctx.current_cell(), None);
        assert_eq!(
            ctx.resolve_cell_value(CellHandle::new(SheetHandle(0), 0, 0)),
            CellValue::Empty
        );
        assert!(!ctx.settings().date_1904);
    }
}
