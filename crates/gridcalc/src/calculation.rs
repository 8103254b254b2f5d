//! Formula calculation engine
//!
//! This module provides workbook-wide recalculation: every formula is
//! compiled, the cells are ordered so that each one is calculated after the
//! cells it reads, and results are stored as the formulas' cached values.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_formula("A1", "=B1*2").unwrap();
//! sheet.set_cell_value("B1", 21.0).unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! assert_eq!(
//!     workbook.worksheet(0).unwrap().get_calculated_value_at(0, 0),
//!     CellValue::Number(42.0)
//! );
//! ```

use ahash::{AHashMap, AHashSet};
use gridcalc_core::{CalcSettings, CellAddress, CellValue, Error, ErrorKind, Result, Workbook};
use gridcalc_formula::resolver;
use gridcalc_formula::{
    evaluate, parse, Area, CellKey, DependencyGraph, EvaluationContext, FormulaError,
    FormulaResult, SheetHandle, Token, TokenSequence,
};
use log::{debug, warn};

/// Options for formula calculation
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOptions {
    /// Resolve circular references by iteration instead of flagging them
    pub iterative: bool,
    /// Maximum passes over a circular reference in iterative mode
    pub max_iterations: u32,
    /// Iteration stops once no value in the cycle changes by more than this
    pub max_change: f64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self::from(&CalcSettings::default())
    }
}

impl From<&CalcSettings> for CalculationOptions {
    fn from(settings: &CalcSettings) -> Self {
        Self {
            iterative: settings.iterative,
            max_iterations: settings.max_iterations,
            max_change: settings.max_change,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells evaluated
    pub cells_calculated: usize,
    /// Largest number of passes spent on one circular reference (1 when there are none)
    pub iterations: u32,
    /// Number of cells that sit on a circular reference
    pub circular_references: usize,
    /// Number of formulas calling a volatile function (RAND, NOW, ...)
    pub volatile_cells: usize,
    /// Formulas that failed to compile or evaluate, plus cells flagged as circular
    pub errors: usize,
    /// Whether every iterated circular reference settled within the bounds
    pub converged: bool,
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas using the workbook's own [`CalcSettings`]
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&mut self) -> Result<CalculationStats> {
        let options = CalculationOptions::from(self.settings());
        self.calculate_with_options(&options)
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        let mut engine = CalculationEngine::new(options.clone());
        engine.calculate_all(self)
    }
}

/// The calculation engine
struct CalculationEngine {
    options: CalculationOptions,
    /// Compiled formulas, keyed by cell
    formulas: AHashMap<CellKey, TokenSequence>,
    /// Formula cells in sheet, row, column order
    cells: Vec<CellKey>,
}

impl CalculationEngine {
    fn new(options: CalculationOptions) -> Self {
        Self {
            options,
            formulas: AHashMap::new(),
            cells: Vec::new(),
        }
    }

    /// Calculate all formulas in the workbook
    fn calculate_all(&mut self, workbook: &mut Workbook) -> Result<CalculationStats> {
        let mut stats = CalculationStats {
            converged: true,
            ..CalculationStats::default()
        };

        // Phase 1: compile every formula and record what it reads
        let reads = self.collect_formulas(workbook, &mut stats)?;
        if stats.formula_count == 0 {
            return Ok(stats);
        }

        // Phase 2: order the cells, grouping circular references together
        let graph = DependencyGraph::from_formulas(&reads);
        let chain = graph.calculation_chain(&self.cells);
        debug!(
            "calculating {} formulas in {} steps",
            stats.formula_count,
            chain.len()
        );

        // Phase 3: calculate in order
        stats.iterations = 1;
        for component in &chain {
            if !graph.is_cycle(component) {
                for &cell in component {
                    self.calculate_cell(workbook, cell, &mut stats)?;
                }
                continue;
            }

            stats.circular_references += component.len();
            if self.options.iterative {
                self.calculate_cycle(workbook, component, &mut stats)?;
            } else {
                warn!(
                    "{}",
                    FormulaError::CircularReference(describe(workbook, component))
                );
                for &cell in component {
                    store(workbook, cell, CellValue::Error(ErrorKind::Ref))?;
                    stats.errors += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Compile all formulas and collect the areas each one reads
    fn collect_formulas(
        &mut self,
        workbook: &Workbook,
        stats: &mut CalculationStats,
    ) -> Result<Vec<(CellKey, Vec<Area>)>> {
        let sheet_count = workbook.sheet_count();
        let mut reads = Vec::new();

        for sheet_idx in 0..sheet_count {
            let sheet = workbook
                .worksheet(sheet_idx)
                .ok_or(Error::SheetOutOfBounds(sheet_idx, sheet_count))?;

            for (row, col, formula_text) in sheet.formula_cells() {
                let cell_key = CellKey::new(sheet_idx, row, col);

                let tokens = match parse(formula_text) {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        warn!(
                            "{}!{}: formula {:?} does not compile ({}); storing #N/A",
                            sheet.name(),
                            CellAddress::new(row, col).to_a1_string(),
                            formula_text,
                            e
                        );
                        stats.errors += 1;
                        TokenSequence::new(vec![Token::Error(ErrorKind::Na)])
                    }
                };

                if is_volatile(&tokens) {
                    stats.volatile_cells += 1;
                }

                let mut areas = Vec::new();
                collect_areas(
                    workbook,
                    sheet_idx,
                    &tokens,
                    &mut AHashSet::new(),
                    &mut areas,
                );
                reads.push((cell_key, areas));

                self.formulas.insert(cell_key, tokens);
                self.cells.push(cell_key);
                stats.formula_count += 1;
            }
        }

        Ok(reads)
    }

    /// Evaluate one formula against the workbook's current values
    fn evaluate_cell(&self, workbook: &Workbook, cell: CellKey) -> FormulaResult<CellValue> {
        let Some(tokens) = self.formulas.get(&cell) else {
            return Ok(CellValue::Empty);
        };
        let ctx = EvaluationContext::new(Some(workbook), cell.sheet, cell.row, cell.col);
        evaluate(tokens, &ctx).map(|value| value.to_cell_value())
    }

    fn calculate_cell(
        &self,
        workbook: &mut Workbook,
        cell: CellKey,
        stats: &mut CalculationStats,
    ) -> Result<()> {
        let value = match self.evaluate_cell(workbook, cell) {
            Ok(value) => value,
            Err(e) => {
                warn!("evaluation failed at {}: {}", describe(workbook, &[cell]), e);
                stats.errors += 1;
                CellValue::Error(ErrorKind::Value)
            }
        };
        store(workbook, cell, value)?;
        stats.cells_calculated += 1;
        Ok(())
    }

    /// Re-evaluate a circular reference until it settles or the pass limit is hit
    fn calculate_cycle(
        &self,
        workbook: &mut Workbook,
        component: &[CellKey],
        stats: &mut CalculationStats,
    ) -> Result<()> {
        let max_passes = self.options.max_iterations.max(1);
        let mut passes = 0;
        let mut converged = false;

        while passes < max_passes {
            let first_pass = passes == 0;
            passes += 1;
            let mut largest_change: f64 = 0.0;

            for &cell in component {
                let previous = cached(workbook, cell);
                let value = match self.evaluate_cell(workbook, cell) {
                    Ok(value) => value,
                    Err(e) => {
                        if first_pass {
                            warn!("evaluation failed at {}: {}", describe(workbook, &[cell]), e);
                            stats.errors += 1;
                        }
                        CellValue::Error(ErrorKind::Value)
                    }
                };
                largest_change = largest_change.max(change(&previous, &value));
                store(workbook, cell, value)?;
                if first_pass {
                    stats.cells_calculated += 1;
                }
            }

            if largest_change <= self.options.max_change {
                converged = true;
                break;
            }
        }

        debug!(
            "circular reference {} after {} passes (converged: {})",
            describe(workbook, component),
            passes,
            converged
        );
        stats.iterations = stats.iterations.max(passes);
        stats.converged &= converged;
        Ok(())
    }
}

/// Collect the areas a compiled formula reads, following defined names
///
/// References to sheets the workbook does not have read nothing.
fn collect_areas(
    workbook: &Workbook,
    sheet: usize,
    tokens: &TokenSequence,
    seen_names: &mut AHashSet<String>,
    areas: &mut Vec<Area>,
) {
    for reference in tokens.references() {
        let span = match &reference.sheet {
            None => Some((sheet, sheet)),
            Some(span) => {
                let first = workbook.sheet_index(&span.first);
                let last = match &span.last {
                    Some(name) => workbook.sheet_index(name),
                    None => first,
                };
                first.zip(last)
            }
        };
        if let Some((first, last)) = span {
            areas.push(Area {
                first_sheet: SheetHandle(first.min(last)),
                last_sheet: SheetHandle(first.max(last)),
                range: reference.range,
            });
        }
    }

    for name in tokens.names() {
        if !seen_names.insert(name.to_uppercase()) {
            continue;
        }
        if let Some(Ok(refers_to)) = workbook.defined_name(name).map(parse) {
            collect_areas(workbook, sheet, &refers_to, seen_names, areas);
        }
    }
}

/// Whether a formula calls a volatile function
fn is_volatile(tokens: &TokenSequence) -> bool {
    tokens.iter().any(|token| match token {
        Token::Function(call) => resolver::descriptor(call.id).map_or(false, |d| d.volatile),
        Token::ExternName(name) => resolver::lookup_function(name).map_or(false, |d| d.volatile),
        _ => false,
    })
}

/// How far a value moved between two passes
fn change(previous: &CellValue, current: &CellValue) -> f64 {
    match (previous, current) {
        (CellValue::Number(a), CellValue::Number(b)) => (a - b).abs(),
        _ if previous == current => 0.0,
        _ => f64::INFINITY,
    }
}

fn cached(workbook: &Workbook, cell: CellKey) -> CellValue {
    workbook
        .worksheet(cell.sheet)
        .map(|sheet| sheet.get_calculated_value_at(cell.row, cell.col))
        .unwrap_or_default()
}

fn store(workbook: &mut Workbook, cell: CellKey, value: CellValue) -> Result<()> {
    let sheet_count = workbook.sheet_count();
    workbook
        .worksheet_mut(cell.sheet)
        .ok_or(Error::SheetOutOfBounds(cell.sheet, sheet_count))?
        .set_formula_result(cell.row, cell.col, value)
}

/// `Sheet1!A1, Sheet1!B1` style listing of cells, for log messages
fn describe(workbook: &Workbook, cells: &[CellKey]) -> String {
    cells
        .iter()
        .map(|cell| {
            let sheet = workbook
                .worksheet(cell.sheet)
                .map(|s| s.name().to_string())
                .unwrap_or_default();
            format!(
                "{}!{}",
                sheet,
                CellAddress::new(cell.row, cell.col).to_a1_string()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn value(workbook: &Workbook, address: &str) -> CellValue {
        let addr = CellAddress::parse(address).unwrap();
        workbook
            .worksheet(0)
            .unwrap()
            .get_calculated_value_at(addr.row, addr.col)
    }

    #[test]
    fn test_empty_workbook() {
        let mut wb = Workbook::new();
        let stats = wb.calculate().unwrap();
        assert_eq!(stats.formula_count, 0);
        assert!(stats.converged);
    }

    #[test]
    fn test_calculates_in_dependency_order() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        // A1 reads B1, which reads C1; row-major order alone would be wrong
        sheet.set_cell_formula("A1", "=B1+1").unwrap();
        sheet.set_cell_formula("B1", "=C1*2").unwrap();
        sheet.set_cell_formula("C1", "=SUM(D1:D3)").unwrap();
        sheet.set_cell_value("D1", 1.0).unwrap();
        sheet.set_cell_value("D2", 2.0).unwrap();
        sheet.set_cell_value("D3", 3.0).unwrap();

        let stats = wb.calculate().unwrap();
        assert_eq!(stats.formula_count, 3);
        assert_eq!(stats.cells_calculated, 3);
        assert_eq!(stats.circular_references, 0);
        assert_eq!(stats.iterations, 1);
        assert_eq!(value(&wb, "C1"), CellValue::Number(6.0));
        assert_eq!(value(&wb, "B1"), CellValue::Number(12.0));
        assert_eq!(value(&wb, "A1"), CellValue::Number(13.0));
    }

    #[test]
    fn test_cross_sheet_dependencies() {
        let mut wb = Workbook::new();
        let data = wb.add_worksheet_with_name("Data").unwrap();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "=Data!B2*10")
            .unwrap();
        let sheet = wb.worksheet_mut(data).unwrap();
        sheet.set_cell_formula("B2", "=C2+0.5").unwrap();
        sheet.set_cell_value("C2", 2.0).unwrap();

        wb.calculate().unwrap();
        assert_eq!(value(&wb, "A1"), CellValue::Number(25.0));
    }

    #[test]
    fn test_dependencies_through_defined_names() {
        let mut wb = Workbook::new();
        wb.define_name("Total", "Sheet1!$B$1").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=Total*2").unwrap();
        sheet.set_cell_formula("B1", "=SUM(C1:C2)").unwrap();
        sheet.set_cell_value("C1", 1.0).unwrap();
        sheet.set_cell_value("C2", 2.0).unwrap();

        wb.calculate().unwrap();
        assert_eq!(value(&wb, "A1"), CellValue::Number(6.0));
    }

    #[test]
    fn test_circular_reference_is_flagged() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=B1+1").unwrap();
        sheet.set_cell_formula("B1", "=A1+1").unwrap();
        sheet.set_cell_formula("C1", "=A1*2").unwrap();
        sheet.set_cell_formula("D1", "=D1").unwrap();

        let stats = wb.calculate().unwrap();
        assert_eq!(stats.circular_references, 3);
        assert_eq!(stats.errors, 3);
        assert_eq!(stats.cells_calculated, 1);
        assert_eq!(value(&wb, "A1"), CellValue::Error(ErrorKind::Ref));
        assert_eq!(value(&wb, "B1"), CellValue::Error(ErrorKind::Ref));
        assert_eq!(value(&wb, "D1"), CellValue::Error(ErrorKind::Ref));
        // Downstream cells read the flagged value
        assert_eq!(value(&wb, "C1"), CellValue::Error(ErrorKind::Ref));
    }

    #[test]
    fn test_iterative_calculation_converges() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        // Fixed point: A1 = 2
        sheet.set_cell_formula("A1", "=0.5*B1+1").unwrap();
        sheet.set_cell_formula("B1", "=A1").unwrap();

        let options = CalculationOptions {
            iterative: true,
            ..CalculationOptions::default()
        };
        let stats = wb.calculate_with_options(&options).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations > 1);
        assert_eq!(stats.circular_references, 2);
        assert_eq!(stats.errors, 0);
        match value(&wb, "A1") {
            CellValue::Number(n) => assert!((n - 2.0).abs() < 0.01, "A1 = {}", n),
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_iterative_calculation_stops_at_limit() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "=A1+1")
            .unwrap();

        let options = CalculationOptions {
            iterative: true,
            max_iterations: 10,
            max_change: 0.001,
        };
        let stats = wb.calculate_with_options(&options).unwrap();
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 10);
        assert_eq!(value(&wb, "A1"), CellValue::Number(10.0));
    }

    #[test]
    fn test_calculate_uses_workbook_settings() {
        let mut wb = Workbook::new();
        wb.settings_mut().iterative = true;
        wb.settings_mut().max_iterations = 5;
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "=A1+2")
            .unwrap();

        let stats = wb.calculate().unwrap();
        assert_eq!(stats.iterations, 5);
        assert_eq!(value(&wb, "A1"), CellValue::Number(10.0));
    }

    #[test]
    fn test_uncompilable_formula_stores_na() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=NOSUCHFUNCTION(1)").unwrap();
        sheet.set_cell_formula("B1", "=ISNA(A1)").unwrap();

        let stats = wb.calculate().unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.formula_count, 2);
        assert_eq!(value(&wb, "A1"), CellValue::Error(ErrorKind::Na));
        assert_eq!(value(&wb, "B1"), CellValue::Boolean(true));
    }

    #[test]
    fn test_volatile_cells_are_counted() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=RAND()").unwrap();
        sheet.set_cell_formula("A2", "=RANDBETWEEN(1,6)").unwrap();
        sheet.set_cell_formula("A3", "=1+1").unwrap();

        let stats = wb.calculate().unwrap();
        assert_eq!(stats.volatile_cells, 2);
        match value(&wb, "A2") {
            CellValue::Number(n) => assert!((1.0..=6.0).contains(&n)),
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_change_between_passes() {
        assert_eq!(
            change(&CellValue::Number(1.0), &CellValue::Number(1.5)),
            0.5
        );
        assert_eq!(change(&CellValue::text("a"), &CellValue::text("a")), 0.0);
        assert!(change(&CellValue::Empty, &CellValue::Number(0.0)).is_infinite());
    }
}
