//! # gridcalc
//!
//! Excel-compatible formula compilation and evaluation.
//!
//! Formula text is compiled into a postfix token sequence, which can be
//! evaluated against any [`CellOracle`] or rendered back to formula text.
//! A whole [`Workbook`] can be recalculated in dependency order through
//! [`WorkbookCalculationExt`].
//!
//! ## Features
//!
//! - Precedence parsing of Excel formula syntax, including array formulas,
//!   array literals, 3-D and complex references, and defined names
//! - Several hundred built-in functions plus the Analysis ToolPak add-ins
//! - Rendering of compiled formulas back to canonical text
//! - Recalculation with circular-reference detection and optional iteration
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 40.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1+2").unwrap();
//! sheet.set_cell_formula("C1", "=B1&\" items\"").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.formula_count, 2);
//!
//! let sheet = workbook.worksheet(0).unwrap();
//! assert_eq!(sheet.get_calculated_value_at(0, 2), CellValue::text("42 items"));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{CalculationOptions, CalculationStats, WorkbookCalculationExt};

// Re-export core types
pub use gridcalc_core::{
    CalcSettings, CellAddress, CellRange, CellValue, Error, ErrorKind, Result, Workbook,
    Worksheet, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use gridcalc_formula::{
    evaluate, evaluate_formula, lookup_function, parse, parse_or_placeholder, render, Area,
    CellHandle, CellKey, CellOracle, DependencyGraph, EvaluationContext, FormulaError,
    FormulaResult, FunctionDescriptor, ParseError, Reference, SheetHandle, Token, TokenSequence,
    Value,
};
