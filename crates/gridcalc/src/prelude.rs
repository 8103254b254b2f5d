//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Cell types
    CellAddress,
    CellRange,
    CellValue,
    ErrorKind,
    // Error types
    Error,
    Result,
    // Formula types
    EvaluationContext,
    TokenSequence,
    Value,
    // Main types
    Workbook,
    // Extension traits
    WorkbookCalculationExt,
    Worksheet,
};
