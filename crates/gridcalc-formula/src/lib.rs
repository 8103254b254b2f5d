//! # gridcalc-formula
//!
//! Formula compiler and evaluator for gridcalc.
//!
//! This crate provides:
//! - Formula parsing (text → postfix token sequence)
//! - Formula evaluation (token sequence → value) against a [`CellOracle`]
//! - Rendering of token sequences back to formula text
//! - Built-in Excel functions, including the Analysis ToolPak add-ins
//! - Dependency tracking for calculation chains
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_formula::{evaluate, parse, render, EvaluationContext, Value};
//!
//! let seq = parse("=ROUND(2.5, 0) & \" items\"").unwrap();
//! assert_eq!(render(&seq), "=ROUND(2.5,0)&\" items\"");
//!
//! let result = evaluate(&seq, &EvaluationContext::simple()).unwrap();
//! assert_eq!(result, Value::Text("3 items".into()));
//! ```

pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod oracle;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use dependency::{CellKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult, ParseError};
pub use evaluator::{evaluate, evaluate_formula};
pub use oracle::{CellHandle, CellOracle, EvaluationContext, SheetHandle};
pub use parser::{parse, parse_or_placeholder};
pub use render::render;
pub use resolver::{lookup_function, FunctionDescriptor};
pub use token::{
    AreaRef, ArityKind, ArrayItem, ArrayLiteral, CellRef, FunctionCall, FunctionId, OperatorKind,
    SheetSpan, Token, TokenSequence,
};
pub use value::{Area, Reference, Value};
