//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Fatal conditions raised while compiling formula text
///
/// These abort compilation of the whole formula. Runtime spreadsheet errors
/// (`#DIV/0!` and friends) are values, not `ParseError`s.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A function name that neither the built-in nor the add-in table knows
    #[error("Function not supported: {0}")]
    UnsupportedFunction(String),

    /// An opening bracket or quote with no matching close
    #[error("Unmatched '{bracket}' at position {position}")]
    UnmatchedBracket { bracket: char, position: usize },

    /// An array literal that is empty, ragged or holds a non-constant
    #[error("Malformed array literal: {0}")]
    MalformedArray(String),

    /// Text that looks like a reference but cannot be resolved to one
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A lexeme that cannot appear where it was found
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    /// An operator with no operand to apply to
    #[error("Missing operand: {0}")]
    MissingOperand(String),

    /// Formula text that does not start with `=` or `{=`
    #[error("Formula must start with '='")]
    MissingEquals,
}

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Formula text could not be compiled
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// An operator or function token found fewer values on the stack than it consumes
    #[error("Stack underflow at token {position}")]
    StackUnderflow { position: usize },

    /// Evaluation finished with other than exactly one value on the stack
    #[error("Malformed token sequence: {remaining} values left on the stack")]
    UnbalancedStack { remaining: usize },

    /// Circular reference
    #[error("Circular reference detected: {0}")]
    CircularReference(String),
}
