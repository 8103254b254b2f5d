//! Error types for gridcalc-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gridcalc-core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u32, u16),

    /// Sheet index out of bounds
    #[error("Sheet index {0} out of bounds (count: {1})")]
    SheetOutOfBounds(usize, usize),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Duplicate sheet name
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Invalid defined name
    #[error("Invalid defined name: {0}")]
    InvalidName(String),
}
