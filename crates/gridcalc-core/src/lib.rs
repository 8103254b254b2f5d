//! # gridcalc-core
//!
//! Value vocabulary shared by the gridcalc formula engine:
//! - [`CellValue`] and [`ErrorKind`] - cell contents and the spreadsheet error taxonomy
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing
//! - [`Workbook`], [`Worksheet`] and [`CalcSettings`] - an in-memory grid that formulas read from
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value_at(0, 1, CellValue::Number(3.5)).unwrap();
//! sheet.set_cell_formula("C1", "=B1*2").unwrap();
//! ```

pub mod cell;
pub mod error;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellRange, CellValue, ErrorKind};
pub use error::{Error, Result};
pub use workbook::{CalcSettings, Workbook};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
