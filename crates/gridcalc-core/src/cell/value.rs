//! Cell value types

use std::fmt;

/// Represents the value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// Text value
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Error value (#VALUE!, #REF!, etc.)
    Error(ErrorKind),

    /// Formula with cached result
    Formula {
        /// Original formula text (e.g., "=SUM(A1:A10)")
        text: String,
        /// Last calculated value (if any)
        cached: Option<Box<CellValue>>,
    },
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Create a new formula value with no cached result
    pub fn formula<S: Into<String>>(text: S) -> Self {
        CellValue::Formula {
            text: text.into(),
            cached: None,
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell (or its cached result) is an error
    pub fn is_error(&self) -> bool {
        matches!(self.effective_value(), CellValue::Error(_))
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self.effective_value() {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(true) => Some(1.0),
            CellValue::Boolean(false) => Some(0.0),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self.effective_value() {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the error kind if this cell holds an error
    pub fn as_error(&self) -> Option<ErrorKind> {
        match self.effective_value() {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Get the formula text if this is a formula cell
    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellValue::Formula { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Get the effective value (cached value for formulas, value otherwise)
    ///
    /// A formula that has never been calculated reads as empty.
    pub fn effective_value(&self) -> &CellValue {
        match self {
            CellValue::Formula {
                cached: Some(v), ..
            } => v.effective_value(),
            CellValue::Formula { cached: None, .. } => &CellValue::Empty,
            _ => self,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{}", e),
            CellValue::Formula {
                cached: Some(v), ..
            } => write!(f, "{}", v),
            CellValue::Formula { text, .. } => write!(f, "{}", text),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<ErrorKind> for CellValue {
    fn from(e: ErrorKind) -> Self {
        CellValue::Error(e)
    }
}

/// Spreadsheet error values
///
/// The closed set of error kinds a formula can produce. These are ordinary
/// values, not Rust errors: they flow through formulas like numbers do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// #NULL! - Intersection of ranges that do not intersect
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
}

impl ErrorKind {
    /// All error kinds in `ERROR.TYPE` order
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Null,
        ErrorKind::Div0,
        ErrorKind::Value,
        ErrorKind::Ref,
        ErrorKind::Name,
        ErrorKind::Num,
        ErrorKind::Na,
    ];

    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::Na => "#N/A",
        }
    }

    /// Parse an error string (case-insensitive)
    ///
    /// Accepts `#NAME!` and `#N/A!` in addition to the canonical spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "#NULL!" => Some(ErrorKind::Null),
            "#DIV/0!" => Some(ErrorKind::Div0),
            "#VALUE!" => Some(ErrorKind::Value),
            "#REF!" => Some(ErrorKind::Ref),
            "#NAME?" | "#NAME!" => Some(ErrorKind::Name),
            "#NUM!" => Some(ErrorKind::Num),
            "#N/A" | "#N/A!" => Some(ErrorKind::Na),
            _ => None,
        }
    }

    /// Get the numeric error code (BIFF encoding)
    pub fn code(&self) -> u8 {
        match self {
            ErrorKind::Null => 0x00,
            ErrorKind::Div0 => 0x07,
            ErrorKind::Value => 0x0F,
            ErrorKind::Ref => 0x17,
            ErrorKind::Name => 0x1D,
            ErrorKind::Num => 0x24,
            ErrorKind::Na => 0x2A,
        }
    }

    /// Decode a BIFF error code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }

    /// The number returned by `ERROR.TYPE` (1..=7)
    pub fn error_type_number(&self) -> u8 {
        match self {
            ErrorKind::Null => 1,
            ErrorKind::Div0 => 2,
            ErrorKind::Value => 3,
            ErrorKind::Ref => 4,
            ErrorKind::Name => 5,
            ErrorKind::Num => 6,
            ErrorKind::Na => 7,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
