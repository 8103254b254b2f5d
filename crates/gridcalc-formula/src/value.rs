//! Values on the evaluation stack

use crate::oracle::SheetHandle;
use gridcalc_core::{CellRange, CellValue, ErrorKind};
use std::cmp::Ordering;
use std::fmt;

/// One rectangular area on one sheet, or spanning a run of sheets (3-D)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub first_sheet: SheetHandle,
    pub last_sheet: SheetHandle,
    pub range: CellRange,
}

impl Area {
    pub fn new(sheet: SheetHandle, range: CellRange) -> Self {
        Self {
            first_sheet: sheet,
            last_sheet: sheet,
            range,
        }
    }

    /// Whether the area spans more than one sheet
    pub fn is_3d(&self) -> bool {
        self.first_sheet != self.last_sheet
    }

    /// Sheets covered, in workbook order
    pub fn sheets(&self) -> impl Iterator<Item = SheetHandle> {
        (self.first_sheet.0..=self.last_sheet.0).map(SheetHandle)
    }
}

/// A resolved reference: one area, or several for unions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub areas: Vec<Area>,
}

impl Reference {
    pub fn single(area: Area) -> Self {
        Self { areas: vec![area] }
    }

    /// The only area, if the reference has exactly one
    pub fn single_area(&self) -> Option<&Area> {
        match self.areas.as_slice() {
            [area] => Some(area),
            _ => None,
        }
    }

    /// Whether the reference is exactly one cell on one sheet
    pub fn is_single_cell(&self) -> bool {
        self.single_area()
            .map(|a| !a.is_3d() && a.range.cell_count() == 1)
            .unwrap_or(false)
    }
}

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorKind),
    /// A blank cell
    Empty,
    /// An omitted function argument
    Missing,
    /// Rows of values
    Array(Vec<Vec<Value>>),
    /// Cells not yet read
    Reference(Reference),
}

impl Value {
    /// Convert a stored cell value (formulas read as their cached result)
    pub fn from_cell(cell: &CellValue) -> Self {
        match cell.effective_value() {
            CellValue::Number(n) => Value::Number(*n),
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::Boolean(b) => Value::Bool(*b),
            CellValue::Error(e) => Value::Error(*e),
            CellValue::Empty | CellValue::Formula { .. } => Value::Empty,
        }
    }

    /// Convert to a storable cell value
    ///
    /// Arrays store their top-left element; unresolved references store `#VALUE!`.
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            Value::Number(n) => CellValue::Number(*n),
            Value::Text(s) => CellValue::Text(s.clone()),
            Value::Bool(b) => CellValue::Boolean(*b),
            Value::Error(e) => CellValue::Error(*e),
            Value::Empty | Value::Missing => CellValue::Empty,
            Value::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(Value::to_cell_value)
                .unwrap_or(CellValue::Empty),
            Value::Reference(_) => CellValue::Error(ErrorKind::Value),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the error if this is one
    pub fn as_error(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Number if the value already is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Empty | Value::Missing)
    }

    /// Arithmetic coercion of a scalar
    ///
    /// Booleans become 0/1, blanks 0, numeric text its number; other text is `#VALUE!`.
    pub fn coerce_number(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Empty | Value::Missing => Ok(0.0),
            Value::Text(s) => parse_number_text(s).ok_or(ErrorKind::Value),
            Value::Error(e) => Err(*e),
            Value::Array(_) | Value::Reference(_) => Err(ErrorKind::Value),
        }
    }

    /// Logical coercion of a scalar
    pub fn coerce_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Empty | Value::Missing => Ok(false),
            Value::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorKind::Value)
                }
            }
            Value::Error(e) => Err(*e),
            Value::Array(_) | Value::Reference(_) => Err(ErrorKind::Value),
        }
    }

    /// Text conversion as `&` performs it
    pub fn coerce_text(&self) -> Result<String, ErrorKind> {
        match self {
            Value::Number(n) => Ok(format_number(*n)),
            Value::Text(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Empty | Value::Missing => Ok(String::new()),
            Value::Error(e) => Err(*e),
            Value::Array(_) | Value::Reference(_) => Err(ErrorKind::Value),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Text(_) => 1,
            Value::Bool(_) => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Error(e) => write!(f, "{}", e),
            Value::Empty | Value::Missing => Ok(()),
            Value::Array(_) => f.write_str("{array}"),
            Value::Reference(_) => f.write_str("{reference}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorKind> for Value {
    fn from(e: ErrorKind) -> Self {
        Value::Error(e)
    }
}

/// Compare two scalars the way the comparison operators do
///
/// Numbers sort before text, text before booleans. Text compares
/// case-insensitively. A blank takes the zero value of the other side's type.
pub fn compare(left: &Value, right: &Value) -> Ordering {
    let left = blank_as(left, right);
    let right = blank_as(right, &left);
    match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => left.type_rank().cmp(&right.type_rank()),
    }
}

fn blank_as(value: &Value, other: &Value) -> Value {
    match value {
        Value::Empty | Value::Missing => match other {
            Value::Text(_) => Value::Text(String::new()),
            Value::Bool(_) => Value::Bool(false),
            _ => Value::Number(0.0),
        },
        v => v.clone(),
    }
}

/// Parse text the way arithmetic coercion does: trimmed decimal, optional
/// sign, exponent and trailing percent sign
pub fn parse_number_text(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (body, scale) = match s.strip_suffix('%') {
        Some(body) => (body.trim_end(), 0.01),
        None => (s, 1.0),
    };
    let valid = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && body.chars().any(|c| c.is_ascii_digit());
    if !valid {
        return None;
    }
    body.parse::<f64>().ok().map(|n| n * scale)
}

/// Format a number the way the General number format shows it
///
/// Fifteen significant digits, no trailing zeros, scientific notation for
/// very large or very small magnitudes.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return ErrorKind::Num.to_string();
    }

    let sci = format!("{:.14E}", n);
    let Some((mantissa, exponent)) = sci.split_once('E') else {
        return n.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };

    if !(-10..15).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}E{}{:02}", mantissa, sign, exponent.abs());
    }

    let digits = mantissa.chars().filter(char::is_ascii_digit).count() as i32;
    let decimals = (digits - 1 - exponent).max(0) as usize;
    let rounded: f64 = format!("{}E{}", mantissa, exponent).parse().unwrap_or(n);
    format!("{:.*}", decimals, rounded)
}
