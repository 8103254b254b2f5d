//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Rows and columns are 0-based internally. The row and column absolute
/// markers (`$`) are carried independently so a reference can be rendered
/// back exactly as it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a new cell address with specified absolute/relative flags
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B2").unwrap();
    /// assert_eq!(addr.row, 1);
    /// assert_eq!(addr.col, 1);
    /// assert!(addr.col_absolute);
    /// assert!(!addr.row_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.first() == Some(&b'$');
        if col_absolute {
            pos += 1;
        }

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }
        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = bytes.get(pos) == Some(&b'$');
        if row_absolute {
            pos += 1;
        }

        let row = parse_row_number(&s[pos..], s)?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }
        if letters.len() > 3 {
            return Err(Error::InvalidAddress(format!(
                "column '{}' is too long",
                letters
            )));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }

        let col = col - 1;
        if col >= MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }

        Ok(col as u16)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();
        push_column(&mut result, self.col, self.col_absolute);
        push_row(&mut result, self.row, self.row_absolute);
        result
    }

    /// Create a range from this address to another
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

fn parse_row_number(digits: &str, whole: &str) -> Result<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidAddress(format!(
            "invalid row number in '{}'",
            whole
        )));
    }
    let row: u32 = digits
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", whole)))?;
    if row == 0 {
        return Err(Error::InvalidAddress(format!(
            "row number must be >= 1 in '{}'",
            whole
        )));
    }
    let row = row - 1;
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    Ok(row)
}

fn push_column(out: &mut String, col: u16, absolute: bool) {
    if absolute {
        out.push('$');
    }
    out.push_str(&CellAddress::column_to_letters(col));
}

fn push_row(out: &mut String, row: u32, absolute: bool) {
    if absolute {
        out.push('$');
    }
    out.push_str(&(row + 1).to_string());
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10", "A:C", "2:5")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalised so `start` is top-left
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (start_row, start_row_abs, end_row, end_row_abs) = if start.row <= end.row {
            (start.row, start.row_absolute, end.row, end.row_absolute)
        } else {
            (end.row, end.row_absolute, start.row, start.row_absolute)
        };
        let (start_col, start_col_abs, end_col, end_col_abs) = if start.col <= end.col {
            (start.col, start.col_absolute, end.col, end.col_absolute)
        } else {
            (end.col, end.col_absolute, start.col, start.col_absolute)
        };

        Self {
            start: CellAddress::with_absolute(start_row, start_col, start_row_abs, start_col_abs),
            end: CellAddress::with_absolute(end_row, end_col, end_row_abs, end_col_abs),
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from `A1:B10`, `A:C` or `2:5` notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let Some(colon_pos) = s.find(':') else {
            return Ok(Self::single(CellAddress::parse(s)?));
        };
        let (left, right) = (&s[..colon_pos], &s[colon_pos + 1..]);

        if let (Some(first), Some(last)) = (parse_column_only(left), parse_column_only(right)) {
            let (first_col, first_abs) = first?;
            let (last_col, last_abs) = last?;
            return Ok(Self::new(
                CellAddress::with_absolute(0, first_col, true, first_abs),
                CellAddress::with_absolute(MAX_ROWS - 1, last_col, true, last_abs),
            ));
        }

        if let (Some(first), Some(last)) = (parse_row_only(left), parse_row_only(right)) {
            let (first_row, first_abs) = first?;
            let (last_row, last_abs) = last?;
            return Ok(Self::new(
                CellAddress::with_absolute(first_row, 0, first_abs, true),
                CellAddress::with_absolute(last_row, MAX_COLS - 1, last_abs, true),
            ));
        }

        let start = CellAddress::parse(left)
            .map_err(|_| Error::InvalidRange(format!("invalid start of range '{}'", s)))?;
        let end = CellAddress::parse(right)
            .map_err(|_| Error::InvalidRange(format!("invalid end of range '{}'", s)))?;
        Ok(Self::new(start, end))
    }

    /// Whether this range spans entire columns (`A:C`)
    pub fn is_whole_columns(&self) -> bool {
        self.start.row == 0 && self.end.row == MAX_ROWS - 1
    }

    /// Whether this range spans entire rows (`2:5`)
    pub fn is_whole_rows(&self) -> bool {
        self.start.col == 0 && self.end.col == MAX_COLS - 1 && !self.is_whole_columns()
    }

    /// Check if a cell is within this range
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Get the intersection of two ranges, if any
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        if !self.overlaps(other) {
            return None;
        }

        Some(CellRange::from_indices(
            self.start.row.max(other.start.row),
            self.start.col.max(other.start.col),
            self.end.row.min(other.end.row),
            self.end.col.min(other.end.col),
        ))
    }

    /// Smallest range covering both ranges (the `:` range operator)
    pub fn bounding(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// Clip this range to `bounds`, returning `None` when nothing remains
    pub fn clip(&self, bounds: &CellRange) -> Option<CellRange> {
        self.intersect(bounds)
    }

    /// Iterate over all cell positions in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16)> {
        let (start_row, end_row) = (self.start.row, self.end.row);
        let (start_col, end_col) = (self.start.col, self.end.col);
        (start_row..=end_row).flat_map(move |row| (start_col..=end_col).map(move |col| (row, col)))
    }

    /// Format as A1-style range string
    pub fn to_a1_string(&self) -> String {
        let mut out = String::new();
        if self.is_whole_columns() {
            push_column(&mut out, self.start.col, self.start.col_absolute);
            out.push(':');
            push_column(&mut out, self.end.col, self.end.col_absolute);
        } else if self.is_whole_rows() {
            push_row(&mut out, self.start.row, self.start.row_absolute);
            out.push(':');
            push_row(&mut out, self.end.row, self.end.row_absolute);
        } else {
            out.push_str(&self.start.to_a1_string());
            out.push(':');
            out.push_str(&self.end.to_a1_string());
        }
        out
    }
}

fn parse_column_only(s: &str) -> Option<Result<(u16, bool)>> {
    let (absolute, letters) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    Some(CellAddress::letters_to_column(letters).map(|col| (col, absolute)))
}

fn parse_row_only(s: &str) -> Option<Result<(u32, bool)>> {
    let (absolute, digits) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(parse_row_number(digits, s).map(|row| (row, absolute)))
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
