//! Workbook type - sheets, defined names and calculation settings

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: an ordered list of worksheets plus workbook-wide state
#[derive(Debug, Clone)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    /// Calculation settings
    settings: CalcSettings,
    /// Defined names, keyed by upper-cased name: (display name, refers-to formula text)
    defined_names: AHashMap<String, (String, String)>,
}

impl Workbook {
    /// Create a new workbook with one worksheet named "Sheet1"
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            settings: CalcSettings::default(),
            defined_names: AHashMap::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with a generated name
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = self.generate_sheet_name();
        self.add_worksheet_with_name(&name)
    }

    /// Add a new worksheet with the specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name, None)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Get calculation settings
    pub fn settings(&self) -> &CalcSettings {
        &self.settings
    }

    /// Get mutable calculation settings
    pub fn settings_mut(&mut self) -> &mut CalcSettings {
        &mut self.settings
    }

    // ==================== Defined Names ====================

    /// Define (or redefine) a workbook-scoped name
    ///
    /// # Example
    /// ```
    /// use gridcalc_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// assert_eq!(wb.defined_name("taxrate"), Some("=Sheet1!$B$1"));
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        validate_defined_name(name)?;
        let refers_to = if refers_to.starts_with('=') {
            refers_to.to_string()
        } else {
            format!("={}", refers_to)
        };
        self.defined_names
            .insert(name.to_ascii_uppercase(), (name.to_string(), refers_to));
        Ok(())
    }

    /// Look up the formula text a name refers to (case-insensitive)
    pub fn defined_name(&self, name: &str) -> Option<&str> {
        self.defined_names
            .get(&name.to_ascii_uppercase())
            .map(|(_, refers_to)| refers_to.as_str())
    }

    /// Remove a defined name, returning its formula text
    pub fn remove_name(&mut self, name: &str) -> Option<String> {
        self.defined_names
            .remove(&name.to_ascii_uppercase())
            .map(|(_, refers_to)| refers_to)
    }

    /// Iterate over defined names as (name, refers-to)
    pub fn defined_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defined_names
            .values()
            .map(|(name, refers_to)| (name.as_str(), refers_to.as_str()))
    }

    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        let clash = self
            .worksheets
            .iter()
            .enumerate()
            .any(|(i, ws)| Some(i) != exclude_index && ws.name().eq_ignore_ascii_case(name));
        if clash {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }

    fn generate_sheet_name(&self) -> String {
        let mut n = self.worksheets.len() + 1;
        loop {
            let name = format!("Sheet{}", n);
            if self.sheet_index(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_defined_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_alphabetic() || c == '_' || c == '\\')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if !valid_start || !valid_rest {
        return Err(Error::InvalidName(name.to_string()));
    }
    if crate::CellAddress::parse(name).is_ok() {
        return Err(Error::InvalidName(format!(
            "'{}' looks like a cell reference",
            name
        )));
    }
    Ok(())
}

/// Workbook-level calculation settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalcSettings {
    /// Date system: false = 1900 (Windows), true = 1904 (Mac)
    pub date_1904: bool,
    /// Allow circular references to be resolved by iteration
    pub iterative: bool,
    /// Maximum number of passes in iterative mode
    pub max_iterations: u32,
    /// Iteration stops once no value changes by more than this
    pub max_change: f64,
}

impl Default for CalcSettings {
    fn default() -> Self {
        Self {
            date_1904: false,
            iterative: false,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}
