//! Token model
//!
//! A parsed formula is a flat [`TokenSequence`] in postfix order: every
//! operator and function token follows the tokens producing its operands.

use gridcalc_core::{CellAddress, CellRange, ErrorKind};
use std::fmt;

/// Operators, including the structural `Paren` marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    UnaryPlus,
    UnaryMinus,
    Percent,
    Power,
    Mul,
    Div,
    Add,
    Sub,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Marks a parenthesised sub-expression; evaluates as identity
    Paren,
}

impl OperatorKind {
    /// Binding strength; higher binds tighter
    pub fn rank(self) -> u8 {
        match self {
            OperatorKind::UnaryPlus | OperatorKind::UnaryMinus => 7,
            OperatorKind::Percent => 6,
            OperatorKind::Power => 5,
            OperatorKind::Mul | OperatorKind::Div => 4,
            OperatorKind::Add | OperatorKind::Sub => 3,
            OperatorKind::Concat => 2,
            OperatorKind::Eq
            | OperatorKind::Ne
            | OperatorKind::Lt
            | OperatorKind::Le
            | OperatorKind::Gt
            | OperatorKind::Ge => 1,
            OperatorKind::Paren => 0,
        }
    }

    /// Number of stack values the operator consumes
    pub fn operand_count(self) -> usize {
        if self.is_binary() {
            2
        } else {
            1
        }
    }

    /// Whether the operator takes a left and a right operand
    pub fn is_binary(self) -> bool {
        !matches!(
            self,
            OperatorKind::UnaryPlus
                | OperatorKind::UnaryMinus
                | OperatorKind::Percent
                | OperatorKind::Paren
        )
    }

    /// Whether the operator is a prefix sign
    pub fn is_prefix(self) -> bool {
        matches!(self, OperatorKind::UnaryPlus | OperatorKind::UnaryMinus)
    }

    /// Whether the operator is one of the six comparisons
    pub fn is_comparison(self) -> bool {
        self.rank() == 1
    }

    /// Formula-text spelling
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorKind::UnaryPlus | OperatorKind::Add => "+",
            OperatorKind::UnaryMinus | OperatorKind::Sub => "-",
            OperatorKind::Percent => "%",
            OperatorKind::Power => "^",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
            OperatorKind::Concat => "&",
            OperatorKind::Eq => "=",
            OperatorKind::Ne => "<>",
            OperatorKind::Lt => "<",
            OperatorKind::Le => "<=",
            OperatorKind::Gt => ">",
            OperatorKind::Ge => ">=",
            OperatorKind::Paren => "()",
        }
    }

    /// Binary operator for an operator spelling
    pub fn binary_from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => OperatorKind::Add,
            "-" => OperatorKind::Sub,
            "*" => OperatorKind::Mul,
            "/" => OperatorKind::Div,
            "^" => OperatorKind::Power,
            "&" => OperatorKind::Concat,
            "=" => OperatorKind::Eq,
            "<>" => OperatorKind::Ne,
            "<" => OperatorKind::Lt,
            "<=" => OperatorKind::Le,
            ">" => OperatorKind::Gt,
            ">=" => OperatorKind::Ge,
            _ => return None,
        })
    }
}

/// Built-in function index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u16);

impl FunctionId {
    /// Shared index of every add-in function; the name travels in an `ExternName` token
    pub const ADDIN: FunctionId = FunctionId(255);
}

/// Whether a function always takes the same number of arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityKind {
    Fixed,
    Variable,
}

/// A function call, placed after its argument tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall {
    pub id: FunctionId,
    /// Values consumed from the stack (for add-ins this counts the name)
    pub arity: usize,
    pub kind: ArityKind,
}

/// Sheet qualifier of a reference: one sheet, or a 3-D span `First:Last`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetSpan {
    pub first: String,
    pub last: Option<String>,
}

impl SheetSpan {
    /// A single-sheet qualifier
    pub fn single<S: Into<String>>(name: S) -> Self {
        Self {
            first: name.into(),
            last: None,
        }
    }

    /// Whether the span covers more than one sheet name
    pub fn is_3d(&self) -> bool {
        self.last.is_some()
    }
}

impl fmt::Display for SheetSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last {
            Some(last) => {
                let joined = format!("{}:{}", self.first, last);
                if needs_quotes(&self.first) || needs_quotes(last) {
                    write!(f, "'{}'", joined.replace('\'', "''"))
                } else {
                    f.write_str(&joined)
                }
            }
            None if needs_quotes(&self.first) => {
                write!(f, "'{}'", self.first.replace('\'', "''"))
            }
            None => f.write_str(&self.first),
        }
    }
}

/// Whether a sheet name has to be quoted in formula text
pub fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return true;
    };
    if !(first.is_alphabetic() || first == '_') {
        return true;
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return true;
    }
    // Names that read as cell references, like "A1" or "R2C3"
    CellAddress::parse(name).is_ok()
}

/// A single-cell reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub sheet: Option<SheetSpan>,
    pub address: CellAddress,
}

/// A rectangular area reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AreaRef {
    pub sheet: Option<SheetSpan>,
    pub range: CellRange,
}

impl From<CellRef> for AreaRef {
    fn from(cell: CellRef) -> Self {
        AreaRef {
            sheet: cell.sheet,
            range: CellRange::single(cell.address),
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        write!(f, "{}", self.address)
    }
}

impl fmt::Display for AreaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        write!(f, "{}", self.range)
    }
}

/// One constant inside an array literal
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Number(f64),
    Str(String),
    Bool(bool),
    Error(ErrorKind),
}

/// A literal matrix `{a,b;c,d}`, rows of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub rows: Vec<Vec<ArrayItem>>,
}

impl ArrayLiteral {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// The atomic unit of a parsed formula and of the evaluation stack
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal
    Number(f64),
    /// Compact numeric literal for integers in 0..=65535
    Int(u16),
    /// String literal
    Str(String),
    /// Boolean literal
    Bool(bool),
    /// Error literal
    Error(ErrorKind),
    /// An omitted argument
    Missing,
    /// Single-cell reference
    Cell(CellRef),
    /// Area reference (single sheet or 3-D)
    Area(AreaRef),
    /// Union, intersection or range-operator expression kept as one operand
    ComplexRange { source: String, areas: Vec<AreaRef> },
    /// Array literal
    Array(ArrayLiteral),
    /// Defined name
    Name(String),
    /// Add-in function name, placed ahead of the add-in's arguments
    ExternName(String),
    /// Operator
    Operator(OperatorKind),
    /// Function call
    Function(FunctionCall),
}

impl Token {
    /// Numeric literal token, compacted to `Int` when possible
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && (0.0..=65535.0).contains(&n) && !(n == 0.0 && n.is_sign_negative())
        {
            Token::Int(n as u16)
        } else {
            Token::Number(n)
        }
    }

    /// Whether the token pushes a value without consuming any
    pub fn is_operand(&self) -> bool {
        !matches!(self, Token::Operator(_) | Token::Function(_))
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Operator(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Token::Function(_))
    }

    /// Whether the token denotes cells rather than a value
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Token::Cell(_) | Token::Area(_) | Token::ComplexRange { .. }
        )
    }

    /// Number of stack values consumed; every token produces exactly one
    pub fn arity(&self) -> usize {
        match self {
            Token::Operator(op) => op.operand_count(),
            Token::Function(call) => call.arity,
            _ => 0,
        }
    }
}

/// An ordered, postfix token sequence for one formula
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenSequence {
    pub tokens: Vec<Token>,
    /// Entered as `{=...}`: the result keeps its array shape
    pub array_formula: bool,
}

impl TokenSequence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            array_formula: false,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Check that reducing the sequence leaves exactly one value
    pub fn is_well_formed(&self) -> bool {
        let mut depth: usize = 0;
        for token in &self.tokens {
            let consumed = token.arity();
            if consumed > depth {
                return false;
            }
            depth = depth - consumed + 1;
        }
        depth == 1
    }

    /// Every cell or area the formula reads directly
    pub fn references(&self) -> Vec<AreaRef> {
        let mut refs = Vec::new();
        for token in &self.tokens {
            match token {
                Token::Cell(cell) => refs.push(cell.clone().into()),
                Token::Area(area) => refs.push(area.clone()),
                Token::ComplexRange { areas, .. } => refs.extend(areas.iter().cloned()),
                _ => {}
            }
        }
        refs
    }

    /// Defined names the formula mentions
    pub fn names(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Name(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a TokenSequence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
