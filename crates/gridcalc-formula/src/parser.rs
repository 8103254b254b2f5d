//! Formula parser
//!
//! An operator-precedence parser over the scanner's lexemes. It emits a
//! postfix [`TokenSequence`]: operands go straight to the output, operators
//! wait on a stack until an operator of lower or equal rank flushes them.
//! Function arguments and parenthesised groups are parsed recursively.

use crate::error::ParseError;
use crate::resolver;
use crate::scanner::{self, split_top_level, LexemeKind};
use crate::token::{
    AreaRef, ArrayItem, ArrayLiteral, CellRef, OperatorKind, SheetSpan, Token, TokenSequence,
};
use gridcalc_core::{CellAddress, CellRange, ErrorKind};
use lazy_regex::regex_is_match;

/// Parse a formula string into a postfix token sequence
///
/// Accepts `=expr` and the array-formula form `{=expr}`. The empty formula
/// `=` parses to a single missing-argument token.
///
/// # Example
/// ```rust
/// use gridcalc_formula::parse;
///
/// let seq = parse("=1+2*3").unwrap();
/// assert_eq!(seq.len(), 5);
/// assert!(parse("=SUM(A1:A10)").is_ok());
/// assert!(parse("{=SUM(A1:A3*B1:B3)}").unwrap().array_formula);
/// ```
pub fn parse(formula: &str) -> Result<TokenSequence, ParseError> {
    let lead = formula.len() - formula.trim_start().len();
    let trimmed = formula.trim();

    let (body, base, array_formula) = if let Some(rest) = trimmed.strip_prefix("{=") {
        let body = rest.strip_suffix('}').ok_or(ParseError::UnmatchedBracket {
            bracket: '{',
            position: lead,
        })?;
        (body, lead + 2, true)
    } else if let Some(body) = trimmed.strip_prefix('=') {
        (body, lead + 1, false)
    } else {
        return Err(ParseError::MissingEquals);
    };

    let tokens = if body.trim().is_empty() {
        vec![Token::Missing]
    } else {
        parse_expression(body, base)?
    };
    log::debug!("parsed {:?} into {} tokens", formula, tokens.len());

    Ok(TokenSequence {
        tokens,
        array_formula,
    })
}

/// Parse, substituting a `#N/A` placeholder when the text does not compile
pub fn parse_or_placeholder(formula: &str) -> TokenSequence {
    match parse(formula) {
        Ok(seq) => seq,
        Err(e) => {
            log::warn!("formula {:?} does not compile ({}); storing #N/A", formula, e);
            TokenSequence::new(vec![Token::Error(ErrorKind::Na)])
        }
    }
}

/// Working state for one (sub-)expression
struct ParserState {
    output: Vec<Token>,
    operators: Vec<OperatorKind>,
    /// True until an operand arrives, and again after every binary operator
    expect_operand: bool,
}

impl ParserState {
    fn new() -> Self {
        Self {
            output: Vec::new(),
            operators: Vec::new(),
            expect_operand: true,
        }
    }

    /// Move pending operators binding at least as tightly as `rank` to the output
    fn flush(&mut self, rank: u8) {
        while let Some(&top) = self.operators.last() {
            if top.rank() < rank {
                break;
            }
            self.operators.pop();
            self.output.push(Token::Operator(top));
        }
    }

    fn operand(&mut self, tokens: Vec<Token>, position: usize) -> Result<(), ParseError> {
        if !self.expect_operand {
            return Err(unexpected(&describe(&tokens), position));
        }
        self.output.extend(tokens);
        self.expect_operand = false;
        Ok(())
    }

    fn operator(&mut self, spelling: &str, position: usize) -> Result<(), ParseError> {
        if self.expect_operand {
            let prefix = match spelling {
                "+" => OperatorKind::UnaryPlus,
                "-" => OperatorKind::UnaryMinus,
                _ => return Err(ParseError::MissingOperand(at(spelling, position))),
            };
            // Prefix signs wait for their operand without flushing anything
            self.operators.push(prefix);
            return Ok(());
        }

        if spelling == "%" {
            self.flush(OperatorKind::Percent.rank());
            self.output.push(Token::Operator(OperatorKind::Percent));
            return Ok(());
        }

        let op = OperatorKind::binary_from_symbol(spelling)
            .ok_or_else(|| unexpected(spelling, position))?;
        self.flush(op.rank());
        self.operators.push(op);
        self.expect_operand = true;
        Ok(())
    }

    fn finish(mut self, text: &str) -> Result<Vec<Token>, ParseError> {
        if self.expect_operand {
            return Err(ParseError::MissingOperand(text.trim().to_string()));
        }
        self.flush(0);
        Ok(self.output)
    }
}

fn at(text: &str, position: usize) -> String {
    format!("'{}' at position {}", text, position)
}

fn unexpected(text: &str, position: usize) -> ParseError {
    ParseError::UnexpectedToken(at(text, position))
}

fn describe(tokens: &[Token]) -> String {
    match tokens.first() {
        Some(Token::Str(s)) => format!("\"{}\"", s),
        Some(token) => format!("{:?}", token),
        None => String::new(),
    }
}

/// Parse an expression; `base` is its offset in the whole formula
fn parse_expression(text: &str, base: usize) -> Result<Vec<Token>, ParseError> {
    let mut state = ParserState::new();

    for lexeme in scanner::scan(text, base)? {
        let position = lexeme.position;
        match lexeme.kind {
            LexemeKind::Operator(spelling) => state.operator(&spelling, position)?,
            LexemeKind::Separator(c) => return Err(unexpected(&c.to_string(), position)),
            LexemeKind::Text(s) => state.operand(vec![Token::Str(s)], position)?,
            LexemeKind::Operand(run) => {
                let token = classify_operand(&run, position)?;
                state.operand(vec![token], position)?;
            }
            LexemeKind::Array(inner) => {
                let token = Token::Array(parse_array(&inner)?);
                state.operand(vec![token], position)?;
            }
            LexemeKind::ComplexRange(source) => {
                let areas = parse_complex_range(&source)?;
                log::debug!("complex range {:?} covers {} areas", source, areas.len());
                state.operand(vec![Token::ComplexRange { source, areas }], position)?;
            }
            LexemeKind::Group(inner) => {
                if inner.trim().is_empty() {
                    return Err(ParseError::MissingOperand(at("()", position)));
                }
                let mut tokens = parse_expression(&inner, position + 1)?;
                tokens.push(Token::Operator(OperatorKind::Paren));
                state.operand(tokens, position)?;
            }
            LexemeKind::Call { name, args } => {
                let tokens = parse_call(&name, &args)?;
                state.operand(tokens, position)?;
            }
        }
    }

    state.finish(text)
}

/// Arguments followed by the call token; add-ins get their name token first
fn parse_call(name: &str, args: &[scanner::Argument]) -> Result<Vec<Token>, ParseError> {
    let descriptor = resolver::resolve(name)?;
    let mut tokens = Vec::new();
    if descriptor.addin {
        log::debug!("add-in call {} goes through its name token", descriptor.name);
        tokens.push(Token::ExternName(descriptor.name.to_string()));
    }
    for arg in args {
        if arg.text.trim().is_empty() {
            tokens.push(Token::Missing);
        } else {
            tokens.extend(parse_expression(&arg.text, arg.offset)?);
        }
    }
    tokens.push(Token::Function(descriptor.call(args.len())));
    Ok(tokens)
}

fn is_number_literal(run: &str) -> bool {
    regex_is_match!(r"^([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?$", run)
}

/// Turn an operand run into a literal, reference or name token
fn classify_operand(run: &str, position: usize) -> Result<Token, ParseError> {
    if is_number_literal(run) {
        let n: f64 = run
            .parse()
            .map_err(|_| unexpected(run, position))?;
        return Ok(Token::number(n));
    }
    if run.eq_ignore_ascii_case("TRUE") {
        return Ok(Token::Bool(true));
    }
    if run.eq_ignore_ascii_case("FALSE") {
        return Ok(Token::Bool(false));
    }
    if run.starts_with('#') {
        return ErrorKind::parse(run)
            .map(Token::Error)
            .ok_or_else(|| unexpected(run, position));
    }

    let folded = fold_repeated_sheet(run);
    let run = folded.as_deref().unwrap_or(run);
    if scanner::sheet_separator(run).is_some() || scanner::looks_like_reference(run) {
        let area = parse_area(run)?;
        if !scanner::address_part(run).contains(':') {
            return Ok(Token::Cell(CellRef {
                sheet: area.sheet,
                address: area.range.start,
            }));
        }
        return Ok(Token::Area(area));
    }

    if regex_is_match!(r"^[A-Za-z_\\][A-Za-z0-9_.\\]*$", run) {
        return Ok(Token::Name(run.to_string()));
    }
    Err(unexpected(run, position))
}

/// Sheet qualifier text (without the `!`), quoted or bare, single or `First:Last`
fn parse_sheet_span(prefix: &str) -> Result<SheetSpan, ParseError> {
    let raw = match prefix
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => prefix.to_string(),
    };
    if raw.is_empty() {
        return Err(ParseError::InvalidReference(format!("{}!", prefix)));
    }
    Ok(match raw.split_once(':') {
        Some((first, last)) if !first.is_empty() && !last.is_empty() => SheetSpan {
            first: first.to_string(),
            last: Some(last.to_string()),
        },
        Some(_) => return Err(ParseError::InvalidReference(format!("{}!", prefix))),
        None => SheetSpan::single(raw),
    })
}

/// `Sheet1!A1:Sheet1!B2` names one sheet on both endpoints; fold it to `Sheet1!A1:B2`
fn fold_repeated_sheet(run: &str) -> Option<String> {
    run.match_indices(':').find_map(|(colon, _)| {
        let (left, right) = (&run[..colon], &run[colon + 1..]);
        let left_bang = scanner::sheet_separator(left)?;
        let right_bang = scanner::sheet_separator(right)?;
        let (first, second) = (&left[..left_bang], &right[..right_bang]);
        if scanner::sheet_separator(first).is_some() || scanner::sheet_separator(second).is_some() {
            return None;
        }
        let same = match (parse_sheet_span(first).ok()?, parse_sheet_span(second).ok()?) {
            (a, b) if a.last.is_none() && b.last.is_none() => {
                a.first.to_lowercase() == b.first.to_lowercase()
            }
            _ => false,
        };
        same.then(|| format!("{}:{}", left, &right[right_bang + 1..]))
    })
}

/// One reference run: optional sheet qualifier, then `A1`, `A1:B2`, `A:C`, `2:5`
/// or a longer `:` chain
fn parse_area(run: &str) -> Result<AreaRef, ParseError> {
    let folded = fold_repeated_sheet(run);
    let run = folded.as_deref().unwrap_or(run);
    let invalid = || ParseError::InvalidReference(run.to_string());
    let (sheet, address) = match scanner::sheet_separator(run) {
        Some(bang) => (Some(parse_sheet_span(&run[..bang])?), &run[bang + 1..]),
        None => (None, run),
    };
    if address.is_empty() {
        return Err(invalid());
    }

    let pieces: Vec<&str> = address.split(':').collect();
    let range = if pieces.len() <= 2 {
        CellRange::parse(address).map_err(|_| invalid())?
    } else {
        let mut bounds: Option<CellRange> = None;
        for piece in pieces {
            let cell = CellRange::single(CellAddress::parse(piece).map_err(|_| invalid())?);
            bounds = Some(match bounds {
                Some(b) => b.bounding(&cell),
                None => cell,
            });
        }
        bounds.ok_or_else(invalid)?
    };
    Ok(AreaRef { sheet, range })
}

/// Parse a union / intersection / range-operator expression into its areas
///
/// An intersection that leaves nothing gives an empty list, which
/// evaluates to `#NULL!`.
fn parse_complex_range(source: &str) -> Result<Vec<AreaRef>, ParseError> {
    let mut parser = RangeParser {
        source,
        bytes: source.as_bytes(),
        pos: 0,
    };
    let areas = parser.union()?;
    parser.skip_spaces();
    if parser.pos != source.len() {
        return Err(ParseError::InvalidReference(source.to_string()));
    }
    Ok(areas)
}

/// Recursive descent over `,` (union), ` ` (intersection) and `:` (range)
struct RangeParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl RangeParser<'_> {
    fn invalid(&self) -> ParseError {
        ParseError::InvalidReference(self.source.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn union(&mut self) -> Result<Vec<AreaRef>, ParseError> {
        let mut areas = self.intersection()?;
        loop {
            self.skip_spaces();
            if self.peek() != Some(b',') {
                return Ok(areas);
            }
            self.pos += 1;
            self.skip_spaces();
            areas.extend(self.intersection()?);
        }
    }

    fn intersection(&mut self) -> Result<Vec<AreaRef>, ParseError> {
        let mut areas = self.range()?;
        loop {
            let mark = self.pos;
            self.skip_spaces();
            if self.pos == mark || matches!(self.peek(), None | Some(b',') | Some(b')')) {
                return Ok(areas);
            }
            let other = self.range()?;
            areas = intersect(&areas, &other);
        }
    }

    fn range(&mut self) -> Result<Vec<AreaRef>, ParseError> {
        let mut areas = self.primary()?;
        while self.peek() == Some(b':') {
            self.pos += 1;
            let other = self.primary()?;
            areas = vec![self.bound(&areas, &other)?];
        }
        Ok(areas)
    }

    fn primary(&mut self) -> Result<Vec<AreaRef>, ParseError> {
        if self.peek() == Some(b'(') {
            let close = scanner::find_matching(self.source, self.pos).ok_or_else(|| self.invalid())?;
            let inner = &self.source[self.pos + 1..close];
            let areas = parse_complex_range(inner)?;
            self.pos = close + 1;
            return Ok(areas);
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    let rest = &self.source[self.pos..];
                    let end = rest[1..].find('\'').ok_or_else(|| self.invalid())?;
                    self.pos += end + 2;
                }
                b',' | b' ' | b'(' | b')' => break,
                // A `:` ends the run unless it joins a sheet span or an address
                b':' if !self.run_continues(start) => break,
                _ => self.pos += 1,
            }
        }
        let run = &self.source[start..self.pos];
        if run.is_empty() {
            return Err(self.invalid());
        }
        Ok(vec![parse_area(run)?])
    }

    /// Whether the `:` at the cursor belongs to the run that began at `start`
    fn run_continues(&self, start: usize) -> bool {
        let next = self.bytes.get(self.pos + 1).copied();
        start < self.pos && next.map_or(false, |b| b != b'(')
    }

    fn bound(&self, left: &[AreaRef], right: &[AreaRef]) -> Result<AreaRef, ParseError> {
        let mut all = left.iter().chain(right.iter());
        let first = all.next().ok_or_else(|| self.invalid())?;
        let mut range = first.range;
        for area in all {
            if area.sheet.is_some() && area.sheet != first.sheet {
                return Err(self.invalid());
            }
            range = range.bounding(&area.range);
        }
        Ok(AreaRef {
            sheet: first.sheet.clone(),
            range,
        })
    }
}

/// Pairwise overlap of two area lists on matching sheets
fn intersect(left: &[AreaRef], right: &[AreaRef]) -> Vec<AreaRef> {
    let mut out = Vec::new();
    for a in left {
        for b in right {
            if a.sheet != b.sheet {
                continue;
            }
            if let Some(range) = a.range.intersect(&b.range) {
                out.push(AreaRef {
                    sheet: a.sheet.clone(),
                    range,
                });
            }
        }
    }
    out
}

/// Parse the inside of `{...}`
fn parse_array(inner: &str) -> Result<ArrayLiteral, ParseError> {
    let malformed = || ParseError::MalformedArray(format!("{{{}}}", inner));
    let mut rows = Vec::new();
    for (_, row) in split_top_level(inner, b';') {
        let mut items = Vec::new();
        for (_, item) in split_top_level(row, b',') {
            items.push(array_item(item.trim()).ok_or_else(malformed)?);
        }
        rows.push(items);
    }
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 || rows.iter().any(|row| row.len() != width) {
        return Err(malformed());
    }
    Ok(ArrayLiteral { rows })
}

fn array_item(item: &str) -> Option<ArrayItem> {
    if item.len() >= 2 && item.starts_with('"') && item.ends_with('"') {
        let body = &item[1..item.len() - 1];
        return Some(ArrayItem::Str(body.replace("\"\"", "\"")));
    }
    if item.eq_ignore_ascii_case("TRUE") {
        return Some(ArrayItem::Bool(true));
    }
    if item.eq_ignore_ascii_case("FALSE") {
        return Some(ArrayItem::Bool(false));
    }
    if item.starts_with('#') {
        return ErrorKind::parse(item).map(ArrayItem::Error);
    }
    let (sign, digits) = match item.as_bytes().first() {
        Some(b'-') => (-1.0, item[1..].trim_start()),
        Some(b'+') => (1.0, item[1..].trim_start()),
        _ => (1.0, item),
    };
    if !is_number_literal(digits) {
        return None;
    }
    digits.parse::<f64>().ok().map(|n| ArrayItem::Number(sign * n))
}
