//! Lexical scanner
//!
//! Partitions formula text (without its leading `=`) into lexemes. Bracketed
//! spans are matched up front so the parser can recurse into them: function
//! arguments arrive already split at their top-level commas.

use crate::error::ParseError;
use lazy_regex::regex_is_match;

/// A function argument's raw text and its offset in the formula
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexemeKind {
    /// Number, boolean, error literal, reference or name
    Operand(String),
    /// Unescaped contents of a `"..."` string
    Text(String),
    /// Contents of a `{...}` array literal
    Array(String),
    /// Contents of a grouping `(...)`
    Group(String),
    /// `NAME(...)` with its arguments
    Call { name: String, args: Vec<Argument> },
    /// Reference expression kept whole: unions, intersections and `(..):..` chains
    ComplexRange(String),
    /// Operator spelling: `+ - * / ^ & % = <> < <= > >=`
    Operator(String),
    /// A `,` or `;` outside any function call
    Separator(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    /// Byte offset in the formula text
    pub position: usize,
}

const ERROR_LITERALS: [&str; 9] = [
    "#DIV/0!", "#VALUE!", "#NULL!", "#NAME?", "#NAME!", "#REF!", "#NUM!", "#N/A!", "#N/A",
];

fn is_operator_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '^' | '&' | '=' | '<' | '>' | '%')
}

fn ends_operand(c: char) -> bool {
    c.is_whitespace()
        || is_operator_char(c)
        || matches!(c, '(' | ')' | '{' | '}' | ',' | ';' | '"')
}

/// Index of the quote closing the one at `start`; doubled quotes are escapes
fn quote_end(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Find the bracket closing the one at `open`, skipping quoted spans
pub fn find_matching(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (open_b, close_b) = match bytes.get(open)? {
        b'(' => (b'(', b')'),
        b'{' => (b'{', b'}'),
        b'[' => (b'[', b']'),
        _ => return None,
    };
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i = quote_end(bytes, i)?;
        } else if b == open_b {
            depth += 1;
        } else if b == close_b {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Split at `sep` where it is outside brackets and quotes; yields (offset, piece)
pub fn split_top_level(text: &str, sep: u8) -> Vec<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = quote_end(bytes, i).unwrap_or(bytes.len() - 1);
            }
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth -= 1,
            b if b == sep && depth == 0 => {
                pieces.push((start, &text[start..i]));
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    pieces.push((start, &text[start..]));
    pieces
}

/// The part of an operand after its sheet qualifier (after the last unquoted `!`)
pub fn address_part(run: &str) -> &str {
    match sheet_separator(run) {
        Some(bang) => &run[bang + 1..],
        None => run,
    }
}

/// Position of the `!` ending a sheet qualifier
pub fn sheet_separator(run: &str) -> Option<usize> {
    let bytes = run.as_bytes();
    let mut i = 0;
    let mut bang = None;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = quote_end(bytes, i)?,
            b'!' => bang = Some(i),
            _ => {}
        }
        i += 1;
    }
    bang
}

/// Whether an operand run has the shape of a cell, area, column or row reference
pub fn looks_like_reference(run: &str) -> bool {
    regex_is_match!(
        r"^(\$?[A-Za-z]{1,3}\$?[0-9]+(:\$?[A-Za-z]{1,3}\$?[0-9]+)*|\$?[A-Za-z]{1,3}:\$?[A-Za-z]{1,3}|\$?[0-9]+:\$?[0-9]+)$",
        address_part(run)
    )
}

/// Scan formula text into lexemes; `base` is the text's offset in the whole formula
pub fn scan(text: &str, base: usize) -> Result<Vec<Lexeme>, ParseError> {
    let mut scanner = Scanner {
        text,
        base,
        pos: 0,
        lexemes: Vec::new(),
    };
    scanner.run()?;
    Ok(scanner.lexemes)
}

struct Scanner<'a> {
    text: &'a str,
    base: usize,
    pos: usize,
    lexemes: Vec<Lexeme>,
}

impl<'a> Scanner<'a> {
    fn peek_at(&self, at: usize) -> Option<char> {
        self.text.get(at..).and_then(|s| s.chars().next())
    }

    fn push(&mut self, kind: LexemeKind, start: usize) {
        self.lexemes.push(Lexeme {
            kind,
            position: self.base + start,
        });
    }

    fn unmatched(&self, bracket: char, at: usize) -> ParseError {
        ParseError::UnmatchedBracket {
            bracket,
            position: self.base + at,
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek_at(self.pos) {
            let start = self.pos;
            match c {
                c if c.is_whitespace() => self.whitespace()?,
                '"' => {
                    let end = quote_end(self.text.as_bytes(), start)
                        .ok_or_else(|| self.unmatched('"', start))?;
                    let inner = self.text[start + 1..end].replace("\"\"", "\"");
                    self.push(LexemeKind::Text(inner), start);
                    self.pos = end + 1;
                }
                '{' => {
                    let end = find_matching(self.text, start)
                        .ok_or_else(|| self.unmatched('{', start))?;
                    let inner = self.text[start + 1..end].to_string();
                    self.push(LexemeKind::Array(inner), start);
                    self.pos = end + 1;
                }
                '(' => self.group()?,
                ')' | '}' => return Err(self.unmatched(c, start)),
                ',' | ';' => {
                    self.push(LexemeKind::Separator(c), start);
                    self.pos += 1;
                }
                c if is_operator_char(c) => self.operator(c),
                _ => self.operand()?,
            }
        }
        Ok(())
    }

    fn whitespace(&mut self) -> Result<(), ParseError> {
        let mut end = self.pos;
        while let Some(c) = self.peek_at(end).filter(|c| c.is_whitespace()) {
            end += c.len_utf8();
        }

        // `A1:B5 B2:C3` is an intersection; keep both sides as one operand
        if let Some(prev) = self.lexemes.last() {
            let prev_is_reference = match &prev.kind {
                LexemeKind::Operand(run) => looks_like_reference(run),
                LexemeKind::ComplexRange(_) => true,
                _ => false,
            };
            let next_starts_operand = self
                .peek_at(end)
                .map(|c| !ends_operand(c) && c != '#')
                .unwrap_or(false);
            if prev_is_reference && next_starts_operand {
                let next_end = self.operand_end(end)?;
                let next = &self.text[end..next_end];
                if looks_like_reference(next) && self.peek_at(next_end) != Some('(') {
                    let prev_start = prev.position - self.base;
                    let source = self.text[prev_start..next_end].to_string();
                    log::debug!("intersection operand {:?}", source);
                    self.lexemes.pop();
                    self.push(LexemeKind::ComplexRange(source), prev_start);
                    self.pos = next_end;
                    return Ok(());
                }
            }
        }

        self.pos = end;
        Ok(())
    }

    fn operator(&mut self, c: char) {
        let text = self.text;
        let start = self.pos;
        let spelling = match (c, self.peek_at(start + 1)) {
            ('<', Some('=')) => "<=",
            ('<', Some('>')) => "<>",
            ('>', Some('=')) => ">=",
            _ => &text[start..start + 1],
        };
        self.pos = start + spelling.len();
        self.push(LexemeKind::Operator(spelling.to_string()), start);
    }

    /// End of the operand run starting at `start`
    fn operand_end(&self, start: usize) -> Result<usize, ParseError> {
        let bytes = self.text.as_bytes();

        if bytes.get(start) == Some(&b'#') {
            let rest = self.text[start..].to_ascii_uppercase();
            return ERROR_LITERALS
                .iter()
                .find(|lit| rest.starts_with(*lit))
                .map(|lit| start + lit.len())
                .ok_or_else(|| {
                    ParseError::UnexpectedToken(format!(
                        "'{}' at position {}",
                        &self.text[start..],
                        self.base + start
                    ))
                });
        }

        let mut end = start;
        while let Some(c) = self.peek_at(end) {
            if c == '\'' {
                end = quote_end(bytes, end).ok_or_else(|| self.unmatched('\'', end))? + 1;
                continue;
            }
            if matches!(c, '+' | '-')
                && regex_is_match!(r"^([0-9]+\.?[0-9]*|\.[0-9]+)[eE]$", &self.text[start..end])
            {
                end += 1;
                continue;
            }
            if ends_operand(c) {
                break;
            }
            end += c.len_utf8();
        }
        Ok(end)
    }

    fn operand(&mut self) -> Result<(), ParseError> {
        let text = self.text;
        let start = self.pos;
        let end = self.operand_end(start)?;
        if end == start {
            return Err(ParseError::UnexpectedToken(format!(
                "'{}' at position {}",
                &text[start..],
                self.base + start
            )));
        }
        let run = &text[start..end];

        if self.peek_at(end) == Some('(') {
            if run.ends_with(':') {
                return self.range_chain(start, end);
            }
            return self.call(run, start, end);
        }

        if address_part(run).matches(':').count() > 1 {
            self.push(LexemeKind::ComplexRange(run.to_string()), start);
        } else {
            self.push(LexemeKind::Operand(run.to_string()), start);
        }
        self.pos = end;
        Ok(())
    }

    fn call(&mut self, name: &str, start: usize, open: usize) -> Result<(), ParseError> {
        let close = find_matching(self.text, open).ok_or_else(|| self.unmatched('(', open))?;
        let inner = &self.text[open + 1..close];
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            split_top_level(inner, b',')
                .into_iter()
                .map(|(offset, text)| Argument {
                    text: text.to_string(),
                    offset: self.base + open + 1 + offset,
                })
                .collect()
        };
        self.push(
            LexemeKind::Call {
                name: name.to_string(),
                args,
            },
            start,
        );
        self.pos = close + 1;
        Ok(())
    }

    fn group(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let close = find_matching(self.text, start).ok_or_else(|| self.unmatched('(', start))?;

        if self.peek_at(close + 1) == Some(':') {
            return self.range_chain(start, close + 1);
        }

        let text = self.text;
        let inner = &text[start + 1..close];
        if split_top_level(inner, b',').len() > 1 {
            log::debug!("union operand {:?}", &text[start..=close]);
            self.push(LexemeKind::ComplexRange(text[start..=close].to_string()), start);
        } else {
            self.push(LexemeKind::Group(inner.to_string()), start);
        }
        self.pos = close + 1;
        Ok(())
    }

    /// Consume `:`-joined primaries after `end` and emit the whole span as one operand
    fn range_chain(&mut self, start: usize, mut end: usize) -> Result<(), ParseError> {
        loop {
            if self.text[..end].ends_with(':') {
                end = match self.peek_at(end) {
                    Some('(') => {
                        find_matching(self.text, end).ok_or_else(|| self.unmatched('(', end))? + 1
                    }
                    Some(_) => {
                        let next = self.operand_end(end)?;
                        if next == end {
                            return Err(ParseError::InvalidReference(
                                self.text[start..end].to_string(),
                            ));
                        }
                        next
                    }
                    None => {
                        return Err(ParseError::InvalidReference(
                            self.text[start..end].to_string(),
                        ))
                    }
                };
            } else if self.peek_at(end) == Some(':') {
                end += 1;
            } else {
                break;
            }
        }
        let source = self.text[start..end].to_string();
        log::debug!("range-chain operand {:?}", source);
        self.push(LexemeKind::ComplexRange(source), start);
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<LexemeKind> {
        scan(text, 0).unwrap().into_iter().map(|l| l.kind).collect()
    }

    fn op(s: &str) -> LexemeKind {
        LexemeKind::Operator(s.to_string())
    }

    fn operand(s: &str) -> LexemeKind {
        LexemeKind::Operand(s.to_string())
    }

    #[test]
    fn test_find_matching_skips_quotes() {
        assert_eq!(find_matching("(a)", 0), Some(2));
        assert_eq!(find_matching("(\")\")", 0), Some(4));
        assert_eq!(find_matching("('a)b'!A1)", 0), Some(9));
        assert_eq!(find_matching("((a)", 0), None);
        assert_eq!(find_matching("{1,{2}}", 0), Some(6));
    }

    #[test]
    fn test_split_top_level() {
        let pieces: Vec<_> = split_top_level("1,SUM(2,3),\"a,b\"", b',')
            .into_iter()
            .map(|(_, s)| s)
            .collect();
        assert_eq!(pieces, vec!["1", "SUM(2,3)", "\"a,b\""]);
    }

    #[test]
    fn test_operators_and_operands() {
        assert_eq!(
            kinds("A1<=2.5E+3%"),
            vec![operand("A1"), op("<="), operand("2.5E+3"), op("%")]
        );
        assert_eq!(kinds("1<>2"), vec![operand("1"), op("<>"), operand("2")]);
        assert_eq!(kinds("-1"), vec![op("-"), operand("1")]);
    }

    #[test]
    fn test_strings_and_errors() {
        assert_eq!(
            kinds("\"say \"\"hi\"\"\"&#N/A"),
            vec![
                LexemeKind::Text("say \"hi\"".into()),
                op("&"),
                operand("#N/A")
            ]
        );
        assert_eq!(kinds("#DIV/0!"), vec![operand("#DIV/0!")]);
    }

    #[test]
    fn test_calls_and_groups() {
        let lexemes = kinds("SUM(1, (2+3))*(4)");
        assert_eq!(
            lexemes[0],
            LexemeKind::Call {
                name: "SUM".into(),
                args: vec![
                    Argument {
                        text: "1".into(),
                        offset: 4
                    },
                    Argument {
                        text: " (2+3)".into(),
                        offset: 6
                    },
                ],
            }
        );
        assert_eq!(lexemes[1], op("*"));
        assert_eq!(lexemes[2], LexemeKind::Group("4".into()));

        assert_eq!(
            kinds("PI()"),
            vec![LexemeKind::Call {
                name: "PI".into(),
                args: vec![]
            }]
        );
    }

    #[test]
    fn test_quoted_sheet_names() {
        assert_eq!(kinds("'My Sheet'!A1+1")[0], operand("'My Sheet'!A1"));
        assert_eq!(kinds("Jan:Mar!B2")[0], operand("Jan:Mar!B2"));
    }

    #[test]
    fn test_complex_ranges() {
        assert_eq!(
            kinds("(A1:B2):C3"),
            vec![LexemeKind::ComplexRange("(A1:B2):C3".into())]
        );
        assert_eq!(
            kinds("(A1,B2)"),
            vec![LexemeKind::ComplexRange("(A1,B2)".into())]
        );
        assert_eq!(
            kinds("A1:B5 B2:C3"),
            vec![LexemeKind::ComplexRange("A1:B5 B2:C3".into())]
        );
        assert_eq!(
            kinds("A1:B2:C3"),
            vec![LexemeKind::ComplexRange("A1:B2:C3".into())]
        );
        assert_eq!(kinds("A1 + B1"), vec![operand("A1"), op("+"), operand("B1")]);
    }

    #[test]
    fn test_unmatched_brackets() {
        assert_eq!(
            scan("SUM(1", 1).unwrap_err(),
            ParseError::UnmatchedBracket {
                bracket: '(',
                position: 4
            }
        );
        assert!(matches!(
            scan("\"abc", 0),
            Err(ParseError::UnmatchedBracket { bracket: '"', .. })
        ));
        assert!(matches!(
            scan("1)", 0),
            Err(ParseError::UnmatchedBracket { bracket: ')', .. })
        ));
    }

    #[test]
    fn test_reference_shapes() {
        assert!(looks_like_reference("$A$1"));
        assert!(looks_like_reference("Sheet1!A1:B2"));
        assert!(looks_like_reference("'My Sheet'!C:C"));
        assert!(looks_like_reference("3:5"));
        assert!(!looks_like_reference("TRUE"));
        assert!(!looks_like_reference("Rate"));
        assert!(!looks_like_reference("1.5"));
    }
}
