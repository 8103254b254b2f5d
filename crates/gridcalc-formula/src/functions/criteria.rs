//! Criteria matching for SUMIF, COUNTIF, AVERAGEIF and related functions
//!
//! Excel criteria can be:
//! - A number: exact match (e.g., 5)
//! - A text string: case-insensitive match (e.g., "apple")
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=5", "<>apple"
//! - Wildcards: "*" matches any characters, "?" matches a single character,
//!   "~" escapes the next wildcard
//! - Empty string or "=": matches empty cells; "<>" matches non-empty cells

use crate::value::{parse_number_text, Value};
use gridcalc_core::ErrorKind;

/// Criteria matcher for SUMIF/COUNTIF/AVERAGEIF and related functions
#[derive(Debug)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

#[derive(Debug)]
enum CriteriaType {
    /// Comparison with a number
    Number(ComparisonOp, f64),
    /// Comparison with text; equality supports wildcards
    Text(ComparisonOp, String),
    /// Comparison with a boolean
    Bool(ComparisonOp, bool),
    /// Match a specific error value
    Error(ComparisonOp, ErrorKind),
    /// Match empty values
    Empty,
    /// Match anything that is not empty
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn test(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            ComparisonOp::Equal => ordering == Equal,
            ComparisonOp::NotEqual => ordering != Equal,
            ComparisonOp::LessThan => ordering == Less,
            ComparisonOp::LessEqual => ordering != Greater,
            ComparisonOp::GreaterThan => ordering == Greater,
            ComparisonOp::GreaterEqual => ordering != Less,
        }
    }
}

impl CriteriaMatcher {
    /// Create a new criteria matcher from a scalar value
    pub fn new(criteria: &Value) -> Self {
        let criteria_type = match criteria {
            Value::Number(n) => CriteriaType::Number(ComparisonOp::Equal, *n),
            Value::Bool(b) => CriteriaType::Bool(ComparisonOp::Equal, *b),
            Value::Text(s) => Self::parse_string_criteria(s),
            Value::Error(e) => CriteriaType::Error(ComparisonOp::Equal, *e),
            _ => CriteriaType::Empty,
        };

        Self { criteria_type }
    }

    fn parse_string_criteria(s: &str) -> CriteriaType {
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            (ComparisonOp::Equal, s)
        };

        if rest.is_empty() {
            return match op {
                ComparisonOp::NotEqual => CriteriaType::NotEmpty,
                ComparisonOp::Equal => CriteriaType::Empty,
                _ => CriteriaType::Text(op, String::new()),
            };
        }
        if let Some(n) = parse_number_text(rest) {
            return CriteriaType::Number(op, n);
        }
        if rest.eq_ignore_ascii_case("TRUE") {
            return CriteriaType::Bool(op, true);
        }
        if rest.eq_ignore_ascii_case("FALSE") {
            return CriteriaType::Bool(op, false);
        }
        if let Some(e) = ErrorKind::parse(rest) {
            return CriteriaType::Error(op, e);
        }
        CriteriaType::Text(op, rest.to_lowercase())
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &Value) -> bool {
        match &self.criteria_type {
            CriteriaType::Number(op, criteria_num) => {
                // Text that looks like a number does not match a numeric criterion
                let n = match value {
                    Value::Number(n) => *n,
                    _ => return *op == ComparisonOp::NotEqual,
                };
                let ordering = if (n - criteria_num).abs() < 1e-10 {
                    std::cmp::Ordering::Equal
                } else {
                    n.partial_cmp(criteria_num)
                        .unwrap_or(std::cmp::Ordering::Equal)
                };
                op.test(ordering)
            }

            CriteriaType::Bool(op, b) => match value {
                Value::Bool(v) => op.test(v.cmp(b)),
                _ => *op == ComparisonOp::NotEqual,
            },

            CriteriaType::Error(op, e) => match value {
                Value::Error(v) => op.test(if v == e {
                    std::cmp::Ordering::Equal
                } else {
                    std::cmp::Ordering::Less
                }),
                _ => *op == ComparisonOp::NotEqual,
            },

            CriteriaType::Text(op, pattern) => {
                let text = match value {
                    Value::Text(s) => s.to_lowercase(),
                    Value::Empty | Value::Missing if !pattern.is_empty() => {
                        return *op == ComparisonOp::NotEqual
                    }
                    Value::Empty | Value::Missing => String::new(),
                    _ => return *op == ComparisonOp::NotEqual,
                };
                match op {
                    ComparisonOp::Equal => Self::wildcard_match(pattern, &text),
                    ComparisonOp::NotEqual => !Self::wildcard_match(pattern, &text),
                    _ => op.test(text.as_str().cmp(pattern.as_str())),
                }
            }

            CriteriaType::Empty => {
                matches!(value, Value::Empty | Value::Missing)
                    || matches!(value, Value::Text(s) if s.is_empty())
            }

            CriteriaType::NotEmpty => !matches!(value, Value::Empty | Value::Missing),
        }
    }

    /// Case-insensitive wildcard comparison, as MATCH and VLOOKUP use it
    pub fn text_matches(pattern: &str, text: &str) -> bool {
        Self::wildcard_match(&pattern.to_lowercase(), &text.to_lowercase())
    }

    /// Match with wildcards: * = any characters, ? = single character, ~ escapes
    fn wildcard_match(pattern: &str, text: &str) -> bool {
        // If no wildcards, do exact match
        if !pattern.contains(&['*', '?', '~'][..]) {
            return pattern == text;
        }

        let pattern_chars = Self::compile(pattern);
        let text_chars: Vec<char> = text.chars().collect();

        Self::wildcard_match_impl(&pattern_chars, &text_chars)
    }

    fn compile(pattern: &str) -> Vec<PatternChar> {
        let mut out = Vec::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            out.push(match c {
                '~' => match chars.next() {
                    Some(escaped) => PatternChar::Literal(escaped),
                    None => PatternChar::Literal('~'),
                },
                '*' => PatternChar::Star,
                '?' => PatternChar::Any,
                c => PatternChar::Literal(c),
            });
        }
        out
    }

    fn wildcard_match_impl(pattern: &[PatternChar], text: &[char]) -> bool {
        let mut pi = 0; // pattern index
        let mut ti = 0; // text index
        let mut star_pi = None; // position of last * in pattern
        let mut star_ti = 0; // position in text when we matched last *

        while ti < text.len() {
            let step = pattern.get(pi).map(|p| match p {
                PatternChar::Any => true,
                PatternChar::Literal(c) => *c == text[ti],
                PatternChar::Star => false,
            });
            if step == Some(true) {
                pi += 1;
                ti += 1;
            } else if pattern.get(pi) == Some(&PatternChar::Star) {
                star_pi = Some(pi);
                star_ti = ti;
                pi += 1; // Try matching * with empty string first
            } else if let Some(sp) = star_pi {
                pi = sp + 1;
                star_ti += 1;
                ti = star_ti;
            } else {
                return false;
            }
        }

        // Check remaining pattern characters (must all be *)
        while pattern.get(pi) == Some(&PatternChar::Star) {
            pi += 1;
        }

        pi == pattern.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternChar {
    Literal(char),
    Any,
    Star,
}
