//! Formula rendering
//!
//! Rebuilds infix formula text from a postfix [`TokenSequence`]. Each
//! partial expression carries the rank of its outermost operator so
//! parentheses go in exactly where precedence would otherwise regroup it.

use crate::resolver;
use crate::token::{ArrayItem, ArrayLiteral, FunctionId, OperatorKind, Token, TokenSequence};
use crate::value::format_number;

/// Rank of a self-contained piece of text
const ATOM: u8 = 8;

/// Render a token sequence as formula text
///
/// # Example
/// ```rust
/// use gridcalc_formula::{parse, render};
///
/// let seq = parse("=sum(a1:b2, 3)*-2").unwrap();
/// assert_eq!(render(&seq), "=SUM(A1:B2,3)*-2");
/// ```
pub fn render(tokens: &TokenSequence) -> String {
    let mut stack: Vec<(String, u8)> = Vec::with_capacity(tokens.len());

    for token in tokens {
        let piece = match token {
            Token::Number(n) => (format_number(*n), ATOM),
            Token::Int(i) => (i.to_string(), ATOM),
            Token::Str(s) => (quote(s), ATOM),
            Token::Bool(b) => (if *b { "TRUE" } else { "FALSE" }.to_string(), ATOM),
            Token::Error(e) => (e.to_string(), ATOM),
            Token::Missing => (String::new(), ATOM),
            Token::Cell(cell) => (cell.to_string(), ATOM),
            Token::Area(area) => (area.to_string(), ATOM),
            Token::ComplexRange { source, .. } => (source.clone(), ATOM),
            Token::Array(literal) => (array(literal), ATOM),
            Token::Name(name) | Token::ExternName(name) => (name.clone(), ATOM),
            Token::Operator(op) => operator(*op, &mut stack),
            Token::Function(call) => {
                let mut args: Vec<String> = pop_many(&mut stack, call.arity)
                    .into_iter()
                    .map(|(text, _)| text)
                    .collect();
                let name = if call.id == FunctionId::ADDIN && !args.is_empty() {
                    args.remove(0)
                } else {
                    resolver::descriptor(call.id)
                        .map(|d| d.name.to_string())
                        .unwrap_or_else(|| "#NAME?".to_string())
                };
                (format!("{}({})", name, args.join(",")), ATOM)
            }
        };
        stack.push(piece);
    }

    let body: String = stack.into_iter().map(|(text, _)| text).collect();
    if tokens.array_formula {
        format!("{{={}}}", body)
    } else {
        format!("={}", body)
    }
}

fn pop(stack: &mut Vec<(String, u8)>) -> (String, u8) {
    stack.pop().unwrap_or((String::new(), ATOM))
}

fn pop_many(stack: &mut Vec<(String, u8)>, count: usize) -> Vec<(String, u8)> {
    let at = stack.len().saturating_sub(count);
    stack.split_off(at)
}

fn wrap(text: String, rank: u8, needs: bool) -> String {
    if needs && rank < ATOM {
        format!("({})", text)
    } else {
        text
    }
}

fn operator(op: OperatorKind, stack: &mut Vec<(String, u8)>) -> (String, u8) {
    let rank = op.rank();
    match op {
        OperatorKind::Paren => (format!("({})", pop(stack).0), ATOM),
        OperatorKind::UnaryPlus | OperatorKind::UnaryMinus => {
            let (text, inner) = pop(stack);
            (format!("{}{}", op.symbol(), wrap(text, inner, inner < rank)), rank)
        }
        OperatorKind::Percent => {
            let (text, inner) = pop(stack);
            (format!("{}%", wrap(text, inner, inner < rank)), rank)
        }
        _ => {
            let (right, right_rank) = pop(stack);
            let (left, left_rank) = pop(stack);
            // Equal ranks group to the left, so only the right side needs them
            (
                format!(
                    "{}{}{}",
                    wrap(left, left_rank, left_rank < rank),
                    op.symbol(),
                    wrap(right, right_rank, right_rank <= rank)
                ),
                rank,
            )
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn array(literal: &ArrayLiteral) -> String {
    let rows: Vec<String> = literal
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|item| match item {
                    ArrayItem::Number(n) => format_number(*n),
                    ArrayItem::Str(s) => quote(s),
                    ArrayItem::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
                    ArrayItem::Error(e) => e.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    format!("{{{}}}", rows.join(";"))
}
