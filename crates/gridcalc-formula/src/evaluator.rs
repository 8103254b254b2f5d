//! Formula evaluator
//!
//! Walks a postfix [`TokenSequence`] with a value stack. Operands push a
//! value, operators and function calls pop their arity and push one result.
//! Spreadsheet errors are ordinary values on the stack; only a malformed
//! sequence makes evaluation itself fail.

use crate::error::{FormulaError, FormulaResult};
use crate::functions::args::{area_rows, dereference};
use crate::functions::math::power;
use crate::functions::{registry, FunctionDef};
use crate::oracle::CellOracle;
use crate::parser::parse;
use crate::token::{
    AreaRef, ArrayItem, ArrayLiteral, FunctionCall, FunctionId, OperatorKind, Token, TokenSequence,
};
use crate::value::{compare, Area, Reference, Value};
use gridcalc_core::ErrorKind;
use std::cmp::Ordering;

/// How deep defined names may refer to other names
const MAX_NAME_DEPTH: usize = 32;

/// Evaluate a parsed formula
///
/// The result is a plain value: references are read, and unless the
/// sequence is an array formula an array result is reduced to its
/// top-left element.
///
/// # Example
/// ```rust
/// use gridcalc_formula::{evaluate, parse, EvaluationContext, Value};
///
/// let seq = parse("=2+3*4").unwrap();
/// let result = evaluate(&seq, &EvaluationContext::simple()).unwrap();
/// assert_eq!(result, Value::Number(14.0));
/// ```
pub fn evaluate(tokens: &TokenSequence, oracle: &dyn CellOracle) -> FormulaResult<Value> {
    let evaluator = Evaluator {
        oracle,
        array_mode: tokens.array_formula,
        depth: 0,
    };
    let value = evaluator.reduce(tokens)?;
    Ok(evaluator.finish(value))
}

/// Parse and evaluate formula text
pub fn evaluate_formula(formula: &str, oracle: &dyn CellOracle) -> FormulaResult<Value> {
    let tokens = parse(formula)?;
    evaluate(&tokens, oracle)
}

struct Evaluator<'a> {
    oracle: &'a dyn CellOracle,
    /// Operators see whole ranges as arrays instead of intersecting them
    array_mode: bool,
    depth: usize,
}

impl Evaluator<'_> {
    /// Run the stack machine; the single remaining value is returned as is
    fn reduce(&self, tokens: &TokenSequence) -> FormulaResult<Value> {
        let mut stack: Vec<Value> = Vec::with_capacity(tokens.len());

        for (position, token) in tokens.iter().enumerate() {
            log::trace!("token {}: {:?}", position, token);
            let value = match token {
                Token::Number(n) => Value::Number(*n),
                Token::Int(i) => Value::Number(f64::from(*i)),
                Token::Str(s) => Value::Text(s.clone()),
                Token::Bool(b) => Value::Bool(*b),
                Token::Error(e) => Value::Error(*e),
                Token::Missing => Value::Missing,
                Token::Cell(cell) => self.reference(&[AreaRef::from(cell.clone())]),
                Token::Area(area) => self.reference(std::slice::from_ref(area)),
                Token::ComplexRange { areas, .. } => {
                    if areas.is_empty() {
                        Value::Error(ErrorKind::Null)
                    } else {
                        self.reference(areas)
                    }
                }
                Token::Array(literal) => array_value(literal),
                Token::Name(name) => self.name(name),
                Token::ExternName(name) => Value::Text(name.clone()),
                Token::Operator(op) => {
                    let operands = pop(&mut stack, op.operand_count(), position)?;
                    self.operator(*op, operands)
                }
                Token::Function(call) => {
                    let args = pop(&mut stack, call.arity, position)?;
                    self.call(call, &args)
                }
            };
            stack.push(value);
        }

        match (stack.pop(), stack.len()) {
            (Some(value), 0) => Ok(value),
            (None, _) => Err(FormulaError::UnbalancedStack { remaining: 0 }),
            (Some(_), rest) => Err(FormulaError::UnbalancedStack {
                remaining: rest + 1,
            }),
        }
    }

    /// Reduce the last stack value to what a cell can hold
    fn finish(&self, value: Value) -> Value {
        match value {
            Value::Reference(reference) => {
                let value = if self.array_mode {
                    match reference.single_area() {
                        Some(area) => collapse(area_rows(area, self.oracle)),
                        None => Value::Error(ErrorKind::Value),
                    }
                } else {
                    dereference(&reference, self.oracle)
                };
                match value {
                    Value::Empty => Value::Number(0.0),
                    v => v,
                }
            }
            Value::Array(rows) if !self.array_mode => rows
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next())
                .unwrap_or(Value::Error(ErrorKind::Value)),
            Value::Missing => Value::Empty,
            v => v,
        }
    }

    /// Resolve sheet qualifiers into a reference value; unknown sheets are `#REF!`
    fn reference(&self, areas: &[AreaRef]) -> Value {
        let mut resolved = Vec::with_capacity(areas.len());
        for area in areas {
            let (first, last) = match &area.sheet {
                None => {
                    let sheet = self.oracle.current_sheet();
                    (sheet, sheet)
                }
                Some(span) => {
                    let Some(first) = self.oracle.resolve_sheet(&span.first) else {
                        return Value::Error(ErrorKind::Ref);
                    };
                    let last = match &span.last {
                        Some(name) => match self.oracle.resolve_sheet(name) {
                            Some(sheet) => sheet,
                            None => return Value::Error(ErrorKind::Ref),
                        },
                        None => first,
                    };
                    (first.min(last), first.max(last))
                }
            };
            resolved.push(Area {
                first_sheet: first,
                last_sheet: last,
                range: area.range,
            });
        }
        Value::Reference(Reference { areas: resolved })
    }

    /// Evaluate a defined name's formula, keeping references unread
    fn name(&self, name: &str) -> Value {
        if self.depth >= MAX_NAME_DEPTH {
            log::debug!("defined name {} nests too deeply", name);
            return Value::Error(ErrorKind::Ref);
        }
        let Some(refers_to) = self.oracle.resolve_name(name) else {
            return Value::Error(ErrorKind::Name);
        };
        let text = if refers_to.trim_start().starts_with('=') {
            refers_to
        } else {
            format!("={}", refers_to)
        };
        let nested = Evaluator {
            oracle: self.oracle,
            array_mode: self.array_mode,
            depth: self.depth + 1,
        };
        match parse(&text) {
            Ok(tokens) => nested
                .reduce(&tokens)
                .unwrap_or(Value::Error(ErrorKind::Name)),
            Err(e) => {
                log::debug!("defined name {} does not compile: {}", name, e);
                Value::Error(ErrorKind::Name)
            }
        }
    }

    fn operator(&self, op: OperatorKind, mut operands: Vec<Value>) -> Value {
        if op == OperatorKind::Paren {
            return operands.pop().unwrap_or(Value::Error(ErrorKind::Value));
        }
        let mut operands = operands.into_iter().map(|v| self.operand(v));
        match (operands.next(), operands.next()) {
            (Some(left), Some(right)) => broadcast(&left, &right, |l, r| binary(op, l, r)),
            (Some(value), None) => map(&value, |v| unary(op, v)),
            _ => Value::Error(ErrorKind::Value),
        }
    }

    /// An operator's view of a stack value: read references, blank for omitted
    fn operand(&self, value: Value) -> Value {
        match value {
            Value::Reference(reference) => {
                let single = reference.is_single_cell();
                match reference.single_area() {
                    Some(area) if self.array_mode && !single && !area.is_3d() => {
                        collapse(area_rows(area, self.oracle))
                    }
                    _ => dereference(&reference, self.oracle),
                }
            }
            Value::Missing => Value::Empty,
            v => v,
        }
    }

    fn call(&self, call: &FunctionCall, args: &[Value]) -> Value {
        let Some((def, args)) = resolve_call(call, args) else {
            return Value::Error(ErrorKind::Name);
        };
        let descriptor = &def.descriptor;
        if !descriptor.accepts(args.len()) {
            log::debug!(
                "{} called with {} arguments",
                descriptor.name,
                args.len()
            );
            return Value::Error(ErrorKind::Value);
        }
        if descriptor.propagates_errors {
            if let Some(e) = args.iter().find_map(Value::as_error) {
                return Value::Error(e);
            }
        }
        match (def.implementation)(args, self.oracle) {
            Ok(value) => value,
            Err(e) => Value::Error(e),
        }
    }
}

/// Find the implementation; add-in calls carry their name as the first argument
fn resolve_call<'v>(
    call: &FunctionCall,
    args: &'v [Value],
) -> Option<(&'static FunctionDef, &'v [Value])> {
    if call.id != FunctionId::ADDIN {
        return registry().get_by_id(call.id).map(|def| (def, args));
    }
    let (name, rest) = args.split_first()?;
    let Value::Text(name) = name else {
        return None;
    };
    let def = registry().get(name)?;
    log::trace!("add-in {} re-resolved to id {}", name, def.descriptor.id.0);
    Some((def, rest))
}

fn pop(stack: &mut Vec<Value>, count: usize, position: usize) -> FormulaResult<Vec<Value>> {
    if stack.len() < count {
        return Err(FormulaError::StackUnderflow { position });
    }
    Ok(stack.split_off(stack.len() - count))
}

fn array_value(literal: &ArrayLiteral) -> Value {
    Value::Array(
        literal
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|item| match item {
                        ArrayItem::Number(n) => Value::Number(*n),
                        ArrayItem::Str(s) => Value::Text(s.clone()),
                        ArrayItem::Bool(b) => Value::Bool(*b),
                        ArrayItem::Error(e) => Value::Error(*e),
                    })
                    .collect()
            })
            .collect(),
    )
}

/// A 1x1 grid is its only element
fn collapse(mut rows: Vec<Vec<Value>>) -> Value {
    if rows.len() == 1 && rows[0].len() == 1 {
        return rows.remove(0).remove(0);
    }
    if rows.is_empty() {
        return Value::Empty;
    }
    Value::Array(rows)
}

fn map(value: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match value {
        Value::Array(rows) => Value::Array(
            rows.iter()
                .map(|row| row.iter().map(&f).collect())
                .collect(),
        ),
        v => f(v),
    }
}

/// Apply a binary scalar operation element-wise
///
/// A single row or column stretches across the other operand; positions
/// beyond a smaller array are `#N/A`.
fn broadcast(left: &Value, right: &Value, f: impl Fn(&Value, &Value) -> Value) -> Value {
    if !matches!(left, Value::Array(_)) && !matches!(right, Value::Array(_)) {
        return f(left, right);
    }
    let (lr, lc) = dims(left);
    let (rr, rc) = dims(right);
    let rows = lr.max(rr);
    let cols = lc.max(rc);
    Value::Array(
        (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| match (element(left, r, c), element(right, r, c)) {
                        (Some(l), Some(r)) => f(l, r),
                        _ => Value::Error(ErrorKind::Na),
                    })
                    .collect()
            })
            .collect(),
    )
}

fn dims(value: &Value) -> (usize, usize) {
    match value {
        Value::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
        _ => (1, 1),
    }
}

fn element(value: &Value, row: usize, col: usize) -> Option<&Value> {
    match value {
        Value::Array(rows) => {
            let (height, width) = dims(value);
            let r = if height == 1 { 0 } else { row };
            let c = if width == 1 { 0 } else { col };
            rows.get(r).and_then(|cells| cells.get(c))
        }
        v => Some(v),
    }
}

fn unary(op: OperatorKind, value: &Value) -> Value {
    if let Value::Error(e) = value {
        return Value::Error(*e);
    }
    match op {
        OperatorKind::UnaryPlus => value.clone(),
        OperatorKind::UnaryMinus => match value.coerce_number() {
            Ok(n) => Value::Number(-n),
            Err(e) => Value::Error(e),
        },
        OperatorKind::Percent => match value.coerce_number() {
            Ok(n) => Value::Number(n / 100.0),
            Err(e) => Value::Error(e),
        },
        _ => Value::Error(ErrorKind::Value),
    }
}

fn binary(op: OperatorKind, left: &Value, right: &Value) -> Value {
    if let Value::Error(e) = left {
        return Value::Error(*e);
    }
    if let Value::Error(e) = right {
        return Value::Error(*e);
    }

    if op == OperatorKind::Concat {
        return match (left.coerce_text(), right.coerce_text()) {
            (Ok(l), Ok(r)) => Value::Text(l + &r),
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
        };
    }

    if op.is_comparison() {
        let ordering = compare(left, right);
        let result = match op {
            OperatorKind::Eq => ordering == Ordering::Equal,
            OperatorKind::Ne => ordering != Ordering::Equal,
            OperatorKind::Lt => ordering == Ordering::Less,
            OperatorKind::Le => ordering != Ordering::Greater,
            OperatorKind::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Value::Bool(result);
    }

    let (l, r) = match (left.coerce_number(), right.coerce_number()) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return Value::Error(e),
    };
    let result = match op {
        OperatorKind::Add => Ok(l + r),
        OperatorKind::Sub => Ok(l - r),
        OperatorKind::Mul => Ok(l * r),
        OperatorKind::Div if r == 0.0 => Err(ErrorKind::Div0),
        OperatorKind::Div => Ok(l / r),
        OperatorKind::Power => power(l, r),
        _ => Err(ErrorKind::Value),
    };
    match result {
        Ok(n) if n.is_finite() => Value::Number(n),
        Ok(_) => Value::Error(ErrorKind::Num),
        Err(e) => Value::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EvaluationContext;
    use crate::token::ArityKind;
    use gridcalc_core::{CellValue, Workbook};
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> Value {
        evaluate_formula(formula, &EvaluationContext::simple()).unwrap()
    }

    fn eval_in(wb: &Workbook, formula: &str) -> Value {
        evaluate_formula(formula, &EvaluationContext::new(Some(wb), 0, 9, 9)).unwrap()
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 10.0).unwrap();
        ws.set_cell_value("A2", 20.0).unwrap();
        ws.set_cell_value("A3", 30.0).unwrap();
        ws.set_cell_value("B1", "text").unwrap();
        ws.set_cell_value("B2", "5").unwrap();
        ws.set_cell_value("C1", CellValue::Error(ErrorKind::Div0)).unwrap();
        wb.add_worksheet_with_name("Data").unwrap();
        let data = wb.worksheet_mut(1).unwrap();
        data.set_cell_value("A1", 1.5).unwrap();
        data.set_cell_value("A2", 2.5).unwrap();
        wb.define_name("Prices", "=Sheet1!$A$1:$A$3").unwrap();
        wb.define_name("Doubled", "=SUM(Prices)*2").unwrap();
        wb.define_name("Loop", "=Loop+1").unwrap();
        wb
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("=2+3*4"), n(14.0));
        assert_eq!(eval("=(2+3)*4"), n(20.0));
        assert_eq!(eval("=2^3^2"), n(64.0));
        assert_eq!(eval("=-2^2"), n(4.0));
        assert_eq!(eval("=2^-2"), n(0.25));
        assert_eq!(eval("=2--2"), n(4.0));
        assert_eq!(eval("=50%"), n(0.5));
        assert_eq!(eval("=10-2-3"), n(5.0));
        assert_eq!(eval("=\"3\"+1"), n(4.0));
        assert_eq!(eval("=TRUE+1"), n(2.0));
    }

    #[test]
    fn test_error_values() {
        assert_eq!(eval("=1/0"), Value::Error(ErrorKind::Div0));
        assert_eq!(eval("=1/0+5"), Value::Error(ErrorKind::Div0));
        assert_eq!(eval("=\"a\"+1"), Value::Error(ErrorKind::Value));
        assert_eq!(eval("=0^0"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=0^-1"), Value::Error(ErrorKind::Div0));
        assert_eq!(eval("=ISERROR(1/0)"), Value::Bool(true));
        assert_eq!(eval("=SUM(1,#N/A)"), Value::Error(ErrorKind::Na));
        assert_eq!(eval("=IFERROR(1/0,\"none\")"), Value::Text("none".into()));
    }

    #[test]
    fn test_concat_and_comparison() {
        assert_eq!(eval("=\"a\"&1.5&TRUE"), Value::Text("a1.5TRUE".into()));
        assert_eq!(eval("=\"abc\"=\"ABC\""), Value::Bool(true));
        assert_eq!(eval("=1<\"a\""), Value::Bool(true));
        assert_eq!(eval("=\"z\"<TRUE"), Value::Bool(true));
        assert_eq!(eval("=1=\"1\""), Value::Bool(false));
        assert_eq!(eval("=2>=2"), Value::Bool(true));
        assert_eq!(eval("=1&2=\"12\""), Value::Bool(true));
    }

    #[test]
    fn test_cell_references() {
        let wb = sample();
        assert_eq!(eval_in(&wb, "=A1+A2"), n(30.0));
        assert_eq!(eval_in(&wb, "=SUM(A1:A3)"), n(60.0));
        assert_eq!(eval_in(&wb, "=B2*2"), n(10.0));
        assert_eq!(eval_in(&wb, "=B1+1"), Value::Error(ErrorKind::Value));
        assert_eq!(eval_in(&wb, "=C1"), Value::Error(ErrorKind::Div0));
        assert_eq!(eval_in(&wb, "=Z99"), n(0.0));
        assert_eq!(eval_in(&wb, "=Data!A1+Data!A2"), n(4.0));
        assert_eq!(eval_in(&wb, "=Missing!A1"), Value::Error(ErrorKind::Ref));
        assert_eq!(eval_in(&wb, "=SUM(Sheet1:Data!A1)"), n(11.5));
        assert_eq!(eval_in(&wb, "=SUM(Sheet1!A1:Sheet1!A3)"), n(60.0));
        assert_eq!(eval_in(&wb, "=SUM(Data!A1:data!A2)"), n(4.0));
    }

    #[test]
    fn test_complex_ranges() {
        let wb = sample();
        assert_eq!(eval_in(&wb, "=SUM((Data!A1:Data!A2,A1))"), n(14.0));
        assert_eq!(eval_in(&wb, "=SUM((A1,A3))"), n(40.0));
        assert_eq!(eval_in(&wb, "=SUM(A1:A3 A2:B3)"), n(50.0));
        assert_eq!(eval_in(&wb, "=SUM(A1:A2 C1:C2)"), Value::Error(ErrorKind::Null));
        assert_eq!(eval_in(&wb, "=SUM((A1:A2):A3)"), n(60.0));
    }

    #[test]
    fn test_implicit_intersection() {
        let wb = sample();
        let row2 = EvaluationContext::new(Some(&wb), 0, 1, 4);
        assert_eq!(evaluate_formula("=A1:A3*2", &row2).unwrap(), n(40.0));
        let outside = EvaluationContext::new(Some(&wb), 0, 7, 4);
        assert_eq!(
            evaluate_formula("=A1:A3*2", &outside).unwrap(),
            Value::Error(ErrorKind::Value)
        );
    }

    #[test]
    fn test_array_formulas() {
        let wb = sample();
        assert_eq!(
            eval_in(&wb, "{=A1:A3*2}"),
            Value::Array(vec![vec![n(20.0)], vec![n(40.0)], vec![n(60.0)]])
        );
        assert_eq!(eval_in(&wb, "{=SUM(A1:A3*A1:A3)}"), n(1400.0));
        assert_eq!(eval("={1,2}+{10;20}"), n(11.0));
        assert_eq!(
            eval("{={1,2}+{10;20}}"),
            Value::Array(vec![vec![n(11.0), n(12.0)], vec![n(21.0), n(22.0)]])
        );
        assert_eq!(
            eval("{={1,2,3}*{1,2}}"),
            Value::Array(vec![vec![n(1.0), n(4.0), Value::Error(ErrorKind::Na)]])
        );
    }

    #[test]
    fn test_defined_names() {
        let wb = sample();
        assert_eq!(eval_in(&wb, "=SUM(Prices)"), n(60.0));
        assert_eq!(eval_in(&wb, "=Doubled"), n(120.0));
        assert_eq!(eval_in(&wb, "=Unknown+1"), Value::Error(ErrorKind::Name));
        assert_eq!(eval_in(&wb, "=Loop"), Value::Error(ErrorKind::Ref));
    }

    #[test]
    fn test_function_dispatch() {
        assert_eq!(eval("=DEC2BIN(-1)"), Value::Text("1111111111".into()));
        assert_eq!(eval("=DEC2BIN(512)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=ROUND(2.5,)"), n(3.0));
        assert_eq!(eval("=ABS(1,2)"), Value::Error(ErrorKind::Value));
        assert_eq!(eval("=IF(FALSE,1/0,\"ok\")"), Value::Text("ok".into()));
    }

    #[test]
    fn test_empty_formula() {
        assert_eq!(eval("="), Value::Empty);
    }

    #[test]
    fn test_malformed_sequences() {
        let ctx = EvaluationContext::simple();
        let underflow = TokenSequence::new(vec![Token::Int(1), Token::Operator(OperatorKind::Add)]);
        assert_eq!(
            evaluate(&underflow, &ctx),
            Err(FormulaError::StackUnderflow { position: 1 })
        );
        let leftover = TokenSequence::new(vec![Token::Int(1), Token::Int(2)]);
        assert_eq!(
            evaluate(&leftover, &ctx),
            Err(FormulaError::UnbalancedStack { remaining: 2 })
        );
        let short_call = TokenSequence::new(vec![Token::Function(FunctionCall {
            id: FunctionId(4),
            arity: 1,
            kind: ArityKind::Variable,
        })]);
        assert!(matches!(
            evaluate(&short_call, &ctx),
            Err(FormulaError::StackUnderflow { .. })
        ));
        assert!(matches!(
            evaluate_formula("=SUM(", &ctx),
            Err(FormulaError::Parse(_))
        ));
    }
}
