//! Logical functions

use super::args::{boolean, flatten, integer, scalar};
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("IF", 1, 2, Some(3), fn_if).inspects_errors();
    r.builtin("CHOOSE", 100, 2, None, fn_choose).inspects_errors();
    r.builtin("AND", 36, 1, None, fn_and);
    r.builtin("OR", 37, 1, None, fn_or);
    r.builtin("NOT", 38, 1, Some(1), fn_not);
    r.builtin("TRUE", 34, 0, Some(0), fn_true);
    r.builtin("FALSE", 35, 0, Some(0), fn_false);
    r.builtin("IFERROR", 480, 2, Some(2), fn_iferror).inspects_errors();

    r.addin("XOR", 1, None, fn_xor);
}

/// IF(condition, value_if_true, [value_if_false])
///
/// Only the chosen branch's error surfaces.
pub fn fn_if(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let condition = boolean(&args[0], oracle)?;
    let branch = if condition {
        &args[1]
    } else if args.len() < 3 {
        return Ok(Value::Bool(false));
    } else {
        &args[2]
    };
    Ok(match branch {
        Value::Missing => Value::Number(0.0),
        v => v.clone(),
    })
}

/// CHOOSE(index, value1, ...)
pub fn fn_choose(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let index = integer(&args[0], oracle)?;
    if index < 1 || index as usize >= args.len() {
        return Err(ErrorKind::Value);
    }
    match &args[index as usize] {
        Value::Error(e) => Err(*e),
        Value::Missing => Ok(Value::Number(0.0)),
        v => Ok(v.clone()),
    }
}

/// The logical values among the arguments
///
/// Inside ranges only booleans and numbers count; a direct text argument
/// must read as TRUE or FALSE. No logical value at all is `#VALUE!`.
fn logicals(args: &[Value], oracle: &dyn CellOracle) -> Result<Vec<bool>, ErrorKind> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Reference(_) | Value::Array(_) => {
                for v in flatten(arg, oracle) {
                    match v {
                        Value::Bool(b) => out.push(b),
                        Value::Number(n) => out.push(n != 0.0),
                        Value::Error(e) => return Err(e),
                        _ => {}
                    }
                }
            }
            Value::Missing => {}
            v => out.push(v.coerce_bool()?),
        }
    }
    if out.is_empty() {
        return Err(ErrorKind::Value);
    }
    Ok(out)
}

/// AND(logical1, ...)
pub fn fn_and(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(logicals(args, oracle)?.iter().all(|b| *b)))
}

/// OR(logical1, ...)
pub fn fn_or(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(logicals(args, oracle)?.iter().any(|b| *b)))
}

/// XOR(logical1, ...): true when an odd number of arguments are true
pub fn fn_xor(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let count = logicals(args, oracle)?.iter().filter(|b| **b).count();
    Ok(Value::Bool(count % 2 == 1))
}

/// NOT(logical)
pub fn fn_not(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(!boolean(&args[0], oracle)?))
}

/// TRUE()
pub fn fn_true(_args: &[Value], _oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(true))
}

/// FALSE()
pub fn fn_false(_args: &[Value], _oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(false))
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let chosen = if scalar(&args[0], oracle).is_error() {
        &args[1]
    } else {
        &args[0]
    };
    if matches!(chosen, Value::Missing) {
        return Ok(Value::Number(0.0));
    }
    Ok(chosen.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EvaluationContext;

    fn call(f: super::super::FunctionImpl, args: &[Value]) -> Result<Value, ErrorKind> {
        f(args, &EvaluationContext::simple())
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_if_branches() {
        assert_eq!(call(fn_if, &[Value::Bool(true), n(1.0), n(2.0)]), Ok(n(1.0)));
        assert_eq!(call(fn_if, &[n(0.0), n(1.0), n(2.0)]), Ok(n(2.0)));
        assert_eq!(call(fn_if, &[n(0.0), n(1.0)]), Ok(Value::Bool(false)));
        assert_eq!(call(fn_if, &[n(0.0), n(1.0), Value::Missing]), Ok(n(0.0)));
        assert_eq!(
            call(fn_if, &[Value::Bool(true), n(1.0), Value::Error(ErrorKind::Div0)]),
            Ok(n(1.0))
        );
        assert_eq!(
            call(fn_if, &[Value::Error(ErrorKind::Na), n(1.0), n(2.0)]),
            Err(ErrorKind::Na)
        );
        assert_eq!(
            call(fn_if, &[Value::Text("maybe".into()), n(1.0)]),
            Err(ErrorKind::Value)
        );
    }

    #[test]
    fn test_and_or_xor() {
        assert_eq!(call(fn_and, &[Value::Bool(true), n(1.0)]), Ok(Value::Bool(true)));
        assert_eq!(call(fn_and, &[Value::Bool(true), n(0.0)]), Ok(Value::Bool(false)));
        assert_eq!(call(fn_or, &[Value::Bool(false), n(0.0)]), Ok(Value::Bool(false)));
        assert_eq!(call(fn_or, &[Value::Text("TRUE".into())]), Ok(Value::Bool(true)));
        assert_eq!(call(fn_or, &[Value::Text("x".into())]), Err(ErrorKind::Value));
        assert_eq!(
            call(fn_xor, &[Value::Bool(true), Value::Bool(true), Value::Bool(true)]),
            Ok(Value::Bool(true))
        );
        let array = Value::Array(vec![vec![Value::Text("a".into()), Value::Bool(true)]]);
        assert_eq!(call(fn_and, &[array]), Ok(Value::Bool(true)));
        let only_text = Value::Array(vec![vec![Value::Text("a".into())]]);
        assert_eq!(call(fn_and, &[only_text]), Err(ErrorKind::Value));
    }

    #[test]
    fn test_not_and_constants() {
        assert_eq!(call(fn_not, &[n(0.0)]), Ok(Value::Bool(true)));
        assert_eq!(call(fn_true, &[]), Ok(Value::Bool(true)));
        assert_eq!(call(fn_false, &[]), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_iferror_and_choose() {
        assert_eq!(
            call(fn_iferror, &[Value::Error(ErrorKind::Div0), n(0.0)]),
            Ok(n(0.0))
        );
        assert_eq!(call(fn_iferror, &[n(5.0), n(0.0)]), Ok(n(5.0)));
        assert_eq!(call(fn_choose, &[n(2.0), n(10.0), n(20.0)]), Ok(n(20.0)));
        assert_eq!(call(fn_choose, &[n(3.0), n(10.0), n(20.0)]), Err(ErrorKind::Value));
        assert_eq!(
            call(fn_choose, &[n(1.0), n(10.0), Value::Error(ErrorKind::Num)]),
            Ok(n(10.0))
        );
    }
}
