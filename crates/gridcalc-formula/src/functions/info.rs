//! Information functions
//!
//! All of these see error arguments instead of having them propagated.

use super::args::scalar;
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("ISERROR", 3, 1, Some(1), fn_iserror).inspects_errors();
    r.builtin("ISERR", 126, 1, Some(1), fn_iserr).inspects_errors();
    r.builtin("ISNA", 2, 1, Some(1), fn_isna).inspects_errors();
    r.builtin("ISNUMBER", 128, 1, Some(1), fn_isnumber).inspects_errors();
    r.builtin("ISTEXT", 127, 1, Some(1), fn_istext).inspects_errors();
    r.builtin("ISNONTEXT", 190, 1, Some(1), fn_isnontext).inspects_errors();
    r.builtin("ISLOGICAL", 198, 1, Some(1), fn_islogical).inspects_errors();
    r.builtin("ISBLANK", 129, 1, Some(1), fn_isblank).inspects_errors();
    r.builtin("ISREF", 105, 1, Some(1), fn_isref).inspects_errors();
    r.builtin("NA", 10, 0, Some(0), fn_na).inspects_errors();
    r.builtin("ERROR.TYPE", 261, 1, Some(1), fn_error_type).inspects_errors();
    r.builtin("N", 131, 1, Some(1), fn_n).inspects_errors();
    r.builtin("T", 130, 1, Some(1), fn_t).inspects_errors();
}

fn test(
    args: &[Value],
    oracle: &dyn CellOracle,
    predicate: fn(&Value) -> bool,
) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(predicate(&scalar(&args[0], oracle))))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| matches!(v, Value::Error(_)))
}

/// ISERR(value): any error except `#N/A`
pub fn fn_iserr(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| {
        matches!(v, Value::Error(e) if *e != ErrorKind::Na)
    })
}

/// ISNA(value)
pub fn fn_isna(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| matches!(v, Value::Error(ErrorKind::Na)))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| matches!(v, Value::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| matches!(v, Value::Text(_)))
}

/// ISNONTEXT(value); blanks are non-text
pub fn fn_isnontext(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| !matches!(v, Value::Text(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| matches!(v, Value::Bool(_)))
}

/// ISBLANK(value): only an empty cell is blank, not an empty string
pub fn fn_isblank(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    test(args, oracle, |v| matches!(v, Value::Empty))
}

/// ISREF(value)
pub fn fn_isref(args: &[Value], _oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(matches!(args[0], Value::Reference(_))))
}

/// NA()
pub fn fn_na(_args: &[Value], _oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Err(ErrorKind::Na)
}

/// ERROR.TYPE(error_val): 1 for `#NULL!` through 7 for `#N/A`
pub fn fn_error_type(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match scalar(&args[0], oracle) {
        Value::Error(e) => Ok(Value::Number(e.error_type_number() as f64)),
        _ => Err(ErrorKind::Na),
    }
}

/// N(value)
pub fn fn_n(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match scalar(&args[0], oracle) {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::Bool(b) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
        Value::Error(e) => Err(e),
        _ => Ok(Value::Number(0.0)),
    }
}

/// T(value)
pub fn fn_t(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match scalar(&args[0], oracle) {
        Value::Text(s) => Ok(Value::Text(s)),
        Value::Error(e) => Err(e),
        _ => Ok(Value::Text(String::new())),
    }
}
