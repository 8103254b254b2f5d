//! Text functions

use super::args::{integer, opt_integer, scalar, text};
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::{parse_number_text, Value};
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("LEN", 32, 1, Some(1), fn_len);
    r.builtin("LEFT", 115, 1, Some(2), fn_left);
    r.builtin("RIGHT", 116, 1, Some(2), fn_right);
    r.builtin("MID", 31, 3, Some(3), fn_mid);
    r.builtin("UPPER", 113, 1, Some(1), fn_upper);
    r.builtin("LOWER", 112, 1, Some(1), fn_lower);
    r.builtin("TRIM", 118, 1, Some(1), fn_trim);
    r.builtin("REPT", 30, 2, Some(2), fn_rept);
    r.builtin("EXACT", 117, 2, Some(2), fn_exact);
    r.builtin("CONCATENATE", 336, 1, None, fn_concatenate);
    r.builtin("VALUE", 33, 1, Some(1), fn_value);
}

/// Longest string a cell holds
const MAX_TEXT_LEN: usize = 32767;

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    s.chars().skip(len.saturating_sub(n)).collect()
}

/// Character count argument; negative is `#VALUE!`
fn count_arg(args: &[Value], index: usize, oracle: &dyn CellOracle) -> Result<usize, ErrorKind> {
    let n = opt_integer(args, index, 1, oracle)?;
    usize::try_from(n).map_err(|_| ErrorKind::Value)
}

/// LEN(text)
pub fn fn_len(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Number(text(&args[0], oracle)?.chars().count() as f64))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = text(&args[0], oracle)?;
    Ok(Value::Text(take_left(&s, count_arg(args, 1, oracle)?)))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = text(&args[0], oracle)?;
    Ok(Value::Text(take_right(&s, count_arg(args, 1, oracle)?)))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = text(&args[0], oracle)?;
    let start = integer(&args[1], oracle)?;
    let count = integer(&args[2], oracle)?;
    if start < 1 || count < 0 {
        return Err(ErrorKind::Value);
    }
    Ok(Value::Text(
        s.chars()
            .skip(start as usize - 1)
            .take(count as usize)
            .collect(),
    ))
}

/// UPPER(text)
pub fn fn_upper(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Text(text(&args[0], oracle)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Text(text(&args[0], oracle)?.to_lowercase()))
}

/// TRIM(text): strips leading and trailing spaces and collapses inner runs to one
pub fn fn_trim(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = text(&args[0], oracle)?;
    Ok(Value::Text(
        s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "),
    ))
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = text(&args[0], oracle)?;
    let times = integer(&args[1], oracle)?;
    let times = usize::try_from(times).map_err(|_| ErrorKind::Value)?;
    if s.chars().count().saturating_mul(times) > MAX_TEXT_LEN {
        return Err(ErrorKind::Value);
    }
    Ok(Value::Text(s.repeat(times)))
}

/// EXACT(text1, text2): case-sensitive
pub fn fn_exact(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Bool(text(&args[0], oracle)? == text(&args[1], oracle)?))
}

/// CONCATENATE(text1, ...)
pub fn fn_concatenate(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&text(arg, oracle)?);
    }
    if out.chars().count() > MAX_TEXT_LEN {
        return Err(ErrorKind::Value);
    }
    Ok(Value::Text(out))
}

/// VALUE(text)
pub fn fn_value(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match scalar(&args[0], oracle) {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::Empty | Value::Missing => Ok(Value::Number(0.0)),
        Value::Text(s) => parse_number_text(&s)
            .map(Value::Number)
            .ok_or(ErrorKind::Value),
        Value::Error(e) => Err(e),
        _ => Err(ErrorKind::Value),
    }
}
