//! Math and trigonometry functions

use super::args::{flatten, integer, is_missing, matrix, number, numbers, opt_number, shape};
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use gridcalc_core::ErrorKind;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::f64::consts::PI;
use std::str::FromStr;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("SUM", 4, 1, None, fn_sum);
    r.builtin("PRODUCT", 183, 1, None, fn_product);
    r.builtin("SUMSQ", 321, 1, None, fn_sumsq);
    r.builtin("SUMPRODUCT", 228, 1, None, fn_sumproduct);
    r.builtin("ABS", 24, 1, Some(1), fn_abs);
    r.builtin("SIGN", 26, 1, Some(1), fn_sign);
    r.builtin("INT", 25, 1, Some(1), fn_int);
    r.builtin("TRUNC", 197, 1, Some(2), fn_trunc);
    r.builtin("ROUND", 27, 2, Some(2), fn_round);
    r.builtin("ROUNDUP", 212, 2, Some(2), fn_roundup);
    r.builtin("ROUNDDOWN", 213, 2, Some(2), fn_rounddown);
    r.builtin("CEILING", 288, 2, Some(2), fn_ceiling);
    r.builtin("FLOOR", 285, 2, Some(2), fn_floor);
    r.builtin("EVEN", 279, 1, Some(1), fn_even);
    r.builtin("ODD", 298, 1, Some(1), fn_odd);
    r.builtin("MOD", 39, 2, Some(2), fn_mod);
    r.builtin("SQRT", 20, 1, Some(1), fn_sqrt);
    r.builtin("POWER", 337, 2, Some(2), fn_power);
    r.builtin("EXP", 21, 1, Some(1), fn_exp);
    r.builtin("LN", 22, 1, Some(1), fn_ln);
    r.builtin("LOG", 109, 1, Some(2), fn_log);
    r.builtin("LOG10", 23, 1, Some(1), fn_log10);
    r.builtin("PI", 19, 0, Some(0), fn_pi);
    r.builtin("SIN", 15, 1, Some(1), fn_sin);
    r.builtin("COS", 16, 1, Some(1), fn_cos);
    r.builtin("TAN", 17, 1, Some(1), fn_tan);
    r.builtin("ASIN", 98, 1, Some(1), fn_asin);
    r.builtin("ACOS", 99, 1, Some(1), fn_acos);
    r.builtin("ATAN", 18, 1, Some(1), fn_atan);
    r.builtin("ATAN2", 97, 2, Some(2), fn_atan2);
    r.builtin("SINH", 229, 1, Some(1), fn_sinh);
    r.builtin("COSH", 230, 1, Some(1), fn_cosh);
    r.builtin("TANH", 231, 1, Some(1), fn_tanh);
    r.builtin("ASINH", 232, 1, Some(1), fn_asinh);
    r.builtin("ACOSH", 233, 1, Some(1), fn_acosh);
    r.builtin("ATANH", 234, 1, Some(1), fn_atanh);
    r.builtin("DEGREES", 343, 1, Some(1), fn_degrees);
    r.builtin("RADIANS", 342, 1, Some(1), fn_radians);
    r.builtin("FACT", 184, 1, Some(1), fn_fact);
    r.builtin("COMBIN", 276, 2, Some(2), fn_combin);
    r.builtin("RAND", 63, 0, Some(0), fn_rand).volatile();

    r.addin("MROUND", 2, Some(2), fn_mround);
    r.addin("QUOTIENT", 2, Some(2), fn_quotient);
    r.addin("GCD", 1, None, fn_gcd);
    r.addin("LCM", 1, None, fn_lcm);
    r.addin("SQRTPI", 1, Some(1), fn_sqrtpi);
    r.addin("FACTDOUBLE", 1, Some(1), fn_factdouble);
    r.addin("ISEVEN", 1, Some(1), fn_iseven);
    r.addin("ISODD", 1, Some(1), fn_isodd);
    r.addin("RANDBETWEEN", 2, Some(2), fn_randbetween).volatile();
}

/// Wrap a numeric result, mapping overflow and NaN to `#NUM!`
pub(crate) fn finite(n: f64) -> Result<Value, ErrorKind> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(ErrorKind::Num)
    }
}

fn unary(
    args: &[Value],
    oracle: &dyn CellOracle,
    f: impl Fn(f64) -> Result<f64, ErrorKind>,
) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    finite(f(x)?)
}

/// `^` and POWER
pub(crate) fn power(base: f64, exponent: f64) -> Result<f64, ErrorKind> {
    if base == 0.0 {
        if exponent == 0.0 {
            return Err(ErrorKind::Num);
        }
        if exponent < 0.0 {
            return Err(ErrorKind::Div0);
        }
    }
    let result = base.powf(exponent);
    if result.is_finite() {
        Ok(result)
    } else {
        Err(ErrorKind::Num)
    }
}

/// Round to `digits` decimal places in decimal arithmetic
///
/// Negative `digits` round to the left of the decimal point.
pub(crate) fn round_to(x: f64, digits: i64, strategy: RoundingStrategy) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    round_decimal(x, digits, strategy).unwrap_or_else(|| round_binary(x, digits, strategy))
}

fn round_decimal(x: f64, digits: i64, strategy: RoundingStrategy) -> Option<f64> {
    // Shortest round-trip text keeps 2.675 as 2.675 rather than 2.67499999...
    let d = Decimal::from_str(&x.to_string()).ok()?;
    let rounded = if digits >= 0 {
        d.round_dp_with_strategy(digits.min(28) as u32, strategy)
    } else {
        let k = u32::try_from(-digits).ok().filter(|k| *k <= 27)?;
        let scale = Decimal::from_i128_with_scale(10i128.pow(k), 0);
        d.checked_div(scale)?
            .round_dp_with_strategy(0, strategy)
            .checked_mul(scale)?
    };
    rounded.to_f64()
}

fn round_binary(x: f64, digits: i64, strategy: RoundingStrategy) -> f64 {
    let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
    let y = x * factor;
    let r = match strategy {
        RoundingStrategy::AwayFromZero => y.abs().ceil().copysign(y),
        RoundingStrategy::ToZero => y.trunc(),
        _ => y.round(),
    };
    r / factor
}

/// Snap a quotient that is within float noise of an integer
fn snap(q: f64) -> f64 {
    if (q - q.round()).abs() < 1e-12 {
        q.round()
    } else {
        q
    }
}

/// SUM function
pub fn fn_sum(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    finite(numbers(args, oracle)?.iter().sum())
}

/// PRODUCT function
pub fn fn_product(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() {
        return Ok(Value::Number(0.0));
    }
    finite(values.iter().product())
}

/// SUMSQ function
pub fn fn_sumsq(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    finite(numbers(args, oracle)?.iter().map(|n| n * n).sum())
}

/// SUMPRODUCT function
///
/// Every argument must have the same shape; non-numeric entries count as zero.
pub fn fn_sumproduct(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let grids = args
        .iter()
        .map(|a| matrix(a, oracle))
        .collect::<Result<Vec<_>, _>>()?;
    let dims = shape(&grids[0]);
    if grids.iter().any(|g| shape(g) != dims) {
        return Err(ErrorKind::Value);
    }

    let mut total = 0.0;
    for row in 0..dims.0 {
        for col in 0..dims.1 {
            let mut product = 1.0;
            for grid in &grids {
                match &grid[row][col] {
                    Value::Number(n) => product *= n,
                    Value::Error(e) => return Err(*e),
                    _ => product = 0.0,
                }
            }
            total += product;
        }
    }
    finite(total)
}

/// ABS function
pub fn fn_abs(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.abs()))
}

/// SIGN function
pub fn fn_sign(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        Ok(if x > 0.0 {
            1.0
        } else if x < 0.0 {
            -1.0
        } else {
            0.0
        })
    })
}

/// INT function (rounds toward negative infinity)
pub fn fn_int(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.floor()))
}

/// TRUNC function
pub fn fn_trunc(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let digits = opt_number(args, 1, 0.0, oracle)?.trunc() as i64;
    finite(round_to(x, digits, RoundingStrategy::ToZero))
}

fn rounding(
    args: &[Value],
    oracle: &dyn CellOracle,
    strategy: RoundingStrategy,
) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let digits = number(&args[1], oracle)?.trunc() as i64;
    finite(round_to(x, digits, strategy))
}

/// ROUND function (half away from zero)
pub fn fn_round(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    rounding(args, oracle, RoundingStrategy::MidpointAwayFromZero)
}

/// ROUNDUP function (away from zero)
pub fn fn_roundup(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    rounding(args, oracle, RoundingStrategy::AwayFromZero)
}

/// ROUNDDOWN function (toward zero)
pub fn fn_rounddown(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    rounding(args, oracle, RoundingStrategy::ToZero)
}

/// MROUND function
pub fn fn_mround(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let multiple = number(&args[1], oracle)?;
    if multiple == 0.0 || x == 0.0 {
        return Ok(Value::Number(0.0));
    }
    if x.signum() != multiple.signum() {
        return Err(ErrorKind::Num);
    }
    let q = round_to(snap(x / multiple), 0, RoundingStrategy::MidpointAwayFromZero);
    finite(q * multiple)
}

/// CEILING function
pub fn fn_ceiling(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let significance = number(&args[1], oracle)?;
    if significance == 0.0 || x == 0.0 {
        return Ok(Value::Number(0.0));
    }
    if x > 0.0 && significance < 0.0 {
        return Err(ErrorKind::Num);
    }
    finite(snap(x / significance).ceil() * significance)
}

/// FLOOR function
pub fn fn_floor(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let significance = number(&args[1], oracle)?;
    if significance == 0.0 {
        return if x == 0.0 {
            Ok(Value::Number(0.0))
        } else {
            Err(ErrorKind::Div0)
        };
    }
    if x > 0.0 && significance < 0.0 {
        return Err(ErrorKind::Num);
    }
    finite(snap(x / significance).floor() * significance)
}

/// EVEN function
pub fn fn_even(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        let up = (x.abs() / 2.0).ceil() * 2.0;
        Ok(up.copysign(x))
    })
}

/// ODD function
pub fn fn_odd(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        let up = x.abs().ceil();
        let odd = if up % 2.0 == 0.0 { up + 1.0 } else { up };
        Ok(if x < 0.0 { -odd } else { odd })
    })
}

/// MOD function; the result takes the divisor's sign
pub fn fn_mod(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?;
    let d = number(&args[1], oracle)?;
    if d == 0.0 {
        return Err(ErrorKind::Div0);
    }
    finite(n - d * (n / d).floor())
}

/// QUOTIENT function
pub fn fn_quotient(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?;
    let d = number(&args[1], oracle)?;
    if d == 0.0 {
        return Err(ErrorKind::Div0);
    }
    finite((n / d).trunc())
}

fn whole_numbers(args: &[Value], oracle: &dyn CellOracle) -> Result<Vec<u64>, ErrorKind> {
    let mut out = Vec::new();
    for arg in args {
        for v in flatten(arg, oracle) {
            let n = match v {
                Value::Empty | Value::Missing => continue,
                other => other.coerce_number()?,
            };
            if n < 0.0 || n >= 2f64.powi(53) {
                return Err(ErrorKind::Num);
            }
            out.push(n.trunc() as u64);
        }
    }
    Ok(out)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// GCD function
pub fn fn_gcd(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let result = whole_numbers(args, oracle)?.into_iter().fold(0, gcd);
    Ok(Value::Number(result as f64))
}

/// LCM function
pub fn fn_lcm(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mut result: f64 = 1.0;
    for n in whole_numbers(args, oracle)? {
        if n == 0 {
            return Ok(Value::Number(0.0));
        }
        let current = result as u64;
        result = (current / gcd(current, n)) as f64 * n as f64;
        if result >= 2f64.powi(53) {
            return Err(ErrorKind::Num);
        }
    }
    Ok(Value::Number(result))
}

/// SQRT function
pub fn fn_sqrt(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        if x < 0.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(x.sqrt())
        }
    })
}

/// SQRTPI function
pub fn fn_sqrtpi(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        if x < 0.0 {
            Err(ErrorKind::Num)
        } else {
            Ok((x * PI).sqrt())
        }
    })
}

/// POWER function
pub fn fn_power(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let base = number(&args[0], oracle)?;
    let exponent = number(&args[1], oracle)?;
    power(base, exponent).map(Value::Number)
}

/// EXP function
pub fn fn_exp(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.exp()))
}

fn positive(x: f64) -> Result<f64, ErrorKind> {
    if x <= 0.0 {
        Err(ErrorKind::Num)
    } else {
        Ok(x)
    }
}

/// LN function
pub fn fn_ln(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(positive(x)?.ln()))
}

/// LOG10 function
pub fn fn_log10(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(positive(x)?.log10()))
}

/// LOG function; base defaults to 10
pub fn fn_log(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = positive(number(&args[0], oracle)?)?;
    let base = positive(opt_number(args, 1, 10.0, oracle)?)?;
    if base == 1.0 {
        return Err(ErrorKind::Div0);
    }
    if base == 10.0 {
        return finite(x.log10());
    }
    finite(x.ln() / base.ln())
}

/// PI function
pub fn fn_pi(_args: &[Value], _oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Number(PI))
}

pub fn fn_sin(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.sin()))
}

pub fn fn_cos(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.cos()))
}

pub fn fn_tan(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.tan()))
}

pub fn fn_asin(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        if x.abs() > 1.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(x.asin())
        }
    })
}

pub fn fn_acos(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        if x.abs() > 1.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(x.acos())
        }
    })
}

pub fn fn_atan(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.atan()))
}

/// ATAN2(x, y): angle of the point (x, y)
pub fn fn_atan2(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let y = number(&args[1], oracle)?;
    if x == 0.0 && y == 0.0 {
        return Err(ErrorKind::Div0);
    }
    finite(y.atan2(x))
}

pub fn fn_sinh(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.sinh()))
}

pub fn fn_cosh(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.cosh()))
}

pub fn fn_tanh(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.tanh()))
}

pub fn fn_asinh(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.asinh()))
}

pub fn fn_acosh(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        if x < 1.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(x.acosh())
        }
    })
}

pub fn fn_atanh(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| {
        if x.abs() >= 1.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(x.atanh())
        }
    })
}

pub fn fn_degrees(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.to_degrees()))
}

pub fn fn_radians(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    unary(args, oracle, |x| Ok(x.to_radians()))
}

/// FACT function
pub fn fn_fact(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?.trunc();
    if !(0.0..=170.0).contains(&n) {
        return Err(ErrorKind::Num);
    }
    finite((1..=n as u64).fold(1.0, |acc, k| acc * k as f64))
}

/// FACTDOUBLE function
pub fn fn_factdouble(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?.trunc();
    // 301!! and above overflow
    if !(-1.0..=300.0).contains(&n) {
        return Err(ErrorKind::Num);
    }
    let mut acc = 1.0;
    let mut k = n;
    while k > 1.0 {
        acc *= k;
        k -= 2.0;
    }
    finite(acc)
}

/// COMBIN function
pub fn fn_combin(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?.trunc();
    let k = number(&args[1], oracle)?.trunc();
    if n < 0.0 || k < 0.0 || k > n {
        return Err(ErrorKind::Num);
    }
    let k = k.min(n - k);
    // C(2k, k) alone overflows past this
    if k > 1030.0 {
        return Err(ErrorKind::Num);
    }
    let mut result = 1.0;
    let mut i = 1.0;
    while i <= k {
        result = result * (n - k + i) / i;
        if !result.is_finite() {
            return Err(ErrorKind::Num);
        }
        i += 1.0;
    }
    finite(result.round())
}

fn parity(args: &[Value], oracle: &dyn CellOracle) -> Result<bool, ErrorKind> {
    let n = integer(&args[0], oracle)?;
    Ok(n % 2 == 0)
}

/// ISEVEN function
pub fn fn_iseven(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    parity(args, oracle).map(Value::Bool)
}

/// ISODD function
pub fn fn_isodd(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    parity(args, oracle).map(|even| Value::Bool(!even))
}

/// RAND function (volatile)
pub fn fn_rand(_args: &[Value], _oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Number(rand::thread_rng().gen::<f64>()))
}

/// RANDBETWEEN function (volatile)
pub fn fn_randbetween(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    if is_missing(args, 0) || is_missing(args, 1) {
        return Err(ErrorKind::Value);
    }
    let low = number(&args[0], oracle)?.ceil();
    let high = number(&args[1], oracle)?.floor();
    if low > high {
        return Err(ErrorKind::Num);
    }
    let n = rand::thread_rng().gen_range(low as i64..=high as i64);
    Ok(Value::Number(n as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EvaluationContext;

    fn call(f: super::super::FunctionImpl, args: &[f64]) -> Result<Value, ErrorKind> {
        let args: Vec<Value> = args.iter().map(|&n| Value::Number(n)).collect();
        f(&args, &EvaluationContext::simple())
    }

    fn num(f: super::super::FunctionImpl, args: &[f64]) -> f64 {
        match call(f, args) {
            Ok(Value::Number(n)) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(num(fn_round, &[2.675, 2.0]), 2.68);
        assert_eq!(num(fn_round, &[2.5, 0.0]), 3.0);
        assert_eq!(num(fn_round, &[-2.5, 0.0]), -3.0);
        assert_eq!(num(fn_round, &[1234.5678, -2.0]), 1200.0);
        assert_eq!(num(fn_round, &[0.285, 2.0]), 0.29);
    }

    #[test]
    fn test_roundup_rounddown_trunc() {
        assert_eq!(num(fn_roundup, &[3.14159, 3.0]), 3.142);
        assert_eq!(num(fn_roundup, &[-3.14159, 1.0]), -3.2);
        assert_eq!(num(fn_rounddown, &[-3.14159, 1.0]), -3.1);
        assert_eq!(num(fn_rounddown, &[31415.92654, -2.0]), 31400.0);
        assert_eq!(num(fn_trunc, &[8.9]), 8.0);
        assert_eq!(num(fn_trunc, &[-8.9]), -8.0);
        assert_eq!(num(fn_int, &[-8.9]), -9.0);
    }

    #[test]
    fn test_ceiling_floor_mround() {
        assert_eq!(num(fn_ceiling, &[2.5, 1.0]), 3.0);
        assert_eq!(num(fn_ceiling, &[-2.5, -2.0]), -4.0);
        assert_eq!(num(fn_ceiling, &[-2.5, 2.0]), -2.0);
        assert_eq!(call(fn_ceiling, &[2.5, -2.0]), Err(ErrorKind::Num));
        assert_eq!(num(fn_floor, &[3.7, 2.0]), 2.0);
        assert_eq!(num(fn_floor, &[-2.5, -2.0]), -2.0);
        assert_eq!(call(fn_floor, &[3.0, 0.0]), Err(ErrorKind::Div0));
        assert_eq!(num(fn_mround, &[10.0, 3.0]), 9.0);
        assert_eq!(num(fn_mround, &[-10.0, -3.0]), -9.0);
        assert_eq!(call(fn_mround, &[5.0, -2.0]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_even_odd_mod() {
        assert_eq!(num(fn_even, &[1.5]), 2.0);
        assert_eq!(num(fn_even, &[-1.0]), -2.0);
        assert_eq!(num(fn_odd, &[1.5]), 3.0);
        assert_eq!(num(fn_odd, &[0.0]), 1.0);
        assert_eq!(num(fn_odd, &[-2.0]), -3.0);
        assert_eq!(num(fn_mod, &[3.0, 2.0]), 1.0);
        assert_eq!(num(fn_mod, &[-3.0, 2.0]), 1.0);
        assert_eq!(num(fn_mod, &[3.0, -2.0]), -1.0);
        assert_eq!(call(fn_mod, &[1.0, 0.0]), Err(ErrorKind::Div0));
        assert_eq!(num(fn_quotient, &[-10.0, 3.0]), -3.0);
    }

    #[test]
    fn test_power_edges() {
        assert_eq!(power(2.0, 10.0), Ok(1024.0));
        assert_eq!(power(0.0, 0.0), Err(ErrorKind::Num));
        assert_eq!(power(0.0, -1.0), Err(ErrorKind::Div0));
        assert_eq!(power(-8.0, 0.5), Err(ErrorKind::Num));
        assert_eq!(power(10.0, 400.0), Err(ErrorKind::Num));
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(call(fn_sqrt, &[-1.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_ln, &[0.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_log, &[8.0, 1.0]), Err(ErrorKind::Div0));
        assert!((num(fn_log, &[8.0, 2.0]) - 3.0).abs() < 1e-12);
        assert_eq!(num(fn_log, &[100.0]), 2.0);
        assert_eq!(call(fn_asin, &[2.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_atan2, &[0.0, 0.0]), Err(ErrorKind::Div0));
        assert_eq!(call(fn_fact, &[-1.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_fact, &[171.0]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_huge_integer_arguments() {
        assert!(num(fn_fact, &[170.0]).is_finite());
        assert_eq!(call(fn_fact, &[1e15]), Err(ErrorKind::Num));
        assert!(num(fn_factdouble, &[300.0]).is_finite());
        assert_eq!(call(fn_factdouble, &[301.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_factdouble, &[1e20]), Err(ErrorKind::Num));
        let pairs = num(fn_combin, &[1e20, 2.0]);
        assert!((pairs / 5e39 - 1.0).abs() < 1e-12);
        assert_eq!(num(fn_combin, &[1e20, 1e20]), 1.0);
        assert_eq!(call(fn_combin, &[2000.0, 1000.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_combin, &[1e20, 1e19]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_integer_functions() {
        assert_eq!(num(fn_fact, &[5.9]), 120.0);
        assert_eq!(num(fn_factdouble, &[7.0]), 105.0);
        assert_eq!(num(fn_factdouble, &[-1.0]), 1.0);
        assert_eq!(num(fn_combin, &[8.0, 2.0]), 28.0);
        assert_eq!(call(fn_combin, &[2.0, 3.0]), Err(ErrorKind::Num));
        assert_eq!(num(fn_gcd, &[24.0, 36.0]), 12.0);
        assert_eq!(num(fn_lcm, &[4.0, 6.0]), 12.0);
        assert_eq!(call(fn_gcd, &[-1.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_iseven, &[-2.5]), Ok(Value::Bool(true)));
        assert_eq!(call(fn_isodd, &[3.0]), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(num(fn_sum, &[1.0, 2.0, 3.5]), 6.5);
        assert_eq!(num(fn_product, &[2.0, 3.0, 4.0]), 24.0);
        assert_eq!(num(fn_sumsq, &[3.0, 4.0]), 25.0);
        let ctx = EvaluationContext::simple();
        let a = Value::Array(vec![vec![Value::Number(1.0), Value::Number(2.0)]]);
        let b = Value::Array(vec![vec![Value::Number(3.0), Value::from("x")]]);
        assert_eq!(fn_sumproduct(&[a.clone(), a.clone()], &ctx), Ok(Value::Number(5.0)));
        assert_eq!(fn_sumproduct(&[a.clone(), b], &ctx), Ok(Value::Number(3.0)));
        let c = Value::Array(vec![vec![Value::Number(1.0)]]);
        assert_eq!(fn_sumproduct(&[a, c], &ctx), Err(ErrorKind::Value));
    }

    #[test]
    fn test_random() {
        for _ in 0..20 {
            let r = num(fn_rand, &[]);
            assert!((0.0..1.0).contains(&r));
            let n = num(fn_randbetween, &[1.2, 3.0]);
            assert!([2.0, 3.0].contains(&n));
        }
        assert_eq!(call(fn_randbetween, &[5.0, 1.0]), Err(ErrorKind::Num));
    }
}
