//! Radix conversion, bitwise and comparison functions
//!
//! The BIN/OCT/HEX conversions use fixed-width two's complement: 10 bits for
//! binary, 30 for octal, 40 for hex, always written in at most 10 digits.
//! A 10-digit input is read as signed; shorter inputs are positive.

use super::args::{is_missing, number, opt_number, scalar};
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.addin("BIN2DEC", 1, Some(1), fn_bin2dec);
    r.addin("BIN2OCT", 1, Some(2), fn_bin2oct);
    r.addin("BIN2HEX", 1, Some(2), fn_bin2hex);
    r.addin("OCT2BIN", 1, Some(2), fn_oct2bin);
    r.addin("OCT2DEC", 1, Some(1), fn_oct2dec);
    r.addin("OCT2HEX", 1, Some(2), fn_oct2hex);
    r.addin("HEX2BIN", 1, Some(2), fn_hex2bin);
    r.addin("HEX2OCT", 1, Some(2), fn_hex2oct);
    r.addin("HEX2DEC", 1, Some(1), fn_hex2dec);
    r.addin("DEC2BIN", 1, Some(2), fn_dec2bin);
    r.addin("DEC2OCT", 1, Some(2), fn_dec2oct);
    r.addin("DEC2HEX", 1, Some(2), fn_dec2hex);

    r.addin("BITAND", 2, Some(2), fn_bitand);
    r.addin("BITOR", 2, Some(2), fn_bitor);
    r.addin("BITXOR", 2, Some(2), fn_bitxor);
    r.addin("BITLSHIFT", 2, Some(2), fn_bitlshift);
    r.addin("BITRSHIFT", 2, Some(2), fn_bitrshift);

    r.addin("DELTA", 1, Some(2), fn_delta);
    r.addin("GESTEP", 1, Some(2), fn_gestep);
}

/// Digit limit shared by every fixed radix
const MAX_DIGITS: usize = 10;

/// Operands of the BIT functions are below 2^48
const BIT_LIMIT: u64 = 1 << 48;

/// A fixed-width radix field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Bin,
    Oct,
    Hex,
}

impl Radix {
    pub const fn base(self) -> u32 {
        match self {
            Radix::Bin => 2,
            Radix::Oct => 8,
            Radix::Hex => 16,
        }
    }

    /// Width of the two's complement field
    pub const fn bits(self) -> u32 {
        match self {
            Radix::Bin => 10,
            Radix::Oct => 30,
            Radix::Hex => 40,
        }
    }

    const fn min(self) -> i64 {
        -(1i64 << (self.bits() - 1))
    }

    const fn max(self) -> i64 {
        (1i64 << (self.bits() - 1)) - 1
    }

    /// Read a field; ten digits with the top bit set are negative
    pub fn decode(self, digits: &str) -> Result<i64, ErrorKind> {
        let digits = digits.trim();
        if digits.len() > MAX_DIGITS {
            return Err(ErrorKind::Num);
        }
        if digits.is_empty() {
            return Ok(0);
        }
        let unsigned = u64::from_str_radix(digits, self.base()).map_err(|_| ErrorKind::Num)?;
        let sign_bit = 1u64 << (self.bits() - 1);
        if digits.len() == MAX_DIGITS && unsigned & sign_bit != 0 {
            Ok(unsigned as i64 - (1i64 << self.bits()))
        } else if unsigned & !((1u64 << self.bits()) - 1) != 0 {
            Err(ErrorKind::Num)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Write a value; negatives fill all ten digits and ignore `places`
    pub fn encode(self, value: i64, places: Option<i64>) -> Result<String, ErrorKind> {
        if value < self.min() || value > self.max() {
            return Err(ErrorKind::Num);
        }
        if value < 0 {
            let unsigned = (value + (1i64 << self.bits())) as u64;
            let text = self.digits(unsigned);
            return Ok(format!("{:0>width$}", text, width = MAX_DIGITS));
        }

        let text = self.digits(value as u64);
        match places {
            None => Ok(text),
            Some(p) if p < 1 || p as usize > MAX_DIGITS || text.len() > p as usize => {
                Err(ErrorKind::Num)
            }
            Some(p) => Ok(format!("{:0>width$}", text, width = p as usize)),
        }
    }

    fn digits(self, n: u64) -> String {
        match self {
            Radix::Bin => format!("{:b}", n),
            Radix::Oct => format!("{:o}", n),
            Radix::Hex => format!("{:X}", n),
        }
    }
}

/// The digit string argument; numbers are read as their decimal text
fn field_arg(value: &Value, oracle: &dyn CellOracle) -> Result<String, ErrorKind> {
    match scalar(value, oracle) {
        Value::Bool(_) => Err(ErrorKind::Value),
        Value::Error(e) => Err(e),
        Value::Number(n) if n < 0.0 || n.fract() != 0.0 => Err(ErrorKind::Num),
        v => v.coerce_text(),
    }
}

fn places_arg(args: &[Value], oracle: &dyn CellOracle) -> Result<Option<i64>, ErrorKind> {
    if is_missing(args, 1) {
        return Ok(None);
    }
    let p = number(&args[1], oracle)?;
    if p < 0.0 {
        return Err(ErrorKind::Num);
    }
    Ok(Some(p.trunc() as i64))
}

fn to_decimal(args: &[Value], oracle: &dyn CellOracle, from: Radix) -> Result<Value, ErrorKind> {
    let value = from.decode(&field_arg(&args[0], oracle)?)?;
    Ok(Value::Number(value as f64))
}

fn convert(
    args: &[Value],
    oracle: &dyn CellOracle,
    from: Radix,
    to: Radix,
) -> Result<Value, ErrorKind> {
    let value = from.decode(&field_arg(&args[0], oracle)?)?;
    to.encode(value, places_arg(args, oracle)?).map(Value::Text)
}

fn from_decimal(args: &[Value], oracle: &dyn CellOracle, to: Radix) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?.trunc();
    if n < to.min() as f64 || n > to.max() as f64 {
        return Err(ErrorKind::Num);
    }
    to.encode(n as i64, places_arg(args, oracle)?).map(Value::Text)
}

pub fn fn_bin2dec(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    to_decimal(args, oracle, Radix::Bin)
}

pub fn fn_oct2dec(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    to_decimal(args, oracle, Radix::Oct)
}

pub fn fn_hex2dec(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    to_decimal(args, oracle, Radix::Hex)
}

pub fn fn_bin2oct(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    convert(args, oracle, Radix::Bin, Radix::Oct)
}

pub fn fn_bin2hex(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    convert(args, oracle, Radix::Bin, Radix::Hex)
}

pub fn fn_oct2bin(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    convert(args, oracle, Radix::Oct, Radix::Bin)
}

pub fn fn_oct2hex(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    convert(args, oracle, Radix::Oct, Radix::Hex)
}

pub fn fn_hex2bin(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    convert(args, oracle, Radix::Hex, Radix::Bin)
}

pub fn fn_hex2oct(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    convert(args, oracle, Radix::Hex, Radix::Oct)
}

pub fn fn_dec2bin(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    from_decimal(args, oracle, Radix::Bin)
}

pub fn fn_dec2oct(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    from_decimal(args, oracle, Radix::Oct)
}

pub fn fn_dec2hex(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    from_decimal(args, oracle, Radix::Hex)
}

/// A BIT operand: a whole number in 0..2^48
fn bit_operand(value: &Value, oracle: &dyn CellOracle) -> Result<u64, ErrorKind> {
    let n = number(value, oracle)?;
    if n < 0.0 || n.fract() != 0.0 || n >= BIT_LIMIT as f64 {
        return Err(ErrorKind::Num);
    }
    Ok(n as u64)
}

fn bitwise(
    args: &[Value],
    oracle: &dyn CellOracle,
    op: fn(u64, u64) -> u64,
) -> Result<Value, ErrorKind> {
    let a = bit_operand(&args[0], oracle)?;
    let b = bit_operand(&args[1], oracle)?;
    Ok(Value::Number(op(a, b) as f64))
}

pub fn fn_bitand(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    bitwise(args, oracle, |a, b| a & b)
}

pub fn fn_bitor(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    bitwise(args, oracle, |a, b| a | b)
}

pub fn fn_bitxor(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    bitwise(args, oracle, |a, b| a ^ b)
}

/// Shift left by `amount`, right when negative; shifts beyond 53 places are `#NUM!`
fn shift(value: u64, amount: i64) -> Result<u64, ErrorKind> {
    if amount.abs() > 53 {
        return Err(ErrorKind::Num);
    }
    let shifted = if amount >= 0 {
        (value as u128) << amount
    } else {
        (value as u128) >> (-amount)
    };
    if shifted >= BIT_LIMIT as u128 {
        return Err(ErrorKind::Num);
    }
    Ok(shifted as u64)
}

fn shift_amount(value: &Value, oracle: &dyn CellOracle) -> Result<i64, ErrorKind> {
    let n = number(value, oracle)?.trunc();
    if !n.is_finite() || n.abs() > 53.0 {
        return Err(ErrorKind::Num);
    }
    Ok(n as i64)
}

pub fn fn_bitlshift(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let value = bit_operand(&args[0], oracle)?;
    let amount = shift_amount(&args[1], oracle)?;
    Ok(Value::Number(shift(value, amount)? as f64))
}

pub fn fn_bitrshift(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let value = bit_operand(&args[0], oracle)?;
    let amount = shift_amount(&args[1], oracle)?;
    Ok(Value::Number(shift(value, -amount)? as f64))
}

/// DELTA(number1, [number2]): 1 when equal
pub fn fn_delta(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let a = number(&args[0], oracle)?;
    let b = opt_number(args, 1, 0.0, oracle)?;
    Ok(Value::Number(if a == b { 1.0 } else { 0.0 }))
}

/// GESTEP(number, [step]): 1 when number >= step
pub fn fn_gestep(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let n = number(&args[0], oracle)?;
    let step = opt_number(args, 1, 0.0, oracle)?;
    Ok(Value::Number(if n >= step { 1.0 } else { 0.0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EvaluationContext;
    use pretty_assertions::assert_eq;

    fn call(f: super::super::FunctionImpl, args: &[Value]) -> Result<Value, ErrorKind> {
        f(args, &EvaluationContext::simple())
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_dec2bin_twos_complement() {
        assert_eq!(call(fn_dec2bin, &[n(-1.0)]), Ok(text("1111111111")));
        assert_eq!(call(fn_dec2bin, &[n(-512.0)]), Ok(text("1000000000")));
        assert_eq!(call(fn_dec2bin, &[n(511.0)]), Ok(text("111111111")));
        assert_eq!(call(fn_dec2bin, &[n(512.0)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_dec2bin, &[n(-513.0)]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_places_padding() {
        assert_eq!(call(fn_dec2bin, &[n(9.0), n(4.0)]), Ok(text("1001")));
        assert_eq!(call(fn_dec2bin, &[n(9.0), n(8.0)]), Ok(text("00001001")));
        assert_eq!(call(fn_dec2bin, &[n(9.0), n(3.0)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_dec2hex, &[n(100.0), n(4.0)]), Ok(text("0064")));
        // Negative values ignore places
        assert_eq!(call(fn_dec2hex, &[n(-54.0), n(2.0)]), Ok(text("FFFFFFFFCA")));
        assert_eq!(call(fn_dec2oct, &[n(-100.0)]), Ok(text("7777777634")));
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(call(fn_bin2dec, &[text("1100100")]), Ok(n(100.0)));
        assert_eq!(call(fn_bin2dec, &[text("1111111111")]), Ok(n(-1.0)));
        assert_eq!(call(fn_bin2dec, &[n(1010.0)]), Ok(n(10.0)));
        assert_eq!(call(fn_bin2dec, &[text("12")]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bin2dec, &[text("11111111111")]), Err(ErrorKind::Num));
        assert_eq!(call(fn_hex2dec, &[text("A5")]), Ok(n(165.0)));
        assert_eq!(call(fn_hex2dec, &[text("FFFFFFFF5B")]), Ok(n(-165.0)));
        assert_eq!(call(fn_oct2dec, &[text("7777777533")]), Ok(n(-165.0)));
        assert_eq!(call(fn_bin2dec, &[Value::Bool(true)]), Err(ErrorKind::Value));
    }

    #[test]
    fn test_cross_conversions() {
        assert_eq!(call(fn_hex2bin, &[text("FFFFFFFFFF")]), Ok(text("1111111111")));
        assert_eq!(call(fn_hex2bin, &[text("200")]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bin2hex, &[text("1111111111")]), Ok(text("FFFFFFFFFF")));
        assert_eq!(call(fn_bin2oct, &[text("1001"), n(3.0)]), Ok(text("011")));
        assert_eq!(call(fn_oct2hex, &[text("100"), n(4.0)]), Ok(text("0040")));
        assert_eq!(call(fn_hex2oct, &[text("F"), n(3.0)]), Ok(text("017")));
        assert_eq!(call(fn_oct2bin, &[text("3")]), Ok(text("11")));
    }

    #[test]
    fn test_missing_places_matches_omitted() {
        assert_eq!(
            call(fn_dec2bin, &[n(9.0), Value::Missing]),
            call(fn_dec2bin, &[n(9.0)])
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(call(fn_bitand, &[n(13.0), n(25.0)]), Ok(n(9.0)));
        assert_eq!(call(fn_bitor, &[n(23.0), n(10.0)]), Ok(n(31.0)));
        assert_eq!(call(fn_bitxor, &[n(5.0), n(3.0)]), Ok(n(6.0)));
        assert_eq!(call(fn_bitlshift, &[n(4.0), n(2.0)]), Ok(n(16.0)));
        assert_eq!(call(fn_bitrshift, &[n(13.0), n(2.0)]), Ok(n(3.0)));
        assert_eq!(call(fn_bitlshift, &[n(13.0), n(-2.0)]), Ok(n(3.0)));
        assert_eq!(call(fn_bitand, &[n(-1.0), n(1.0)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bitand, &[n(1.5), n(1.0)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bitlshift, &[n(1.0), n(48.0)]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_shift_amount_out_of_range() {
        assert_eq!(call(fn_bitlshift, &[n(1.0), n(47.0)]), Ok(n(140737488355328.0)));
        assert_eq!(call(fn_bitrshift, &[n(1.0), n(53.0)]), Ok(n(0.0)));
        assert_eq!(call(fn_bitlshift, &[n(1.0), n(54.0)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bitrshift, &[n(1.0), n(54.0)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bitlshift, &[n(1.0), n(-1e300)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bitrshift, &[n(1.0), n(-1e300)]), Err(ErrorKind::Num));
        assert_eq!(call(fn_bitlshift, &[n(1.0), n(1e300)]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_delta_gestep() {
        assert_eq!(call(fn_delta, &[n(5.0), n(4.0)]), Ok(n(0.0)));
        assert_eq!(call(fn_delta, &[n(0.0)]), Ok(n(1.0)));
        assert_eq!(call(fn_gestep, &[n(5.0), n(4.0)]), Ok(n(1.0)));
        assert_eq!(call(fn_gestep, &[n(-4.0)]), Ok(n(0.0)));
    }
}
