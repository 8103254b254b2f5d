//! Financial functions
//!
//! Sign convention: cash paid out is negative, cash received is positive.
//! `type` arguments select end-of-period (0) or start-of-period (non-zero)
//! payments.

use super::args::{integer, number, numbers, opt_integer, opt_number};
use super::date::{basis_arg, serial_arg, year_frac, DateSystem};
use super::math::finite;
use super::solver::{newton, SolverOptions};
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("PV", 56, 3, Some(5), fn_pv);
    r.builtin("FV", 57, 3, Some(5), fn_fv);
    r.builtin("PMT", 59, 3, Some(5), fn_pmt);
    r.builtin("NPER", 58, 3, Some(5), fn_nper);
    r.builtin("RATE", 60, 3, Some(6), fn_rate);
    r.builtin("IPMT", 167, 4, Some(6), fn_ipmt);
    r.builtin("PPMT", 168, 4, Some(6), fn_ppmt);
    r.builtin("NPV", 11, 2, None, fn_npv);
    r.builtin("IRR", 62, 1, Some(2), fn_irr);
    r.builtin("MIRR", 61, 3, Some(3), fn_mirr);
    r.builtin("SLN", 142, 3, Some(3), fn_sln);
    r.builtin("SYD", 143, 4, Some(4), fn_syd);
    r.builtin("DDB", 144, 4, Some(5), fn_ddb);
    r.builtin("DB", 247, 4, Some(5), fn_db);
    r.builtin("ISPMT", 350, 4, Some(4), fn_ispmt);

    r.addin("XNPV", 3, Some(3), fn_xnpv);
    r.addin("XIRR", 2, Some(3), fn_xirr);
    r.addin("EFFECT", 2, Some(2), fn_effect);
    r.addin("NOMINAL", 2, Some(2), fn_nominal);
    r.addin("DISC", 4, Some(5), fn_disc);
    r.addin("INTRATE", 4, Some(5), fn_intrate);
    r.addin("RECEIVED", 4, Some(5), fn_received);
    r.addin("PRICEDISC", 4, Some(5), fn_pricedisc);
    r.addin("YIELDDISC", 4, Some(5), fn_yielddisc);
}

/// Days per year used by XNPV and XIRR
const DAYS_PER_YEAR: f64 = 365.0;

fn payment_type(args: &[Value], index: usize, oracle: &dyn CellOracle) -> Result<f64, ErrorKind> {
    let t = opt_number(args, index, 0.0, oracle)?;
    Ok(if t != 0.0 { 1.0 } else { 0.0 })
}

/// `((1+rate)^nper, (1+rate)^nper - 1)` without losing precision near zero rates
fn growth(rate: f64, nper: f64) -> Option<(f64, f64)> {
    let ln1p = rate.ln_1p();
    if !ln1p.is_finite() {
        return None;
    }
    let g_minus_1 = (nper * ln1p).exp_m1();
    let g = g_minus_1 + 1.0;
    (g.is_finite() && g_minus_1.is_finite()).then_some((g, g_minus_1))
}

/// Payment weight of an annuity: `(1 + rate*type) * ((1+rate)^nper - 1) / rate`
fn annuity_factor(rate: f64, g_minus_1: f64, typ: f64) -> f64 {
    (1.0 + rate * typ) * g_minus_1 / rate
}

pub(crate) fn pv(rate: f64, nper: f64, pmt: f64, fv: f64, typ: f64) -> Result<f64, ErrorKind> {
    if rate == 0.0 {
        return Ok(-fv - pmt * nper);
    }
    if rate == -1.0 && nper != 0.0 {
        return Err(ErrorKind::Div0);
    }
    let (g, g_minus_1) = growth(rate, nper).ok_or(ErrorKind::Num)?;
    if g == 0.0 {
        return Err(ErrorKind::Div0);
    }
    Ok(-(fv + pmt * annuity_factor(rate, g_minus_1, typ)) / g)
}

pub(crate) fn fv(rate: f64, nper: f64, pmt: f64, pv: f64, typ: f64) -> Result<f64, ErrorKind> {
    if rate == 0.0 {
        return Ok(-(pv + pmt * nper));
    }
    let (g, g_minus_1) = growth(rate, nper).ok_or(ErrorKind::Num)?;
    Ok(-(pv * g + pmt * annuity_factor(rate, g_minus_1, typ)))
}

pub(crate) fn pmt(rate: f64, nper: f64, pv: f64, fv: f64, typ: f64) -> Result<f64, ErrorKind> {
    if nper == 0.0 {
        return Err(ErrorKind::Div0);
    }
    if rate == 0.0 {
        return Ok(-(pv + fv) / nper);
    }
    let (g, g_minus_1) = growth(rate, nper).ok_or(ErrorKind::Num)?;
    let factor = annuity_factor(rate, g_minus_1, typ);
    if factor == 0.0 {
        return Err(ErrorKind::Div0);
    }
    Ok(-(pv * g + fv) / factor)
}

fn nper(rate: f64, pmt: f64, pv: f64, fv: f64, typ: f64) -> Result<f64, ErrorKind> {
    if rate == 0.0 {
        if pmt == 0.0 {
            return if pv + fv == 0.0 {
                Ok(0.0)
            } else {
                Err(ErrorKind::Num)
            };
        }
        return Ok(-(pv + fv) / pmt);
    }

    let ln1p = rate.ln_1p();
    if !ln1p.is_finite() || ln1p == 0.0 {
        return Err(ErrorKind::Num);
    }

    let ratio = if pmt == 0.0 {
        if pv == 0.0 {
            return Err(ErrorKind::Num);
        }
        -fv / pv
    } else {
        let a = pmt * (1.0 + rate * typ) / rate;
        if pv + a == 0.0 {
            return Err(ErrorKind::Num);
        }
        (a - fv) / (pv + a)
    };
    if ratio <= 0.0 {
        return Err(ErrorKind::Num);
    }
    Ok(ratio.ln() / ln1p)
}

/// Residual of the annuity equation `pv*g + pmt*factor + fv` at `rate`
fn annuity_residual(rate: f64, nper: f64, pmt: f64, pv: f64, fv: f64, typ: f64) -> Option<f64> {
    if rate <= -1.0 {
        return None;
    }
    if rate == 0.0 {
        return Some(pv + pmt * nper + fv);
    }
    let (g, g_minus_1) = growth(rate, nper)?;
    Some(pv * g + pmt * annuity_factor(rate, g_minus_1, typ) + fv)
}

fn annuity_residual_slope(rate: f64, nper: f64, pmt: f64, pv: f64, typ: f64) -> Option<f64> {
    if rate <= -1.0 {
        return None;
    }
    if rate == 0.0 {
        let d = nper * pv + pmt * (nper * (nper - 1.0) / 2.0 + typ * nper);
        return (d.is_finite() && d != 0.0).then_some(d);
    }
    let (g, g_minus_1) = growth(rate, nper)?;
    let dg = nper * g / (1.0 + rate);
    let annuity = g_minus_1 / rate;
    let dannuity = (dg * rate - g_minus_1) / (rate * rate);
    let d = pv * dg + pmt * (typ * annuity + (1.0 + rate * typ) * dannuity);
    (d.is_finite() && d != 0.0).then_some(d)
}

fn ipmt(rate: f64, per: f64, nper: f64, pv: f64, fv_value: f64, typ: f64) -> Result<f64, ErrorKind> {
    if per < 1.0 || per > nper {
        return Err(ErrorKind::Num);
    }
    if rate == 0.0 {
        return Ok(0.0);
    }
    let payment = pmt(rate, nper, pv, fv_value, typ)?;
    if typ == 1.0 {
        if (per - 1.0).abs() <= SolverOptions::DEFAULT.tolerance {
            return Ok(0.0);
        }
        Ok(fv(rate, per - 1.0, payment, pv, 1.0)? * rate / (1.0 + rate))
    } else {
        Ok(fv(rate, per - 1.0, payment, pv, 0.0)? * rate)
    }
}

/// The five annuity arguments in PV/FV/PMT/NPER/RATE order, with optional tail
fn annuity_args(
    args: &[Value],
    oracle: &dyn CellOracle,
) -> Result<(f64, f64, f64, f64, f64), ErrorKind> {
    Ok((
        number(&args[0], oracle)?,
        number(&args[1], oracle)?,
        number(&args[2], oracle)?,
        opt_number(args, 3, 0.0, oracle)?,
        payment_type(args, 4, oracle)?,
    ))
}

/// PV(rate, nper, pmt, [fv], [type])
pub fn fn_pv(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (rate, n, payment, future, typ) = annuity_args(args, oracle)?;
    finite(pv(rate, n, payment, future, typ)?)
}

/// FV(rate, nper, pmt, [pv], [type])
pub fn fn_fv(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (rate, n, payment, present, typ) = annuity_args(args, oracle)?;
    finite(fv(rate, n, payment, present, typ)?)
}

/// PMT(rate, nper, pv, [fv], [type])
pub fn fn_pmt(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (rate, n, present, future, typ) = annuity_args(args, oracle)?;
    finite(pmt(rate, n, present, future, typ)?)
}

/// NPER(rate, pmt, pv, [fv], [type])
pub fn fn_nper(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (rate, payment, present, future, typ) = annuity_args(args, oracle)?;
    finite(nper(rate, payment, present, future, typ)?)
}

/// RATE(nper, pmt, pv, [fv], [type], [guess])
///
/// Solved with Newton-Raphson; `#NUM!` when it does not converge.
pub fn fn_rate(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (n, payment, present, future, typ) = annuity_args(args, oracle)?;
    let guess = opt_number(args, 5, 0.1, oracle)?;
    if n <= 0.0 || guess <= -1.0 {
        return Err(ErrorKind::Num);
    }
    let rate = newton(
        guess,
        SolverOptions::DEFAULT,
        |r| annuity_residual(r, n, payment, present, future, typ),
        |r| annuity_residual_slope(r, n, payment, present, typ),
    )
    .ok_or(ErrorKind::Num)?;
    finite(rate)
}

fn period_args(
    args: &[Value],
    oracle: &dyn CellOracle,
) -> Result<(f64, f64, f64, f64, f64, f64), ErrorKind> {
    Ok((
        number(&args[0], oracle)?,
        number(&args[1], oracle)?,
        number(&args[2], oracle)?,
        number(&args[3], oracle)?,
        opt_number(args, 4, 0.0, oracle)?,
        payment_type(args, 5, oracle)?,
    ))
}

/// IPMT(rate, per, nper, pv, [fv], [type])
pub fn fn_ipmt(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (rate, per, n, present, future, typ) = period_args(args, oracle)?;
    finite(ipmt(rate, per, n, present, future, typ)?)
}

/// PPMT(rate, per, nper, pv, [fv], [type])
pub fn fn_ppmt(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (rate, per, n, present, future, typ) = period_args(args, oracle)?;
    let payment = pmt(rate, n, present, future, typ)?;
    finite(payment - ipmt(rate, per, n, present, future, typ)?)
}

/// ISPMT(rate, per, nper, pv): interest paid in a period of a straight-line loan
pub fn fn_ispmt(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let rate = number(&args[0], oracle)?;
    let per = number(&args[1], oracle)?;
    let n = number(&args[2], oracle)?;
    let present = number(&args[3], oracle)?;
    if n == 0.0 {
        return Err(ErrorKind::Div0);
    }
    finite(present * rate * (per / n - 1.0))
}

fn npv(rate: f64, values: &[f64]) -> Result<f64, ErrorKind> {
    if rate == -1.0 {
        return Err(ErrorKind::Div0);
    }
    let mut total = 0.0;
    let mut discount = 1.0;
    for v in values {
        discount *= 1.0 + rate;
        total += v / discount;
    }
    Ok(total)
}

/// NPV(rate, value1, ...): cash flows at the end of periods 1, 2, ...
pub fn fn_npv(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let rate = number(&args[0], oracle)?;
    let values = numbers(&args[1..], oracle)?;
    finite(npv(rate, &values)?)
}

fn has_both_signs(values: &[f64]) -> bool {
    values.iter().any(|v| *v > 0.0) && values.iter().any(|v| *v < 0.0)
}

/// IRR(values, [guess])
pub fn fn_irr(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(&args[..1], oracle)?;
    let guess = opt_number(args, 1, 0.1, oracle)?;
    if !has_both_signs(&values) {
        return Err(ErrorKind::Num);
    }

    let f = |r: f64| {
        if r <= -1.0 {
            return None;
        }
        let mut total = 0.0;
        for (i, v) in values.iter().enumerate() {
            total += v / (1.0 + r).powi(i as i32);
        }
        total.is_finite().then_some(total)
    };
    let df = |r: f64| {
        if r <= -1.0 {
            return None;
        }
        let mut total = 0.0;
        for (i, v) in values.iter().enumerate().skip(1) {
            total -= i as f64 * v / (1.0 + r).powi(i as i32 + 1);
        }
        total.is_finite().then_some(total)
    };
    finite(newton(guess, SolverOptions::DEFAULT, f, df).ok_or(ErrorKind::Num)?)
}

/// MIRR(values, finance_rate, reinvest_rate)
pub fn fn_mirr(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(&args[..1], oracle)?;
    let finance_rate = number(&args[1], oracle)?;
    let reinvest_rate = number(&args[2], oracle)?;
    if !has_both_signs(&values) {
        return Err(ErrorKind::Div0);
    }

    let n = values.len() as f64;
    let mut positive = 0.0;
    let mut negative = 0.0;
    for (i, v) in values.iter().enumerate() {
        if *v > 0.0 {
            positive += v / (1.0 + reinvest_rate).powi(i as i32 + 1);
        } else {
            negative += v / (1.0 + finance_rate).powi(i as i32 + 1);
        }
    }
    let growth = -positive * (1.0 + reinvest_rate).powf(n) / (negative * (1.0 + finance_rate));
    finite(growth.powf(1.0 / (n - 1.0)) - 1.0)
}

/// Cash flows and their dates for XNPV/XIRR
fn dated_flows(
    values: &Value,
    dates: &Value,
    oracle: &dyn CellOracle,
) -> Result<(Vec<f64>, Vec<f64>), ErrorKind> {
    let values = numbers(std::slice::from_ref(values), oracle)?;
    let dates: Vec<f64> = numbers(std::slice::from_ref(dates), oracle)?
        .into_iter()
        .map(f64::trunc)
        .collect();
    if values.is_empty() || values.len() != dates.len() {
        return Err(ErrorKind::Num);
    }
    if dates.iter().any(|d| *d < dates[0]) {
        return Err(ErrorKind::Num);
    }
    Ok((values, dates))
}

fn xnpv(rate: f64, values: &[f64], dates: &[f64]) -> Option<f64> {
    if rate <= -1.0 {
        return None;
    }
    let total: f64 = values
        .iter()
        .zip(dates)
        .map(|(v, d)| v / (1.0 + rate).powf((d - dates[0]) / DAYS_PER_YEAR))
        .sum();
    total.is_finite().then_some(total)
}

/// XNPV(rate, values, dates)
pub fn fn_xnpv(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let rate = number(&args[0], oracle)?;
    let (values, dates) = dated_flows(&args[1], &args[2], oracle)?;
    finite(xnpv(rate, &values, &dates).ok_or(ErrorKind::Num)?)
}

/// XIRR(values, dates, [guess])
pub fn fn_xirr(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let (values, dates) = dated_flows(&args[0], &args[1], oracle)?;
    let guess = opt_number(args, 2, 0.1, oracle)?;
    if !has_both_signs(&values) {
        return Err(ErrorKind::Num);
    }

    let df = |r: f64| {
        if r <= -1.0 {
            return None;
        }
        let total: f64 = values
            .iter()
            .zip(&dates)
            .map(|(v, d)| {
                let t = (d - dates[0]) / DAYS_PER_YEAR;
                -t * v / (1.0 + r).powf(t + 1.0)
            })
            .sum();
        total.is_finite().then_some(total)
    };
    let rate = newton(guess, SolverOptions::DEFAULT, |r| xnpv(r, &values, &dates), df)
        .ok_or(ErrorKind::Num)?;
    finite(rate)
}

/// EFFECT(nominal_rate, npery)
pub fn fn_effect(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let nominal = number(&args[0], oracle)?;
    let periods = integer(&args[1], oracle)?;
    if nominal <= 0.0 || periods < 1 {
        return Err(ErrorKind::Num);
    }
    let p = periods as f64;
    finite((1.0 + nominal / p).powf(p) - 1.0)
}

/// NOMINAL(effect_rate, npery)
pub fn fn_nominal(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let effect = number(&args[0], oracle)?;
    let periods = integer(&args[1], oracle)?;
    if effect <= 0.0 || periods < 1 {
        return Err(ErrorKind::Num);
    }
    let p = periods as f64;
    finite(p * ((1.0 + effect).powf(1.0 / p) - 1.0))
}

/// SLN(cost, salvage, life)
pub fn fn_sln(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let cost = number(&args[0], oracle)?;
    let salvage = number(&args[1], oracle)?;
    let life = number(&args[2], oracle)?;
    if life == 0.0 {
        return Err(ErrorKind::Div0);
    }
    finite((cost - salvage) / life)
}

/// SYD(cost, salvage, life, per)
pub fn fn_syd(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let cost = number(&args[0], oracle)?;
    let salvage = number(&args[1], oracle)?;
    let life = number(&args[2], oracle)?;
    let per = number(&args[3], oracle)?;
    if life <= 0.0 || per <= 0.0 || per > life {
        return Err(ErrorKind::Num);
    }
    finite((cost - salvage) * (life - per + 1.0) * 2.0 / (life * (life + 1.0)))
}

/// DDB(cost, salvage, life, period, [factor])
pub fn fn_ddb(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let cost = number(&args[0], oracle)?;
    let salvage = number(&args[1], oracle)?;
    let life = number(&args[2], oracle)?;
    let period = number(&args[3], oracle)?;
    let factor = opt_number(args, 4, 2.0, oracle)?;
    if cost < 0.0 || salvage < 0.0 || life <= 0.0 || factor <= 0.0 {
        return Err(ErrorKind::Num);
    }
    if period < 1.0 || period > life {
        return Err(ErrorKind::Num);
    }

    let rate = (factor / life).min(1.0);
    let book = cost * (1.0 - rate).powf(period - 1.0);
    finite((book * rate).min((book - salvage).max(0.0)))
}

/// DB(cost, salvage, life, period, [month])
///
/// The depreciation rate is rounded to three decimals; the first and last
/// periods are prorated by `month`.
pub fn fn_db(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let cost = number(&args[0], oracle)?;
    let salvage = number(&args[1], oracle)?;
    let life = integer(&args[2], oracle)?;
    let period = integer(&args[3], oracle)?;
    let month = opt_integer(args, 4, 12, oracle)?;
    if cost < 0.0 || salvage < 0.0 || life <= 0 || !(1..=12).contains(&month) {
        return Err(ErrorKind::Num);
    }
    let last = if month == 12 { life } else { life + 1 };
    if period < 1 || period > last {
        return Err(ErrorKind::Num);
    }
    if cost == 0.0 {
        return Ok(Value::Number(0.0));
    }

    let rate = (1.0 - (salvage / cost).powf(1.0 / life as f64)) * 1000.0;
    let rate = rate.round() / 1000.0;
    let month = month as f64;

    let mut total = 0.0;
    let mut depreciation = 0.0;
    for p in 1..=period {
        depreciation = if p == 1 {
            cost * rate * month / 12.0
        } else if p == life + 1 {
            (cost - total) * rate * (12.0 - month) / 12.0
        } else {
            (cost - total) * rate
        };
        total += depreciation;
    }
    finite(depreciation)
}

/// Settlement, maturity, two amounts and a basis for the discount-security family
struct Security {
    year_fraction: f64,
    first: f64,
    second: f64,
}

fn security_args(args: &[Value], oracle: &dyn CellOracle) -> Result<Security, ErrorKind> {
    let settlement = serial_arg(&args[0], oracle)?;
    let maturity = serial_arg(&args[1], oracle)?;
    let first = number(&args[2], oracle)?;
    let second = number(&args[3], oracle)?;
    let basis = basis_arg(args, 4, oracle)?;
    if settlement >= maturity || first <= 0.0 || second <= 0.0 {
        return Err(ErrorKind::Num);
    }
    let year_fraction = year_frac(DateSystem::of(oracle), settlement, maturity, basis)?;
    if year_fraction == 0.0 {
        return Err(ErrorKind::Div0);
    }
    Ok(Security {
        year_fraction,
        first,
        second,
    })
}

/// DISC(settlement, maturity, pr, redemption, [basis])
pub fn fn_disc(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = security_args(args, oracle)?;
    finite((s.second - s.first) / s.second / s.year_fraction)
}

/// INTRATE(settlement, maturity, investment, redemption, [basis])
pub fn fn_intrate(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = security_args(args, oracle)?;
    finite((s.second - s.first) / s.first / s.year_fraction)
}

/// RECEIVED(settlement, maturity, investment, discount, [basis])
pub fn fn_received(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = security_args(args, oracle)?;
    let denominator = 1.0 - s.second * s.year_fraction;
    if denominator == 0.0 {
        return Err(ErrorKind::Div0);
    }
    if denominator < 0.0 {
        return Err(ErrorKind::Num);
    }
    finite(s.first / denominator)
}

/// PRICEDISC(settlement, maturity, discount, redemption, [basis])
pub fn fn_pricedisc(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = security_args(args, oracle)?;
    let factor = 1.0 - s.first * s.year_fraction;
    if factor <= 0.0 {
        return Err(ErrorKind::Num);
    }
    finite(s.second * factor)
}

/// YIELDDISC(settlement, maturity, pr, redemption, [basis])
pub fn fn_yielddisc(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let s = security_args(args, oracle)?;
    finite((s.second - s.first) / s.first / s.year_fraction)
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

    fn array(values: &[f64]) -> Value {
        Value::Array(vec![values.iter().map(|&n| Value::Number(n)).collect()])
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_annuity_functions() {
        assert_close(num(fn_pmt, &[0.08 / 12.0, 10.0, 10000.0]), -1037.03, 0.005);
        assert_close(num(fn_pv, &[0.08 / 12.0, 240.0, 500.0]), -59777.15, 0.005);
        assert_close(num(fn_fv, &[0.06 / 12.0, 10.0, -200.0, -500.0, 1.0]), 2581.40, 0.005);
        assert_close(num(fn_nper, &[0.01, -100.0, -1000.0, 10000.0, 1.0]), 59.6739, 0.0001);
        assert_close(num(fn_ipmt, &[0.1 / 12.0, 1.0, 36.0, 8000.0]), -66.67, 0.005);
        assert_close(num(fn_ppmt, &[0.1 / 12.0, 1.0, 24.0, 2000.0]), -75.62, 0.005);
        assert_eq!(num(fn_pmt, &[0.0, 10.0, 1000.0]), -100.0);
        assert_eq!(call(fn_pmt, &[0.1, 0.0, 1000.0]), Err(ErrorKind::Div0));
        assert_eq!(call(fn_ipmt, &[0.1, 0.0, 10.0, 1000.0]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_rate_converges() {
        assert_close(num(fn_rate, &[48.0, -200.0, 8000.0]), 0.007701472, 1e-9);
        // Round trip through PMT
        let rate = num(fn_rate, &[60.0, -188.71, 10000.0]);
        assert_close(num(fn_pmt, &[rate, 60.0, 10000.0]), -188.71, 1e-6);
    }

    #[test]
    fn test_rate_without_solution_is_num() {
        // Paying back less than was borrowed at any positive rate has no root
        assert_eq!(call(fn_rate, &[10.0, 100.0, 1000.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_rate, &[0.0, -100.0, 1000.0]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_missing_arguments_take_defaults() {
        let ctx = EvaluationContext::simple();
        let with_gap = [
            Value::Number(0.1),
            Value::Number(10.0),
            Value::Number(1000.0),
            Value::Missing,
            Value::Number(1.0),
        ];
        let explicit = [
            Value::Number(0.1),
            Value::Number(10.0),
            Value::Number(1000.0),
            Value::Number(0.0),
            Value::Number(1.0),
        ];
        assert_eq!(fn_pmt(&with_gap, &ctx), fn_pmt(&explicit, &ctx));
    }

    #[test]
    fn test_cash_flow_functions() {
        let ctx = EvaluationContext::simple();
        let npv = fn_npv(
            &[
                Value::Number(0.1),
                Value::Number(-10000.0),
                Value::Number(3000.0),
                Value::Number(4200.0),
                Value::Number(6800.0),
            ],
            &ctx,
        );
        match npv {
            Ok(Value::Number(n)) => assert_close(n, 1188.44, 0.005),
            other => panic!("unexpected {:?}", other),
        }

        let flows = array(&[-70000.0, 12000.0, 15000.0, 18000.0, 21000.0, 26000.0]);
        match fn_irr(&[flows], &ctx) {
            Ok(Value::Number(n)) => assert_close(n, 0.086630948, 1e-8),
            other => panic!("unexpected {:?}", other),
        }

        let flows = array(&[-120000.0, 39000.0, 30000.0, 21000.0, 37000.0, 46000.0]);
        match fn_mirr(&[flows, Value::Number(0.1), Value::Number(0.12)], &ctx) {
            Ok(Value::Number(n)) => assert_close(n, 0.126094, 1e-6),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(fn_irr(&[array(&[100.0, 200.0])], &ctx), Err(ErrorKind::Num));
    }

    #[test]
    fn test_dated_cash_flows() {
        let ctx = EvaluationContext::simple();
        let values = array(&[-10000.0, 2750.0, 4250.0, 3250.0, 2750.0]);
        let dates = array(&[39448.0, 39508.0, 39751.0, 39859.0, 39904.0]);
        match fn_xnpv(&[Value::Number(0.09), values.clone(), dates.clone()], &ctx) {
            Ok(Value::Number(n)) => assert_close(n, 2086.65, 0.005),
            other => panic!("unexpected {:?}", other),
        }
        match fn_xirr(&[values, dates], &ctx) {
            Ok(Value::Number(n)) => assert_close(n, 0.373362535, 1e-6),
            other => panic!("unexpected {:?}", other),
        }

        let short = array(&[39448.0]);
        assert_eq!(
            fn_xnpv(&[Value::Number(0.09), array(&[-1.0, 2.0]), short], &ctx),
            Err(ErrorKind::Num)
        );
    }

    #[test]
    fn test_effect_nominal() {
        assert_close(num(fn_effect, &[0.0525, 4.0]), 0.053542667, 1e-9);
        assert_close(num(fn_nominal, &[0.053543, 4.0]), 0.05250032, 1e-8);
        assert_eq!(call(fn_effect, &[0.05, 0.5]), Err(ErrorKind::Num));
    }

    #[test]
    fn test_depreciation() {
        assert_eq!(num(fn_sln, &[30000.0, 7500.0, 10.0]), 2250.0);
        assert_close(num(fn_syd, &[30000.0, 7500.0, 10.0, 1.0]), 4090.91, 0.005);
        assert_close(num(fn_ddb, &[2400.0, 300.0, 10.0, 1.0]), 480.0, 1e-9);
        assert_close(num(fn_ddb, &[2400.0, 300.0, 10.0, 10.0]), 22.12, 0.005);
        assert_close(num(fn_db, &[1_000_000.0, 100_000.0, 6.0, 1.0, 7.0]), 186083.33, 0.005);
        assert_close(num(fn_db, &[1_000_000.0, 100_000.0, 6.0, 2.0, 7.0]), 259639.42, 0.005);
        assert_close(num(fn_db, &[1_000_000.0, 100_000.0, 6.0, 7.0, 7.0]), 15845.10, 0.005);
        assert_eq!(call(fn_db, &[1_000_000.0, 100_000.0, 6.0, 7.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_sln, &[1.0, 0.0, 0.0]), Err(ErrorKind::Div0));
        assert_close(num(fn_ispmt, &[0.1 / 12.0, 1.0, 36.0, 8_000_000.0]), -64814.81, 0.005);
    }

    #[test]
    fn test_db_month_defaults_to_twelve() {
        assert_eq!(
            num(fn_db, &[10000.0, 1000.0, 5.0, 2.0]),
            num(fn_db, &[10000.0, 1000.0, 5.0, 2.0, 12.0])
        );
    }

    #[test]
    fn test_discount_securities() {
        assert_close(num(fn_disc, &[39472.0, 39614.0, 97.975, 100.0, 1.0]), 0.052420213, 1e-9);
        assert_close(num(fn_intrate, &[39493.0, 39583.0, 1_000_000.0, 1_014_420.0, 2.0]), 0.05768, 1e-9);
        assert_close(num(fn_received, &[39493.0, 39583.0, 1_000_000.0, 0.0575, 2.0]), 1_014_584.654, 0.001);
        assert_close(num(fn_pricedisc, &[39494.0, 39508.0, 0.0525, 100.0, 2.0]), 99.79583, 1e-5);
        assert_close(num(fn_yielddisc, &[39494.0, 39508.0, 99.795, 100.0, 2.0]), 0.052823, 1e-6);
        assert_eq!(call(fn_disc, &[39614.0, 39472.0, 97.975, 100.0]), Err(ErrorKind::Num));
        assert_eq!(call(fn_disc, &[39472.0, 39614.0, 97.975, 100.0, 7.0]), Err(ErrorKind::Num));
    }
}
