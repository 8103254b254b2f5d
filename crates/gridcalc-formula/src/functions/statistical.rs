//! Statistical functions

use super::args::{flatten, matrix, number, numbers, numbers_a, opt_number, scalar, shape};
use super::criteria::CriteriaMatcher;
use super::math::finite;
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("COUNT", 0, 0, None, fn_count).inspects_errors();
    r.builtin("COUNTA", 169, 1, None, fn_counta).inspects_errors();
    r.builtin("COUNTBLANK", 347, 1, Some(1), fn_countblank);
    r.builtin("COUNTIF", 346, 2, Some(2), fn_countif);
    r.builtin("SUMIF", 345, 2, Some(3), fn_sumif);
    r.builtin("AVERAGEIF", 483, 2, Some(3), fn_averageif);
    r.builtin("COUNTIFS", 481, 2, None, fn_countifs);
    r.builtin("SUMIFS", 482, 3, None, fn_sumifs);
    r.builtin("AVERAGE", 5, 1, None, fn_average);
    r.builtin("AVERAGEA", 361, 1, None, fn_averagea);
    r.builtin("MIN", 6, 1, None, fn_min);
    r.builtin("MAX", 7, 1, None, fn_max);
    r.builtin("MINA", 363, 1, None, fn_mina);
    r.builtin("MAXA", 362, 1, None, fn_maxa);
    r.builtin("MEDIAN", 227, 1, None, fn_median);
    r.builtin("MODE", 330, 1, None, fn_mode);
    r.builtin("LARGE", 325, 2, Some(2), fn_large);
    r.builtin("SMALL", 326, 2, Some(2), fn_small);
    r.builtin("RANK", 216, 2, Some(3), fn_rank);
    r.builtin("STDEV", 12, 1, None, fn_stdev);
    r.builtin("STDEVP", 193, 1, None, fn_stdevp);
    r.builtin("VAR", 46, 1, None, fn_var);
    r.builtin("VARP", 194, 1, None, fn_varp);
    r.builtin("AVEDEV", 269, 1, None, fn_avedev);
    r.builtin("DEVSQ", 318, 1, None, fn_devsq);
    r.builtin("GEOMEAN", 319, 1, None, fn_geomean);
    r.builtin("HARMEAN", 320, 1, None, fn_harmean);
    r.builtin("KURT", 322, 1, None, fn_kurt);
    r.builtin("SKEW", 323, 1, None, fn_skew);
    r.builtin("CORREL", 307, 2, Some(2), fn_correl);
    r.builtin("COVAR", 308, 2, Some(2), fn_covar);
    r.builtin("PERCENTILE", 328, 2, Some(2), fn_percentile);
    r.builtin("QUARTILE", 327, 2, Some(2), fn_quartile);
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sum_sq_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum()
}

/// Sample variance; `None` with fewer than two values
fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        None
    } else {
        Some(sum_sq_dev(values) / (values.len() - 1) as f64)
    }
}

/// COUNT function
pub fn fn_count(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mut count = 0;
    for arg in args {
        match arg {
            Value::Reference(_) | Value::Array(_) => {
                count += flatten(arg, oracle)
                    .iter()
                    .filter(|v| matches!(v, Value::Number(_)))
                    .count();
            }
            Value::Number(_) | Value::Bool(_) => count += 1,
            Value::Text(s) if crate::value::parse_number_text(s).is_some() => count += 1,
            _ => {}
        }
    }
    Ok(Value::Number(count as f64))
}

/// COUNTA function
pub fn fn_counta(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let count: usize = args
        .iter()
        .map(|arg| match arg {
            Value::Reference(_) | Value::Array(_) => {
                flatten(arg, oracle).iter().filter(|v| !v.is_blank()).count()
            }
            Value::Missing => 0,
            _ => 1,
        })
        .sum();
    Ok(Value::Number(count as f64))
}

/// COUNTBLANK function
pub fn fn_countblank(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let count = flatten(&args[0], oracle)
        .iter()
        .filter(|v| v.is_blank() || matches!(v, Value::Text(s) if s.is_empty()))
        .count();
    Ok(Value::Number(count as f64))
}

fn criteria_grid(
    range: &Value,
    criteria: &Value,
    oracle: &dyn CellOracle,
) -> Result<Vec<Vec<bool>>, ErrorKind> {
    let matcher = CriteriaMatcher::new(&scalar(criteria, oracle));
    Ok(matrix(range, oracle)?
        .iter()
        .map(|row| row.iter().map(|v| matcher.matches(v)).collect())
        .collect())
}

/// Combine several (range, criteria) pairs; every range must have the same shape
fn criteria_mask(pairs: &[Value], oracle: &dyn CellOracle) -> Result<Vec<Vec<bool>>, ErrorKind> {
    let mut mask: Option<Vec<Vec<bool>>> = None;
    for pair in pairs.chunks(2) {
        let [range, criteria] = pair else {
            return Err(ErrorKind::Value);
        };
        let grid = criteria_grid(range, criteria, oracle)?;
        mask = Some(match mask {
            None => grid,
            Some(prev) => {
                if dims(&prev) != dims(&grid) {
                    return Err(ErrorKind::Value);
                }
                prev.iter()
                    .zip(&grid)
                    .map(|(a, b)| a.iter().zip(b).map(|(x, y)| *x && *y).collect())
                    .collect()
            }
        });
    }
    mask.ok_or(ErrorKind::Value)
}

fn dims(grid: &[Vec<bool>]) -> (usize, usize) {
    (grid.len(), grid.first().map_or(0, Vec::len))
}

/// Numbers picked from `values` where `mask` is set; values outside the grid are skipped
fn masked_numbers(
    mask: &[Vec<bool>],
    values: &[Vec<Value>],
) -> Result<Vec<f64>, ErrorKind> {
    let mut out = Vec::new();
    for (r, row) in mask.iter().enumerate() {
        for (c, hit) in row.iter().enumerate() {
            if !hit {
                continue;
            }
            match values.get(r).and_then(|vr| vr.get(c)) {
                Some(Value::Number(n)) => out.push(*n),
                Some(Value::Error(e)) => return Err(*e),
                _ => {}
            }
        }
    }
    Ok(out)
}

/// COUNTIF function
pub fn fn_countif(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let grid = criteria_grid(&args[0], &args[1], oracle)?;
    let count = grid.iter().flatten().filter(|hit| **hit).count();
    Ok(Value::Number(count as f64))
}

/// COUNTIFS function
pub fn fn_countifs(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mask = criteria_mask(args, oracle)?;
    let count = mask.iter().flatten().filter(|hit| **hit).count();
    Ok(Value::Number(count as f64))
}

fn value_grid(
    args: &[Value],
    index: usize,
    fallback: &Value,
    oracle: &dyn CellOracle,
) -> Result<Vec<Vec<Value>>, ErrorKind> {
    match args.get(index) {
        Some(Value::Missing) | None => matrix(fallback, oracle),
        Some(v) => matrix(v, oracle),
    }
}

/// SUMIF function
pub fn fn_sumif(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mask = criteria_grid(&args[0], &args[1], oracle)?;
    let values = value_grid(args, 2, &args[0], oracle)?;
    finite(masked_numbers(&mask, &values)?.iter().sum())
}

/// SUMIFS function
pub fn fn_sumifs(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = matrix(&args[0], oracle)?;
    let mask = criteria_mask(&args[1..], oracle)?;
    if dims(&mask) != shape(&values) {
        return Err(ErrorKind::Value);
    }
    finite(masked_numbers(&mask, &values)?.iter().sum())
}

/// AVERAGEIF function
pub fn fn_averageif(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mask = criteria_grid(&args[0], &args[1], oracle)?;
    let values = value_grid(args, 2, &args[0], oracle)?;
    let picked = masked_numbers(&mask, &values)?;
    if picked.is_empty() {
        return Err(ErrorKind::Div0);
    }
    finite(mean(&picked))
}

/// AVERAGE function
pub fn fn_average(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() {
        return Err(ErrorKind::Div0);
    }
    finite(mean(&values))
}

/// AVERAGEA function
pub fn fn_averagea(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers_a(args, oracle)?;
    if values.is_empty() {
        return Err(ErrorKind::Div0);
    }
    finite(mean(&values))
}

fn extreme(values: Vec<f64>, pick: fn(f64, f64) -> f64) -> Result<Value, ErrorKind> {
    Ok(Value::Number(
        values.into_iter().reduce(pick).unwrap_or(0.0),
    ))
}

/// MIN function; no numbers gives 0
pub fn fn_min(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    extreme(numbers(args, oracle)?, f64::min)
}

/// MAX function; no numbers gives 0
pub fn fn_max(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    extreme(numbers(args, oracle)?, f64::max)
}

pub fn fn_mina(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    extreme(numbers_a(args, oracle)?, f64::min)
}

pub fn fn_maxa(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    extreme(numbers_a(args, oracle)?, f64::max)
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// MEDIAN function
pub fn fn_median(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = sorted(numbers(args, oracle)?);
    let n = values.len();
    if n == 0 {
        return Err(ErrorKind::Num);
    }
    let mid = n / 2;
    Ok(Value::Number(if n % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }))
}

/// MODE function; ties go to the value seen first
pub fn fn_mode(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    let mut best: Option<(f64, usize)> = None;
    for (i, x) in values.iter().enumerate() {
        if values[..i].contains(x) {
            continue;
        }
        let count = values[i..].iter().filter(|y| *y == x).count();
        if count > 1 && best.map_or(true, |(_, c)| count > c) {
            best = Some((*x, count));
        }
    }
    best.map(|(x, _)| Value::Number(x)).ok_or(ErrorKind::Na)
}

fn kth(args: &[Value], oracle: &dyn CellOracle, largest: bool) -> Result<Value, ErrorKind> {
    let values = sorted(numbers(&args[..1], oracle)?);
    let k = number(&args[1], oracle)?.ceil();
    if values.is_empty() || k < 1.0 || k > values.len() as f64 {
        return Err(ErrorKind::Num);
    }
    let k = k as usize;
    Ok(Value::Number(if largest {
        values[values.len() - k]
    } else {
        values[k - 1]
    }))
}

/// LARGE function
pub fn fn_large(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    kth(args, oracle, true)
}

/// SMALL function
pub fn fn_small(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    kth(args, oracle, false)
}

/// RANK function; order 0 (default) ranks descending
pub fn fn_rank(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let x = number(&args[0], oracle)?;
    let values = numbers(&args[1..2], oracle)?;
    let ascending = opt_number(args, 2, 0.0, oracle)? != 0.0;
    if !values.contains(&x) {
        return Err(ErrorKind::Na);
    }
    let ahead = values
        .iter()
        .filter(|v| if ascending { **v < x } else { **v > x })
        .count();
    Ok(Value::Number((ahead + 1) as f64))
}

/// STDEV function
pub fn fn_stdev(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let var = sample_variance(&numbers(args, oracle)?).ok_or(ErrorKind::Div0)?;
    finite(var.sqrt())
}

/// STDEVP function
pub fn fn_stdevp(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() {
        return Err(ErrorKind::Div0);
    }
    finite((sum_sq_dev(&values) / values.len() as f64).sqrt())
}

/// VAR function
pub fn fn_var(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    finite(sample_variance(&numbers(args, oracle)?).ok_or(ErrorKind::Div0)?)
}

/// VARP function
pub fn fn_varp(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() {
        return Err(ErrorKind::Div0);
    }
    finite(sum_sq_dev(&values) / values.len() as f64)
}

/// AVEDEV function
pub fn fn_avedev(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() {
        return Err(ErrorKind::Num);
    }
    let m = mean(&values);
    finite(values.iter().map(|x| (x - m).abs()).sum::<f64>() / values.len() as f64)
}

/// DEVSQ function
pub fn fn_devsq(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() {
        return Err(ErrorKind::Num);
    }
    finite(sum_sq_dev(&values))
}

fn positive_numbers(args: &[Value], oracle: &dyn CellOracle) -> Result<Vec<f64>, ErrorKind> {
    let values = numbers(args, oracle)?;
    if values.is_empty() || values.iter().any(|x| *x <= 0.0) {
        return Err(ErrorKind::Num);
    }
    Ok(values)
}

/// GEOMEAN function
pub fn fn_geomean(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = positive_numbers(args, oracle)?;
    let log_mean = values.iter().map(|x| x.ln()).sum::<f64>() / values.len() as f64;
    finite(log_mean.exp())
}

/// HARMEAN function
pub fn fn_harmean(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = positive_numbers(args, oracle)?;
    finite(values.len() as f64 / values.iter().map(|x| 1.0 / x).sum::<f64>())
}

/// KURT function (sample excess kurtosis)
pub fn fn_kurt(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    let n = values.len() as f64;
    let sd = sample_variance(&values).map(f64::sqrt).unwrap_or(0.0);
    if values.len() < 4 || sd == 0.0 {
        return Err(ErrorKind::Div0);
    }
    let m = mean(&values);
    let sum4: f64 = values.iter().map(|x| ((x - m) / sd).powi(4)).sum();
    let lead = n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0));
    let tail = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    finite(lead * sum4 - tail)
}

/// SKEW function (sample skewness)
pub fn fn_skew(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let values = numbers(args, oracle)?;
    let n = values.len() as f64;
    let sd = sample_variance(&values).map(f64::sqrt).unwrap_or(0.0);
    if values.len() < 3 || sd == 0.0 {
        return Err(ErrorKind::Div0);
    }
    let m = mean(&values);
    let sum3: f64 = values.iter().map(|x| ((x - m) / sd).powi(3)).sum();
    finite(n / ((n - 1.0) * (n - 2.0)) * sum3)
}

/// Positions where both arguments hold numbers
fn pairs(args: &[Value], oracle: &dyn CellOracle) -> Result<Vec<(f64, f64)>, ErrorKind> {
    let xs = flatten(&args[0], oracle);
    let ys = flatten(&args[1], oracle);
    if xs.len() != ys.len() {
        return Err(ErrorKind::Na);
    }
    let mut out = Vec::new();
    for (x, y) in xs.iter().zip(&ys) {
        if let Some(e) = x.as_error().or_else(|| y.as_error()) {
            return Err(e);
        }
        if let (Value::Number(a), Value::Number(b)) = (x, y) {
            out.push((*a, *b));
        }
    }
    Ok(out)
}

/// CORREL function
pub fn fn_correl(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let pts = pairs(args, oracle)?;
    if pts.is_empty() {
        return Err(ErrorKind::Div0);
    }
    let n = pts.len() as f64;
    let mx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let sxy: f64 = pts.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = pts.iter().map(|(x, _)| (x - mx).powi(2)).sum();
    let syy: f64 = pts.iter().map(|(_, y)| (y - my).powi(2)).sum();
    if sxx == 0.0 || syy == 0.0 {
        return Err(ErrorKind::Div0);
    }
    finite(sxy / (sxx * syy).sqrt())
}

/// COVAR function (population covariance)
pub fn fn_covar(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let pts = pairs(args, oracle)?;
    if pts.is_empty() {
        return Err(ErrorKind::Div0);
    }
    let n = pts.len() as f64;
    let mx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pts.iter().map(|p| p.1).sum::<f64>() / n;
    finite(pts.iter().map(|(x, y)| (x - mx) * (y - my)).sum::<f64>() / n)
}

fn percentile(values: Vec<f64>, k: f64) -> Result<Value, ErrorKind> {
    let values = sorted(values);
    if values.is_empty() || !(0.0..=1.0).contains(&k) {
        return Err(ErrorKind::Num);
    }
    let rank = k * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let frac = rank - lower as f64;
    let result = match values.get(lower + 1) {
        Some(upper) => values[lower] + frac * (upper - values[lower]),
        None => values[lower],
    };
    Ok(Value::Number(result))
}

/// PERCENTILE function (inclusive)
pub fn fn_percentile(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let k = number(&args[1], oracle)?;
    percentile(numbers(&args[..1], oracle)?, k)
}

/// QUARTILE function
pub fn fn_quartile(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let q = number(&args[1], oracle)?.trunc();
    if !(0.0..=4.0).contains(&q) {
        return Err(ErrorKind::Num);
    }
    percentile(numbers(&args[..1], oracle)?, q / 4.0)
}
