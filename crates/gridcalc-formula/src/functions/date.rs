//! Date functions and day-count conventions
//!
//! Dates are serial numbers. In the 1900 system serial 1 is 1900-01-01 and
//! serial 60 is the fictitious 1900-02-29 kept for Lotus compatibility; in
//! the 1904 system serial 0 is 1904-01-01.

use super::args::{integer, is_missing, number, opt_bool};
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::Value;
use chrono::{Datelike, Duration, NaiveDate};
use gridcalc_core::ErrorKind;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("DATE", 65, 3, Some(3), fn_date);
    r.builtin("YEAR", 69, 1, Some(1), fn_year);
    r.builtin("MONTH", 68, 1, Some(1), fn_month);
    r.builtin("DAY", 67, 1, Some(1), fn_day);
    r.builtin("DAYS360", 220, 2, Some(3), fn_days360);

    r.addin("EDATE", 2, Some(2), fn_edate);
    r.addin("EOMONTH", 2, Some(2), fn_eomonth);
    r.addin("YEARFRAC", 2, Some(3), fn_yearfrac);
}

/// Largest serial (9999-12-31 in the 1900 system)
const MAX_SERIAL: i64 = 2_958_465;

/// Which epoch serial numbers count from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSystem {
    Excel1900,
    Excel1904,
}

impl DateSystem {
    pub fn of(oracle: &dyn CellOracle) -> Self {
        if oracle.settings().date_1904 {
            DateSystem::Excel1904
        } else {
            DateSystem::Excel1900
        }
    }

    /// Serial number of a calendar date
    pub fn serial(self, date: NaiveDate) -> i64 {
        match self {
            DateSystem::Excel1900 => {
                let days = (date - ymd(1899, 12, 30)).num_days();
                if date < ymd(1900, 3, 1) {
                    days - 1
                } else {
                    days
                }
            }
            DateSystem::Excel1904 => (date - ymd(1904, 1, 1)).num_days(),
        }
    }

    /// Calendar date of a serial number; the fictitious 1900-02-29 reads as 1900-03-01
    pub fn date(self, serial: i64) -> Option<NaiveDate> {
        if !(0..=MAX_SERIAL).contains(&serial) {
            return None;
        }
        match self {
            DateSystem::Excel1900 if serial < 61 => {
                ymd(1899, 12, 31).checked_add_signed(Duration::days(serial))
            }
            DateSystem::Excel1900 => ymd(1899, 12, 30).checked_add_signed(Duration::days(serial)),
            DateSystem::Excel1904 => ymd(1904, 1, 1).checked_add_signed(Duration::days(serial)),
        }
    }

    /// Year, month and day as the spreadsheet shows them (serial 0 is 1900-01-00)
    pub fn parts(self, serial: i64) -> Option<(i32, u32, u32)> {
        if self == DateSystem::Excel1900 {
            match serial {
                0 => return Some((1900, 1, 0)),
                60 => return Some((1900, 2, 29)),
                _ => {}
            }
        }
        self.date(serial).map(|d| (d.year(), d.month(), d.day()))
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ if is_leap_year(year) => 29,
        _ => 28,
    }
}

/// First day of the month `months` after (year, month), normalising overflow
fn first_of_month(year: i64, month: i64, months: i64) -> Option<NaiveDate> {
    let total = year * 12 + (month - 1) + months;
    let y = i32::try_from(total.div_euclid(12)).ok()?;
    let m = (total.rem_euclid(12) + 1) as u32;
    NaiveDate::from_ymd_opt(y, m, 1)
}

/// Date argument as a serial number
pub(crate) fn serial_arg(value: &Value, oracle: &dyn CellOracle) -> Result<i64, ErrorKind> {
    let n = number(value, oracle)?;
    if n < 0.0 || n > MAX_SERIAL as f64 {
        return Err(ErrorKind::Num);
    }
    Ok(n.trunc() as i64)
}

/// Day-count basis codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    /// US (NASD) 30/360
    Us30360,
    ActualActual,
    Actual360,
    Actual365,
    /// European 30/360
    European30360,
}

impl Basis {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Basis::Us30360,
            1 => Basis::ActualActual,
            2 => Basis::Actual360,
            3 => Basis::Actual365,
            4 => Basis::European30360,
            _ => return None,
        })
    }
}

/// Optional basis argument; omitted means 0, anything outside 0..=4 is `#NUM!`
pub(crate) fn basis_arg(
    args: &[Value],
    index: usize,
    oracle: &dyn CellOracle,
) -> Result<Basis, ErrorKind> {
    if is_missing(args, index) {
        return Ok(Basis::Us30360);
    }
    Basis::from_code(integer(&args[index], oracle)?).ok_or(ErrorKind::Num)
}

#[derive(Debug, Clone, Copy)]
struct Ymd {
    y: i32,
    m: u32,
    d: u32,
}

impl Ymd {
    fn is_last_of_feb(self) -> bool {
        self.m == 2 && self.d == days_in_month(self.y, 2)
    }

    fn count360(self, d: u32) -> i64 {
        self.y as i64 * 360 + self.m as i64 * 30 + d as i64
    }
}

fn parts(system: DateSystem, serial: i64) -> Result<Ymd, ErrorKind> {
    system
        .parts(serial)
        .map(|(y, m, d)| Ymd { y, m, d })
        .ok_or(ErrorKind::Num)
}

/// DAYS360 day count between two dates
pub(crate) fn days360(start: Ymd, end: Ymd, european: bool) -> i64 {
    let mut d1 = start.d;
    let mut d2 = end.d;
    if european {
        d1 = d1.min(30);
        d2 = d2.min(30);
    } else {
        if d1 == 31 || start.is_last_of_feb() {
            d1 = 30;
        }
        if d2 == 31 && d1 >= 30 {
            d2 = 30;
        }
    }
    end.count360(d2) - start.count360(d1)
}

/// NASD 30/360 as YEARFRAC basis 0 applies it
fn us_30_360(start: Ymd, end: Ymd) -> i64 {
    let (mut d1, mut d2) = (start.d, end.d);
    if d1 == 31 && d2 == 31 {
        d1 = 30;
        d2 = 30;
    } else if d1 == 31 {
        d1 = 30;
    } else if d1 == 30 && d2 == 31 {
        d2 = 30;
    } else if start.is_last_of_feb() && end.is_last_of_feb() {
        d1 = 30;
        d2 = 30;
    } else if start.is_last_of_feb() {
        d1 = 30;
    }
    end.count360(d2) - start.count360(d1)
}

/// Actual/actual fraction; years longer than one average their lengths
fn actual_actual(system: DateSystem, start: i64, end: i64, s: Ymd, e: Ymd) -> Result<f64, ErrorKind> {
    let days = (end - start) as f64;
    let within_year = s.y == e.y
        || (e.y == s.y + 1 && (s.m > e.m || (s.m == e.m && s.d >= e.d)));
    if within_year {
        let spans_feb29 = (is_leap_year(s.y) && (s.m, s.d) < (3, 1))
            || (is_leap_year(e.y) && (e.m, e.d) >= (3, 1))
            || (e.m == 2 && e.d == 29);
        let year_length = if (s.y == e.y && is_leap_year(s.y)) || spans_feb29 {
            366.0
        } else {
            365.0
        };
        return Ok(days / year_length);
    }

    let first = system.serial(ymd(s.y, 1, 1));
    let after_last = system.serial(ymd(e.y + 1, 1, 1));
    let years = (e.y - s.y + 1) as f64;
    Ok(days / ((after_last - first) as f64 / years))
}

/// Fraction of a year between two serials under a basis
pub(crate) fn year_frac(
    system: DateSystem,
    start: i64,
    end: i64,
    basis: Basis,
) -> Result<f64, ErrorKind> {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let s = parts(system, start)?;
    let e = parts(system, end)?;
    Ok(match basis {
        Basis::Us30360 => us_30_360(s, e) as f64 / 360.0,
        Basis::ActualActual => actual_actual(system, start, end, s, e)?,
        Basis::Actual360 => (end - start) as f64 / 360.0,
        Basis::Actual365 => (end - start) as f64 / 365.0,
        Basis::European30360 => days360(s, e, true) as f64 / 360.0,
    })
}

/// DATE function
///
/// Years 0..=1899 count from 1900; months and days outside their range roll over.
pub fn fn_date(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let mut year = integer(&args[0], oracle)?;
    let month = integer(&args[1], oracle)?;
    let day = integer(&args[2], oracle)?;
    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..10000).contains(&year) {
        return Err(ErrorKind::Num);
    }

    let system = DateSystem::of(oracle);
    let first = first_of_month(year, month, 0).ok_or(ErrorKind::Num)?;
    let serial = system.serial(first) + day - 1;
    if !(0..=MAX_SERIAL).contains(&serial) {
        return Err(ErrorKind::Num);
    }
    Ok(Value::Number(serial as f64))
}

fn date_part(
    args: &[Value],
    oracle: &dyn CellOracle,
    pick: fn((i32, u32, u32)) -> i64,
) -> Result<Value, ErrorKind> {
    let serial = serial_arg(&args[0], oracle)?;
    let p = DateSystem::of(oracle).parts(serial).ok_or(ErrorKind::Num)?;
    Ok(Value::Number(pick(p) as f64))
}

/// YEAR function
pub fn fn_year(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    date_part(args, oracle, |(y, _, _)| y as i64)
}

/// MONTH function
pub fn fn_month(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    date_part(args, oracle, |(_, m, _)| m as i64)
}

/// DAY function
pub fn fn_day(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    date_part(args, oracle, |(_, _, d)| d as i64)
}

/// DAYS360 function; the optional flag selects the European method
pub fn fn_days360(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let system = DateSystem::of(oracle);
    let start = parts(system, serial_arg(&args[0], oracle)?)?;
    let end = parts(system, serial_arg(&args[1], oracle)?)?;
    let european = opt_bool(args, 2, false, oracle)?;
    Ok(Value::Number(days360(start, end, european) as f64))
}

fn shift_months(
    args: &[Value],
    oracle: &dyn CellOracle,
    end_of_month: bool,
) -> Result<Value, ErrorKind> {
    let system = DateSystem::of(oracle);
    let start = system
        .date(serial_arg(&args[0], oracle)?)
        .ok_or(ErrorKind::Num)?;
    let months = integer(&args[1], oracle)?;
    let first = first_of_month(start.year() as i64, start.month() as i64, months)
        .ok_or(ErrorKind::Num)?;
    let last_day = days_in_month(first.year(), first.month());
    let day = if end_of_month {
        last_day
    } else {
        start.day().min(last_day)
    };
    let date = first.with_day(day).ok_or(ErrorKind::Num)?;
    let serial = system.serial(date);
    if !(0..=MAX_SERIAL).contains(&serial) {
        return Err(ErrorKind::Num);
    }
    Ok(Value::Number(serial as f64))
}

/// EDATE function
pub fn fn_edate(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    shift_months(args, oracle, false)
}

/// EOMONTH function
pub fn fn_eomonth(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    shift_months(args, oracle, true)
}

/// YEARFRAC function
pub fn fn_yearfrac(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let start = serial_arg(&args[0], oracle)?;
    let end = serial_arg(&args[1], oracle)?;
    let basis = basis_arg(args, 2, oracle)?;
    year_frac(DateSystem::of(oracle), start, end, basis).map(Value::Number)
}
