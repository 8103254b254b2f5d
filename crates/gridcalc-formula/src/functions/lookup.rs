//! Lookup and reference functions

use super::args::{integer, is_missing, matrix, opt_bool, opt_integer, scalar, shape};
use super::criteria::CriteriaMatcher;
use super::FunctionRegistry;
use crate::oracle::CellOracle;
use crate::value::{compare, Area, Reference, Value};
use gridcalc_core::{CellRange, ErrorKind};
use std::cmp::Ordering;

pub(super) fn register(r: &mut FunctionRegistry) {
    r.builtin("VLOOKUP", 102, 3, Some(4), fn_vlookup);
    r.builtin("HLOOKUP", 101, 3, Some(4), fn_hlookup);
    r.builtin("MATCH", 64, 2, Some(3), fn_match);
    r.builtin("INDEX", 29, 2, Some(3), fn_index);
    r.builtin("ROW", 8, 0, Some(1), fn_row);
    r.builtin("COLUMN", 9, 0, Some(1), fn_column);
    r.builtin("ROWS", 76, 1, Some(1), fn_rows);
    r.builtin("COLUMNS", 77, 1, Some(1), fn_columns);
}

/// How MATCH-style searches compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    /// Largest value not above the key; data ascending
    NotAbove,
    /// First equal value; text keys may use wildcards
    Exact,
    /// Smallest value not below the key; data descending
    NotBelow,
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_))
            | (Value::Text(_), Value::Text(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

fn exact_match(key: &Value, candidate: &Value) -> bool {
    match (key, candidate) {
        (Value::Text(pattern), Value::Text(text)) => CriteriaMatcher::text_matches(pattern, text),
        _ => same_kind(key, candidate) && compare(key, candidate) == Ordering::Equal,
    }
}

/// 0-based position of `key` in `values`
///
/// The approximate modes scan until the ordering breaks, so they assume
/// sorted data like the spreadsheet's own search does.
fn search(key: &Value, values: &[&Value], mode: MatchMode) -> Option<usize> {
    match mode {
        MatchMode::Exact => values.iter().position(|v| exact_match(key, v)),
        MatchMode::NotAbove | MatchMode::NotBelow => {
            let mut found = None;
            for (i, v) in values.iter().enumerate() {
                if !same_kind(key, v) {
                    continue;
                }
                let ordering = compare(v, key);
                let within = match mode {
                    MatchMode::NotAbove => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                if within {
                    found = Some(i);
                    if ordering == Ordering::Equal {
                        break;
                    }
                } else {
                    break;
                }
            }
            found
        }
    }
}

/// Lookup key: a scalar, never blank-as-missing
fn key_arg(value: &Value, oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match scalar(value, oracle) {
        Value::Error(e) => Err(e),
        Value::Empty | Value::Missing => Ok(Value::Number(0.0)),
        v => Ok(v),
    }
}

fn table_lookup(args: &[Value], oracle: &dyn CellOracle, vertical: bool) -> Result<Value, ErrorKind> {
    let key = key_arg(&args[0], oracle)?;
    let table = matrix(&args[1], oracle)?;
    let index = integer(&args[2], oracle)?;
    let approximate = opt_bool(args, 3, true, oracle)?;

    let (rows, cols) = shape(&table);
    let (lanes, depth) = if vertical { (rows, cols) } else { (cols, rows) };
    if index < 1 {
        return Err(ErrorKind::Value);
    }
    if index as usize > depth {
        return Err(ErrorKind::Ref);
    }

    let keys: Vec<&Value> = (0..lanes)
        .map(|i| if vertical { &table[i][0] } else { &table[0][i] })
        .collect();
    let mode = if approximate {
        MatchMode::NotAbove
    } else {
        MatchMode::Exact
    };
    let hit = search(&key, &keys, mode).ok_or(ErrorKind::Na)?;
    let depth_index = index as usize - 1;
    let found = if vertical {
        &table[hit][depth_index]
    } else {
        &table[depth_index][hit]
    };
    match found {
        Value::Error(e) => Err(*e),
        v => Ok(v.clone()),
    }
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    table_lookup(args, oracle, true)
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    table_lookup(args, oracle, false)
}

/// MATCH(lookup_value, lookup_array, [match_type])
pub fn fn_match(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let key = key_arg(&args[0], oracle)?;
    let grid = matrix(&args[1], oracle)?;
    let mode = match opt_integer(args, 2, 1, oracle)? {
        0 => MatchMode::Exact,
        t if t > 0 => MatchMode::NotAbove,
        _ => MatchMode::NotBelow,
    };

    let (rows, cols) = shape(&grid);
    let values: Vec<&Value> = if rows == 1 {
        grid[0].iter().collect()
    } else if cols == 1 {
        grid.iter().map(|row| &row[0]).collect()
    } else {
        return Err(ErrorKind::Na);
    };
    let position = search(&key, &values, mode).ok_or(ErrorKind::Na)?;
    Ok(Value::Number((position + 1) as f64))
}

/// INDEX(array, row_num, [column_num])
///
/// On a reference the result is a reference to the chosen cell, row or
/// column; zero selects the whole row or column.
pub fn fn_index(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    let row = integer(&args[1], oracle)?;
    let col = if is_missing(args, 2) {
        None
    } else {
        Some(integer(&args[2], oracle)?)
    };
    if row < 0 || col.is_some_and(|c| c < 0) {
        return Err(ErrorKind::Value);
    }

    match &args[0] {
        Value::Reference(reference) => {
            let area = reference.single_area().ok_or(ErrorKind::Ref)?;
            let range = &area.range;
            let (rows, cols) = (range.row_count() as i64, range.col_count() as i64);
            let (row, col) = single_vector_position(rows, cols, row, col);
            if row > rows || col > cols {
                return Err(ErrorKind::Ref);
            }
            let (first_row, last_row) = select(range.start.row as i64, rows, row);
            let (first_col, last_col) = select(range.start.col as i64, cols, col);
            let selected = CellRange::from_indices(
                first_row as u32,
                first_col as u16,
                last_row as u32,
                last_col as u16,
            );
            Ok(Value::Reference(Reference::single(Area {
                range: selected,
                ..*area
            })))
        }
        other => {
            let grid = matrix(other, oracle)?;
            let (rows, cols) = shape(&grid);
            let (rows, cols) = (rows as i64, cols as i64);
            let (row, col) = single_vector_position(rows, cols, row, col);
            if row > rows || col > cols {
                return Err(ErrorKind::Ref);
            }
            let (first_row, last_row) = select(0, rows, row);
            let (first_col, last_col) = select(0, cols, col);
            let picked: Vec<Vec<Value>> = (first_row..=last_row)
                .map(|r| {
                    (first_col..=last_col)
                        .map(|c| grid[r as usize][c as usize].clone())
                        .collect()
                })
                .collect();
            match picked.as_slice() {
                [only] if only.len() == 1 => Ok(only[0].clone()),
                _ => Ok(Value::Array(picked)),
            }
        }
    }
}

/// A one-row source indexed with a single number picks a column
fn single_vector_position(rows: i64, cols: i64, row: i64, col: Option<i64>) -> (i64, i64) {
    match col {
        Some(c) => (row, c),
        None if rows == 1 && cols > 1 => (1, row),
        None => (row, 1),
    }
}

/// Inclusive span picked by a 1-based index; 0 picks all
fn select(start: i64, len: i64, index: i64) -> (i64, i64) {
    if index == 0 {
        (start, start + len - 1)
    } else {
        (start + index - 1, start + index - 1)
    }
}

fn position_arg(
    args: &[Value],
    oracle: &dyn CellOracle,
) -> Result<Option<Area>, ErrorKind> {
    if is_missing(args, 0) {
        return Ok(None);
    }
    match &args[0] {
        Value::Reference(reference) => reference.single_area().copied().map(Some).ok_or(ErrorKind::Ref),
        other => match scalar(other, oracle) {
            Value::Error(e) => Err(e),
            _ => Err(ErrorKind::Value),
        },
    }
}

/// ROW([reference]); a multi-row reference gives a column of row numbers
pub fn fn_row(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match position_arg(args, oracle)? {
        None => {
            let cell = oracle.current_cell().ok_or(ErrorKind::Value)?;
            Ok(Value::Number(cell.row as f64 + 1.0))
        }
        Some(area) => {
            let rows: Vec<Vec<Value>> = (area.range.start.row..=area.range.end.row)
                .map(|r| vec![Value::Number(r as f64 + 1.0)])
                .collect();
            Ok(collapse(rows))
        }
    }
}

/// COLUMN([reference]); a multi-column reference gives a row of column numbers
pub fn fn_column(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    match position_arg(args, oracle)? {
        None => {
            let cell = oracle.current_cell().ok_or(ErrorKind::Value)?;
            Ok(Value::Number(cell.col as f64 + 1.0))
        }
        Some(area) => {
            let cols: Vec<Value> = (area.range.start.col..=area.range.end.col)
                .map(|c| Value::Number(c as f64 + 1.0))
                .collect();
            Ok(collapse(vec![cols]))
        }
    }
}

fn collapse(grid: Vec<Vec<Value>>) -> Value {
    match grid.as_slice() {
        [only] if only.len() == 1 => only[0].clone(),
        _ => Value::Array(grid),
    }
}

fn dimensions(value: &Value, oracle: &dyn CellOracle) -> Result<(u64, u64), ErrorKind> {
    match value {
        Value::Reference(reference) => {
            let area = reference.single_area().ok_or(ErrorKind::Ref)?;
            Ok((area.range.row_count() as u64, area.range.col_count() as u64))
        }
        Value::Array(rows) => {
            let (r, c) = shape(rows);
            Ok((r as u64, c as u64))
        }
        other => match scalar(other, oracle) {
            Value::Error(e) => Err(e),
            _ => Ok((1, 1)),
        },
    }
}

/// ROWS(array)
pub fn fn_rows(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Number(dimensions(&args[0], oracle)?.0 as f64))
}

/// COLUMNS(array)
pub fn fn_columns(args: &[Value], oracle: &dyn CellOracle) -> Result<Value, ErrorKind> {
    Ok(Value::Number(dimensions(&args[0], oracle)?.1 as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{EvaluationContext, SheetHandle};
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn price_list() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (i, (name, price)) in [("Apple", 1.5), ("Banana", 0.25), ("Cherry", 4.0), ("Date", 7.0)]
            .iter()
            .enumerate()
        {
            ws.set_cell_value_at(i as u32, 0, *name).unwrap();
            ws.set_cell_value_at(i as u32, 1, *price).unwrap();
        }
        ws.set_cell_value("D1", 10.0).unwrap();
        ws.set_cell_value("D2", 20.0).unwrap();
        ws.set_cell_value("D3", 30.0).unwrap();
        wb
    }

    fn range(a1: &str) -> Value {
        Value::Reference(Reference::single(Area::new(
            SheetHandle(0),
            CellRange::parse(a1).unwrap(),
        )))
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_vlookup_exact_and_approximate() {
        let wb = price_list();
        let ctx = EvaluationContext::new(Some(&wb), 0, 10, 10);
        let exact = fn_vlookup(&[text("cherry"), range("A1:B4"), n(2.0), Value::Bool(false)], &ctx);
        assert_eq!(exact, Ok(n(4.0)));
        let wildcard = fn_vlookup(&[text("B*"), range("A1:B4"), n(2.0), Value::Bool(false)], &ctx);
        assert_eq!(wildcard, Ok(n(0.25)));
        let missing = fn_vlookup(&[text("Fig"), range("A1:B4"), n(2.0), Value::Bool(false)], &ctx);
        assert_eq!(missing, Err(ErrorKind::Na));

        let approximate = fn_vlookup(&[n(25.0), range("D1:D3"), n(1.0)], &ctx);
        assert_eq!(approximate, Ok(n(20.0)));
        let below = fn_vlookup(&[n(5.0), range("D1:D3"), n(1.0)], &ctx);
        assert_eq!(below, Err(ErrorKind::Na));
        let too_wide = fn_vlookup(&[text("Apple"), range("A1:B4"), n(3.0), Value::Bool(false)], &ctx);
        assert_eq!(too_wide, Err(ErrorKind::Ref));
    }

    #[test]
    fn test_hlookup() {
        let ctx = EvaluationContext::simple();
        let table = Value::Array(vec![
            vec![text("Axles"), text("Bearings"), text("Bolts")],
            vec![n(4.0), n(4.0), n(9.0)],
            vec![n(5.0), n(7.0), n(10.0)],
        ]);
        assert_eq!(
            fn_hlookup(&[text("Bearings"), table.clone(), n(2.0), Value::Bool(true)], &ctx),
            Ok(n(4.0))
        );
        assert_eq!(
            fn_hlookup(&[text("B"), table.clone(), n(3.0), Value::Bool(true)], &ctx),
            Ok(n(5.0))
        );
        assert_eq!(
            fn_hlookup(&[text("Bolts"), table, n(3.0), Value::Bool(false)], &ctx),
            Ok(n(10.0))
        );
    }

    #[test]
    fn test_match_modes() {
        let wb = price_list();
        let ctx = EvaluationContext::new(Some(&wb), 0, 10, 10);
        assert_eq!(fn_match(&[n(20.0), range("D1:D3"), n(0.0)], &ctx), Ok(n(2.0)));
        assert_eq!(fn_match(&[n(25.0), range("D1:D3")], &ctx), Ok(n(2.0)));
        assert_eq!(fn_match(&[text("da*"), range("A1:A4"), n(0.0)], &ctx), Ok(n(4.0)));
        let descending = Value::Array(vec![vec![n(30.0), n(20.0), n(10.0)]]);
        assert_eq!(fn_match(&[n(15.0), descending, n(-1.0)], &ctx), Ok(n(2.0)));
        assert_eq!(fn_match(&[n(1.0), range("A1:B4"), n(0.0)], &ctx), Err(ErrorKind::Na));
    }

    #[test]
    fn test_index() {
        let wb = price_list();
        let ctx = EvaluationContext::new(Some(&wb), 0, 10, 10);
        assert_eq!(fn_index(&[range("A1:B4"), n(3.0), n(2.0)], &ctx), Ok(range("B3")));
        assert_eq!(fn_index(&[range("A1:B4"), n(0.0), n(2.0)], &ctx), Ok(range("B1:B4")));
        assert_eq!(fn_index(&[range("A1:B4"), n(5.0), n(1.0)], &ctx), Err(ErrorKind::Ref));

        let array = Value::Array(vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]]);
        assert_eq!(fn_index(&[array.clone(), n(2.0), n(2.0)], &ctx), Ok(n(4.0)));
        assert_eq!(
            fn_index(&[array, n(2.0), n(0.0)], &ctx),
            Ok(Value::Array(vec![vec![n(3.0), n(4.0)]]))
        );
        let row = Value::Array(vec![vec![n(1.0), n(2.0), n(3.0)]]);
        assert_eq!(fn_index(&[row, n(3.0)], &ctx), Ok(n(3.0)));
    }

    #[test]
    fn test_row_column_rows_columns() {
        let wb = price_list();
        let ctx = EvaluationContext::new(Some(&wb), 0, 4, 2);
        assert_eq!(fn_row(&[], &ctx), Ok(n(5.0)));
        assert_eq!(fn_column(&[], &ctx), Ok(n(3.0)));
        assert_eq!(fn_row(&[range("C7")], &ctx), Ok(n(7.0)));
        assert_eq!(
            fn_column(&[range("B1:D1")], &ctx),
            Ok(Value::Array(vec![vec![n(2.0), n(3.0), n(4.0)]]))
        );
        assert_eq!(fn_rows(&[range("A1:B4")], &ctx), Ok(n(4.0)));
        assert_eq!(fn_columns(&[range("A1:B4")], &ctx), Ok(n(2.0)));
        assert_eq!(fn_rows(&[n(1.0)], &ctx), Ok(n(1.0)));
        assert_eq!(fn_row(&[n(1.0)], &ctx), Err(ErrorKind::Value));
    }
}
