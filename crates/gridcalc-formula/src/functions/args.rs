//! Argument helpers shared by the function families
//!
//! These implement the common contracts: omitted optional arguments take
//! their default, scalar arguments coerce, and range arguments expand in
//! row-major order.

use crate::oracle::{CellHandle, CellOracle};
use crate::value::{Area, Reference, Value};
use gridcalc_core::ErrorKind;

/// Read every cell of an area, sheet by sheet, row-major within a sheet
pub fn area_values(area: &Area, oracle: &dyn CellOracle) -> Vec<Value> {
    let mut values = Vec::new();
    for sheet in area.sheets() {
        for cell in oracle.expand_range(sheet, &area.range) {
            values.push(Value::from_cell(&oracle.resolve_cell_value(cell)));
        }
    }
    values
}

/// Read an area of the first sheet as rows
pub fn area_rows(area: &Area, oracle: &dyn CellOracle) -> Vec<Vec<Value>> {
    let sheet = area.first_sheet;
    let Some(range) = oracle.effective_range(sheet, &area.range) else {
        return Vec::new();
    };
    (range.start.row..=range.end.row)
        .map(|row| {
            (range.start.col..=range.end.col)
                .map(|col| {
                    Value::from_cell(&oracle.resolve_cell_value(CellHandle::new(sheet, row, col)))
                })
                .collect()
        })
        .collect()
}

/// Reduce a reference to one value the way a scalar slot does
///
/// A single cell reads directly. A one-column or one-row range intersects
/// with the formula's own row or column; anything else is `#VALUE!`.
pub fn dereference(reference: &Reference, oracle: &dyn CellOracle) -> Value {
    let Some(area) = reference.single_area() else {
        return Value::Error(ErrorKind::Value);
    };
    if area.is_3d() {
        return Value::Error(ErrorKind::Value);
    }
    let range = &area.range;
    if range.cell_count() == 1 {
        let cell = CellHandle::new(area.first_sheet, range.start.row, range.start.col);
        return Value::from_cell(&oracle.resolve_cell_value(cell));
    }

    let Some(current) = oracle.current_cell() else {
        return Value::Error(ErrorKind::Value);
    };
    let hit = if range.col_count() == 1
        && (range.start.row..=range.end.row).contains(&current.row)
    {
        Some((current.row, range.start.col))
    } else if range.row_count() == 1 && (range.start.col..=range.end.col).contains(&current.col) {
        Some((range.start.row, current.col))
    } else {
        None
    };
    match hit {
        Some((row, col)) => Value::from_cell(
            &oracle.resolve_cell_value(CellHandle::new(area.first_sheet, row, col)),
        ),
        None => Value::Error(ErrorKind::Value),
    }
}

/// Reduce any value to a scalar: references are read, arrays give their top-left element
pub fn scalar(value: &Value, oracle: &dyn CellOracle) -> Value {
    match value {
        Value::Reference(r) => dereference(r, oracle),
        Value::Array(rows) => rows
            .first()
            .and_then(|r| r.first())
            .cloned()
            .unwrap_or(Value::Error(ErrorKind::Value)),
        v => v.clone(),
    }
}

/// Whether argument `index` was omitted or left empty
pub fn is_missing(args: &[Value], index: usize) -> bool {
    matches!(args.get(index), None | Some(Value::Missing))
}

/// Numeric argument
pub fn number(value: &Value, oracle: &dyn CellOracle) -> Result<f64, ErrorKind> {
    scalar(value, oracle).coerce_number()
}

/// Optional numeric argument with a default
pub fn opt_number(
    args: &[Value],
    index: usize,
    default: f64,
    oracle: &dyn CellOracle,
) -> Result<f64, ErrorKind> {
    if is_missing(args, index) {
        Ok(default)
    } else {
        number(&args[index], oracle)
    }
}

/// Integer argument, truncated toward zero
pub fn integer(value: &Value, oracle: &dyn CellOracle) -> Result<i64, ErrorKind> {
    let n = number(value, oracle)?;
    if !n.is_finite() || n.abs() > 9.007_199_254_740_992e15 {
        return Err(ErrorKind::Num);
    }
    Ok(n.trunc() as i64)
}

/// Optional integer argument with a default
pub fn opt_integer(
    args: &[Value],
    index: usize,
    default: i64,
    oracle: &dyn CellOracle,
) -> Result<i64, ErrorKind> {
    if is_missing(args, index) {
        Ok(default)
    } else {
        integer(&args[index], oracle)
    }
}

/// Text argument
pub fn text(value: &Value, oracle: &dyn CellOracle) -> Result<String, ErrorKind> {
    scalar(value, oracle).coerce_text()
}

/// Logical argument
pub fn boolean(value: &Value, oracle: &dyn CellOracle) -> Result<bool, ErrorKind> {
    scalar(value, oracle).coerce_bool()
}

/// Optional logical argument with a default
pub fn opt_bool(
    args: &[Value],
    index: usize,
    default: bool,
    oracle: &dyn CellOracle,
) -> Result<bool, ErrorKind> {
    if is_missing(args, index) {
        Ok(default)
    } else {
        boolean(&args[index], oracle)
    }
}

/// Every value an argument holds, row-major; scalars yield themselves
pub fn flatten(value: &Value, oracle: &dyn CellOracle) -> Vec<Value> {
    match value {
        Value::Reference(r) => r.areas.iter().flat_map(|a| area_values(a, oracle)).collect(),
        Value::Array(rows) => rows.iter().flatten().cloned().collect(),
        v => vec![v.clone()],
    }
}

fn is_range(value: &Value) -> bool {
    matches!(value, Value::Reference(_) | Value::Array(_))
}

/// Numbers for SUM-like functions
///
/// Direct arguments coerce (booleans and numeric text count); inside
/// ranges and arrays only numbers count. Errors anywhere propagate.
pub fn numbers(args: &[Value], oracle: &dyn CellOracle) -> Result<Vec<f64>, ErrorKind> {
    let mut out = Vec::new();
    for arg in args {
        if is_range(arg) {
            for v in flatten(arg, oracle) {
                match v {
                    Value::Number(n) => out.push(n),
                    Value::Error(e) => return Err(e),
                    _ => {}
                }
            }
        } else {
            match arg {
                Value::Missing | Value::Empty => {}
                v => out.push(v.coerce_number()?),
            }
        }
    }
    Ok(out)
}

/// Numbers for the `A` variants (AVERAGEA, MAXA, MINA)
///
/// Inside ranges text counts as zero and booleans as 0/1.
pub fn numbers_a(args: &[Value], oracle: &dyn CellOracle) -> Result<Vec<f64>, ErrorKind> {
    let mut out = Vec::new();
    for arg in args {
        if is_range(arg) {
            for v in flatten(arg, oracle) {
                match v {
                    Value::Number(n) => out.push(n),
                    Value::Bool(b) => out.push(if b { 1.0 } else { 0.0 }),
                    Value::Text(_) => out.push(0.0),
                    Value::Error(e) => return Err(e),
                    _ => {}
                }
            }
        } else {
            match arg {
                Value::Missing | Value::Empty => {}
                v => out.push(v.coerce_number()?),
            }
        }
    }
    Ok(out)
}

/// An argument as a rectangular grid
pub fn matrix(value: &Value, oracle: &dyn CellOracle) -> Result<Vec<Vec<Value>>, ErrorKind> {
    match value {
        Value::Reference(r) => match r.single_area() {
            Some(area) => Ok(area_rows(area, oracle)),
            None => Err(ErrorKind::Value),
        },
        Value::Array(rows) => Ok(rows.clone()),
        v => Ok(vec![vec![v.clone()]]),
    }
}

/// Shape of a grid as (rows, columns)
pub fn shape(rows: &[Vec<Value>]) -> (usize, usize) {
    (rows.len(), rows.first().map_or(0, Vec::len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{EvaluationContext, SheetHandle};
    use gridcalc_core::{CellRange, Workbook};

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", "2").unwrap();
        ws.set_cell_value("A3", true).unwrap();
        ws.set_cell_value("A4", 4.0).unwrap();
        ws.set_cell_value("B1", 10.0).unwrap();
        wb
    }

    fn reference(range: &str) -> Value {
        Value::Reference(Reference::single(Area::new(
            SheetHandle(0),
            CellRange::parse(range).unwrap(),
        )))
    }

    #[test]
    fn test_numbers_follow_sum_rules() {
        let wb = workbook();
        let ctx = EvaluationContext::new(Some(&wb), 0, 0, 5);
        let args = [reference("A1:A4"), Value::from("5"), Value::Bool(true)];
        assert_eq!(numbers(&args, &ctx), Ok(vec![1.0, 4.0, 5.0, 1.0]));
        assert_eq!(
            numbers(&[Value::from("x")], &ctx),
            Err(ErrorKind::Value)
        );
    }

    #[test]
    fn test_numbers_a_counts_text_and_bools() {
        let wb = workbook();
        let ctx = EvaluationContext::new(Some(&wb), 0, 0, 5);
        assert_eq!(
            numbers_a(&[reference("A1:A4")], &ctx),
            Ok(vec![1.0, 0.0, 1.0, 4.0])
        );
    }

    #[test]
    fn test_implicit_intersection() {
        let wb = workbook();
        let ctx = EvaluationContext::new(Some(&wb), 0, 3, 5);
        assert_eq!(scalar(&reference("A1:A4"), &ctx), Value::Number(4.0));
        let outside = EvaluationContext::new(Some(&wb), 0, 9, 5);
        assert_eq!(
            scalar(&reference("A1:A4"), &outside),
            Value::Error(ErrorKind::Value)
        );
        let row = EvaluationContext::new(Some(&wb), 0, 7, 1);
        assert_eq!(scalar(&reference("A1:B1"), &row), Value::Number(10.0));
    }

    #[test]
    fn test_optional_defaults() {
        let ctx = EvaluationContext::simple();
        let args = [Value::Number(3.0), Value::Missing];
        assert_eq!(opt_number(&args, 1, 12.0, &ctx), Ok(12.0));
        assert_eq!(opt_number(&args, 2, 0.5, &ctx), Ok(0.5));
        assert_eq!(opt_number(&args, 0, 0.0, &ctx), Ok(3.0));
        assert_eq!(opt_bool(&args, 1, true, &ctx), Ok(true));
    }

    #[test]
    fn test_matrix_shape() {
        let wb = workbook();
        let ctx = EvaluationContext::new(Some(&wb), 0, 0, 5);
        let rows = matrix(&reference("A1:B2"), &ctx).unwrap();
        assert_eq!(shape(&rows), (2, 2));
        assert_eq!(rows[0][1], Value::Number(10.0));
        assert_eq!(rows[1][1], Value::Empty);
    }
}
