//! Tests for formula evaluation against an in-memory workbook

use gridcalc::prelude::*;
use gridcalc::{evaluate, evaluate_formula, parse, EvaluationContext, FormulaError, Value};

/// Inventory sheet used by most tests
///
/// ```text
///      A        B      C
/// 1    Item     Qty    Price
/// 2    apple    3      0.5
/// 3    pear     0      0.75
/// 4    plum     12     0.2
/// ```
fn inventory() -> Workbook {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", "Item").unwrap();
    sheet.set_cell_value("B1", "Qty").unwrap();
    sheet.set_cell_value("C1", "Price").unwrap();
    for (row, (item, qty, price)) in [("apple", 3.0, 0.5), ("pear", 0.0, 0.75), ("plum", 12.0, 0.2)]
        .into_iter()
        .enumerate()
    {
        let row = row as u32 + 1;
        sheet.set_cell_value_at(row, 0, item).unwrap();
        sheet.set_cell_value_at(row, 1, qty).unwrap();
        sheet.set_cell_value_at(row, 2, price).unwrap();
    }
    wb
}

fn eval(wb: &Workbook, formula: &str) -> Value {
    let ctx = EvaluationContext::new(Some(wb), 0, 9, 9);
    evaluate_formula(formula, &ctx).unwrap()
}

fn assert_close(value: Value, expected: f64) {
    match value {
        Value::Number(n) => assert!(
            (n - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            n
        ),
        other => panic!("expected {}, got {:?}", expected, other),
    }
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    let ctx = EvaluationContext::simple();

    let seq = parse("=1+2*3").unwrap();
    assert_eq!(evaluate(&seq, &ctx).unwrap(), Value::Number(7.0));

    let seq = parse("=\"Hello \"&\"World\"").unwrap();
    assert_eq!(evaluate(&seq, &ctx).unwrap(), Value::Text("Hello World".into()));

    let seq = parse("=5>3").unwrap();
    assert_eq!(evaluate(&seq, &ctx).unwrap(), Value::Bool(true));

    let seq = parse("=2^3^2").unwrap();
    assert_eq!(evaluate(&seq, &ctx).unwrap(), Value::Number(64.0));

    let seq = parse("=-2^2").unwrap();
    assert_eq!(evaluate(&seq, &ctx).unwrap(), Value::Number(4.0));
}

/// Test runtime errors are values, not failures
#[test]
fn test_errors_are_values() {
    let ctx = EvaluationContext::simple();
    assert_eq!(
        evaluate_formula("=1/0", &ctx).unwrap(),
        Value::Error(ErrorKind::Div0)
    );
    assert_eq!(
        evaluate_formula("=\"abc\"+1", &ctx).unwrap(),
        Value::Error(ErrorKind::Value)
    );
    assert_eq!(
        evaluate_formula("=0^0", &ctx).unwrap(),
        Value::Error(ErrorKind::Num)
    );
    assert_eq!(
        evaluate_formula("=SQRT(-1)", &ctx).unwrap(),
        Value::Error(ErrorKind::Num)
    );
    assert_eq!(
        evaluate_formula("=IFERROR(1/0,\"none\")", &ctx).unwrap(),
        Value::Text("none".into())
    );
}

/// Test compile failures surface as parse errors
#[test]
fn test_parse_failures() {
    let ctx = EvaluationContext::simple();
    assert!(matches!(
        evaluate_formula("1+2", &ctx),
        Err(FormulaError::Parse(gridcalc::ParseError::MissingEquals))
    ));
    assert!(matches!(
        evaluate_formula("=FROBNICATE(1)", &ctx),
        Err(FormulaError::Parse(gridcalc::ParseError::UnsupportedFunction(_)))
    ));
}

/// Test formula evaluation with cell references
#[test]
fn test_evaluate_with_cell_references() {
    let wb = inventory();

    assert_eq!(eval(&wb, "=B2"), Value::Number(3.0));
    assert_eq!(eval(&wb, "=B2+B4"), Value::Number(15.0));
    assert_eq!(eval(&wb, "=B4>B2"), Value::Bool(true));
    assert_eq!(eval(&wb, "=A2&\"s\""), Value::Text("apples".into()));
    // Empty cells read as zero in arithmetic
    assert_eq!(eval(&wb, "=Z99+1"), Value::Number(1.0));
    assert_eq!(eval(&wb, "=Z99"), Value::Number(0.0));
}

/// Test functions over range references
#[test]
fn test_evaluate_with_ranges() {
    let wb = inventory();

    assert_eq!(eval(&wb, "=SUM(B2:B4)"), Value::Number(15.0));
    assert_eq!(eval(&wb, "=COUNT(A1:C4)"), Value::Number(6.0));
    assert_eq!(eval(&wb, "=COUNTA(A1:C4)"), Value::Number(12.0));
    assert_eq!(eval(&wb, "=MAX(C2:C4)"), Value::Number(0.75));
    assert_eq!(eval(&wb, "=COUNTIF(B2:B4,\">0\")"), Value::Number(2.0));
    assert_close(eval(&wb, "=SUMPRODUCT(B2:B4,C2:C4)"), 3.9);
    assert_close(eval(&wb, "=SUM(B:B)"), 15.0);
}

/// Test lookups
#[test]
fn test_lookup_functions() {
    let wb = inventory();

    assert_eq!(
        eval(&wb, "=VLOOKUP(\"pear\",A2:C4,3,FALSE)"),
        Value::Number(0.75)
    );
    assert_eq!(
        eval(&wb, "=VLOOKUP(\"kiwi\",A2:C4,2,FALSE)"),
        Value::Error(ErrorKind::Na)
    );
    assert_eq!(eval(&wb, "=MATCH(\"plum\",A1:A4,0)"), Value::Number(4.0));
    assert_eq!(eval(&wb, "=INDEX(A1:C4,2,1)"), Value::Text("apple".into()));
    assert_eq!(eval(&wb, "=ROWS(A1:C4)*COLUMNS(A1:C4)"), Value::Number(12.0));
}

/// Test array formulas produce the whole array
#[test]
fn test_array_formula() {
    let wb = inventory();
    assert_eq!(
        eval(&wb, "{=B2:B4*2}"),
        Value::Array(vec![
            vec![Value::Number(6.0)],
            vec![Value::Number(0.0)],
            vec![Value::Number(24.0)],
        ])
    );
    assert_close(eval(&wb, "{=SUM(B2:B4*C2:C4)}"), 3.9);
}

/// Test 3-D references and sheet-qualified references
#[test]
fn test_multi_sheet_references() {
    let mut wb = Workbook::new();
    for name in ["Feb", "Mar"] {
        wb.add_worksheet_with_name(name).unwrap();
    }
    for (index, amount) in [(0usize, 100.0), (1, 200.0), (2, 300.0)] {
        wb.worksheet_mut(index)
            .unwrap()
            .set_cell_value("B2", amount)
            .unwrap();
    }
    wb.rename_worksheet(0, "Jan").unwrap();

    assert_eq!(eval(&wb, "=SUM(Jan:Mar!B2)"), Value::Number(600.0));
    assert_eq!(eval(&wb, "=Feb!B2-Jan!B2"), Value::Number(100.0));
    assert_eq!(eval(&wb, "=Missing!B2"), Value::Error(ErrorKind::Ref));
}

/// Test defined names
#[test]
fn test_defined_names() {
    let mut wb = inventory();
    wb.define_name("Quantities", "=Sheet1!$B$2:$B$4").unwrap();
    wb.define_name("TaxRate", "=0.25").unwrap();

    assert_eq!(eval(&wb, "=SUM(Quantities)"), Value::Number(15.0));
    assert_eq!(eval(&wb, "=100*TaxRate"), Value::Number(25.0));
    assert_eq!(eval(&wb, "=Unknown+1"), Value::Error(ErrorKind::Name));
}

/// Test Analysis ToolPak add-ins dispatch by name
#[test]
fn test_addin_functions() {
    let ctx = EvaluationContext::simple();
    assert_eq!(
        evaluate_formula("=DEC2BIN(5,8)", &ctx).unwrap(),
        Value::Text("00000101".into())
    );
    assert_eq!(
        evaluate_formula("=HEX2DEC(\"FF\")", &ctx).unwrap(),
        Value::Number(255.0)
    );
    assert_eq!(
        evaluate_formula("=GCD(12,18)+LCM(4,6)", &ctx).unwrap(),
        Value::Number(18.0)
    );
    assert_eq!(
        evaluate_formula("=ISEVEN(4)", &ctx).unwrap(),
        Value::Bool(true)
    );
}

/// Test financial and date functions together
#[test]
fn test_financial_and_dates() {
    let ctx = EvaluationContext::simple();

    assert_close(
        evaluate_formula("=ROUND(PMT(0.1,10,1000),2)", &ctx).unwrap(),
        -162.75,
    );
    assert_close(evaluate_formula("=SLN(1000,100,9)", &ctx).unwrap(), 100.0);
    assert_eq!(
        evaluate_formula("=YEAR(DATE(2024,2,29)+1)*100+MONTH(DATE(2024,2,29)+1)", &ctx).unwrap(),
        Value::Number(202403.0)
    );
    assert_close(
        evaluate_formula("=YEARFRAC(DATE(2024,1,1),DATE(2024,7,1),2)", &ctx).unwrap(),
        182.0 / 360.0,
    );
}

/// Test recalculating a workbook end to end
#[test]
fn test_workbook_recalculation() {
    let mut wb = inventory();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_formula("D2", "=B2*C2").unwrap();
    sheet.set_cell_formula("D3", "=B3*C3").unwrap();
    sheet.set_cell_formula("D4", "=B4*C4").unwrap();
    sheet.set_cell_formula("D5", "=SUM(D2:D4)").unwrap();
    sheet.set_cell_formula("D1", "=IF(D5>3,\"big\",\"small\")").unwrap();

    let stats = wb.calculate().unwrap();
    assert_eq!(stats.formula_count, 5);
    assert_eq!(stats.cells_calculated, 5);
    assert_eq!(stats.errors, 0);
    assert!(stats.converged);

    let sheet = wb.worksheet(0).unwrap();
    match sheet.get_calculated_value_at(4, 3) {
        CellValue::Number(n) => assert!((n - 3.9).abs() < 1e-9),
        other => panic!("expected a number, got {:?}", other),
    }
    assert_eq!(sheet.get_calculated_value_at(0, 3), CellValue::text("big"));
}
