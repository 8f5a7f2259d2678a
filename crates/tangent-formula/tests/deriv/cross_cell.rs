//! Differentiating through references to other formula cells.

use crate::{assert_approx, deriv_text, deriv_text_with, deriv_value, fill, pos, pos_on, workbook};
use tangent_formula::{
    builtin_registry, cell_derivative, evaluate, relocate, EvaluationContext, FormulaValue,
    FunctionRegistry, RelocateInfo,
};

#[test]
fn test_chain_through_cells() {
    // Y = X+1, Z = Y*Y
    for x in [-3.0, 0.0, 2.5, 10.0] {
        let wb = workbook(&[("A1", &x.to_string()), ("B1", "=A1+1"), ("C1", "=B1*B1")]);
        assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=B1+B1"));
        assert_approx(deriv_value(&wb, "C1", "A1"), 2.0 * (x + 1.0));
    }
}

#[test]
fn test_derivative_is_relocated() {
    let wb = workbook(&[("A1", "3"), ("B10", "=A1^2"), ("C20", "=B10*2")]);
    assert_eq!(deriv_text(&wb, "C20", "A1").as_deref(), Some("=2*(A1*2)"));
    let through_reference = deriv_value(&wb, "C20", "A1");
    assert_approx(through_reference, 12.0);

    // Same value when moving the inner derivative by hand
    let (b10, c20) = (pos("B10"), pos("C20"));
    let inner = cell_derivative(&wb, builtin_registry(), &b10, &pos("A1"))
        .unwrap()
        .unwrap();
    assert_eq!(inner.to_formula_string(&b10), "=2*A1");
    let moved = relocate(inner.expr(), &RelocateInfo::new(b10, c20)).unwrap();
    let ctx = EvaluationContext::new(Some(&wb), c20);
    match evaluate(&moved, &ctx).unwrap() {
        FormulaValue::Number(n) => assert_approx(n * 2.0, through_reference),
        other => panic!("Expected Number, got {other:?}"),
    }
}

#[test]
fn test_reference_to_other_sheet() {
    let mut wb = workbook(&[("C1", "=Data!B1+1")]);
    wb.add_worksheet_with_name("Data").unwrap();
    fill(&mut wb, 1, &[("A1", "4"), ("B1", "=A1*A1")]);

    let registry = FunctionRegistry::new();
    let (y, x) = (pos("C1"), pos_on(1, "A1"));
    assert_eq!(
        deriv_text_with(&wb, &registry, &y, &x).as_deref(),
        Some("=Data!A1+Data!A1")
    );
    assert_approx(
        tangent_formula::cell_derivative_value(&wb, &registry, &y, &x),
        8.0,
    );

    // Sheet1!A1 is a different cell
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=0"));
}

#[test]
fn test_sum_over_range() {
    let wb = workbook(&[("A1", "1"), ("A2", "=A1*A1"), ("A3", "5"), ("B1", "=SUM(A1:A3)")]);
    assert_eq!(
        deriv_text(&wb, "B1", "A1").as_deref(),
        Some("=SUM(1,A1+A1,0)")
    );
    assert_approx(deriv_value(&wb, "B1", "A1"), 3.0);

    let wb = workbook(&[("A1", "1"), ("A3", "5"), ("B1", "=SUM(A1:A3)")]);
    assert_eq!(deriv_text(&wb, "B1", "A1").as_deref(), Some("=SUM(1,0)"));
}

#[test]
fn test_empty_range_sums_to_zero() {
    let wb = workbook(&[("A1", "1"), ("B1", "=SUM(C1:C9)*A1")]);
    assert_eq!(deriv_text(&wb, "B1", "A1").as_deref(), Some("=SUM(C1:C9)"));
    assert_approx(deriv_value(&wb, "B1", "A1"), 0.0);
}

#[test]
fn test_circular_reference() {
    let wb = workbook(&[("A1", "=B1+1"), ("B1", "=A1*2"), ("C1", "1")]);
    assert_eq!(deriv_text(&wb, "A1", "C1"), None);
    assert!(deriv_value(&wb, "A1", "C1").is_nan());
}

#[test]
fn test_failing_referenced_cells() {
    let wb = workbook(&[("A1", "=1+"), ("B1", "=A1*2"), ("C1", "1")]);
    assert_eq!(deriv_text(&wb, "B1", "C1"), None);

    let wb = workbook(&[("A1", "text"), ("B1", "=A1*2"), ("C1", "1")]);
    assert_eq!(deriv_text(&wb, "B1", "C1"), None);

    let wb = workbook(&[("A1", "=\"a\"&C1"), ("B1", "=A1*2"), ("C1", "1")]);
    assert_eq!(deriv_text(&wb, "B1", "C1"), None);
}
