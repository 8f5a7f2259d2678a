//! Differentiation rules applied to single formulas.

use crate::{assert_approx, deriv_text, deriv_text_with, deriv_value, pos, workbook};
use tangent_formula::FunctionRegistry;

const X: f64 = 2.0;
const Y: f64 = 5.0;

/// A1 is the variable, B1 a constant, C1 the formula under test
fn with_formula(formula: &str) -> tangent_core::Workbook {
    workbook(&[("A1", "2"), ("B1", "5"), ("D1", "label"), ("C1", formula)])
}

#[test]
fn test_sum_and_difference_rules() {
    let wb = with_formula("=A1+B1");
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=1"));
    assert_eq!(deriv_text(&wb, "C1", "B1").as_deref(), Some("=1"));

    let wb = with_formula("=A1-B1");
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=1"));
    assert_eq!(deriv_text(&wb, "C1", "B1").as_deref(), Some("=-1"));
}

#[test]
fn test_product_rule() {
    let wb = with_formula("=A1*B1");
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=B1"));
    assert_eq!(deriv_text(&wb, "C1", "B1").as_deref(), Some("=A1"));
    assert_approx(deriv_value(&wb, "C1", "A1"), Y);
    assert_approx(deriv_value(&wb, "C1", "B1"), X);
}

#[test]
fn test_quotient_rule() {
    let wb = with_formula("=A1/B1");
    assert_approx(deriv_value(&wb, "C1", "A1"), 1.0 / Y);
    assert_eq!(deriv_text(&wb, "C1", "B1").as_deref(), Some("=-A1/(B1*B1)"));
    assert_approx(deriv_value(&wb, "C1", "B1"), -X / (Y * Y));
}

#[test]
fn test_power_rules() {
    let wb = with_formula("=A1^3");
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=3*A1^2"));
    assert_approx(deriv_value(&wb, "C1", "A1"), 3.0 * X * X);

    // Symbolic exponent on either side
    let wb = with_formula("=B1^A1");
    assert_approx(deriv_value(&wb, "C1", "A1"), Y.powf(X) * Y.ln());
    let wb = with_formula("=A1^B1");
    assert_approx(deriv_value(&wb, "C1", "A1"), Y * X.powf(Y - 1.0));
}

#[test]
fn test_symbolic_exponent_without_ln() {
    let wb = with_formula("=B1^A1");
    let mut registry = FunctionRegistry::new();
    registry.unregister("LN");
    assert_eq!(deriv_text_with(&wb, &registry, &pos("C1"), &pos("A1")), None);

    let wb = with_formula("=A1^3");
    assert_eq!(
        deriv_text_with(&wb, &registry, &pos("C1"), &pos("A1")).as_deref(),
        Some("=3*A1^2")
    );
}

#[test]
fn test_self_and_unrelated_references() {
    let wb = with_formula("=A1");
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=1"));

    let wb = with_formula("=B1*7+E9");
    assert_eq!(deriv_text(&wb, "C1", "A1").as_deref(), Some("=0"));
    assert_approx(deriv_value(&wb, "C1", "A1"), 0.0);
}

#[test]
fn test_text_operand_has_no_derivative() {
    let wb = with_formula("=A1*D1");
    assert_eq!(deriv_text(&wb, "C1", "A1"), None);
    assert!(deriv_value(&wb, "C1", "A1").is_nan());
}

#[test]
fn test_opaque_operators() {
    for formula in [
        "=A1>B1",
        "=A1=B1",
        "=A1&B1",
        "=A1%",
        "=SUM(A1:B1)*{1,2}",
        "=IF(A1>0,A1,0)",
        "=ABS(A1)",
    ] {
        let wb = with_formula(formula);
        assert_eq!(deriv_text(&wb, "C1", "A1"), None, "{formula}");
    }
}

#[test]
fn test_function_derivatives() {
    let cases: [(&str, f64); 9] = [
        ("=SIN(A1)", X.cos()),
        ("=COS(A1)", -X.sin()),
        ("=TAN(A1)", 1.0 / (X.cos() * X.cos())),
        ("=SQRT(A1)", 1.0 / (2.0 * X.sqrt())),
        ("=LOG10(A1)", 1.0 / (X * 10f64.ln())),
        ("=LN(A1)", 1.0 / X),
        ("=EXP(A1)", X.exp()),
        ("=SUMSQ(A1,B1)", 2.0 * X),
        ("=SIN(A1*A1)", (X * X).cos() * 2.0 * X),
    ];
    for (formula, expected) in cases {
        let wb = with_formula(formula);
        let actual = deriv_value(&wb, "C1", "A1");
        assert!(
            (actual - expected).abs() < 1e-9,
            "{formula}: expected {expected}, got {actual}"
        );
    }
}

#[test]
fn test_sum_factoring() {
    let wb = with_formula("=SUM(-SIN(A1),-SIN(A1),-SIN(A1))");
    assert_eq!(
        deriv_text(&wb, "C1", "A1").as_deref(),
        Some("=-SUM(COS(A1),COS(A1),COS(A1))")
    );

    let wb = with_formula("=SUM(3*A1^2,3*A1*B1)");
    assert_eq!(
        deriv_text(&wb, "C1", "A1").as_deref(),
        Some("=3*SUM(2*A1,B1)")
    );
    assert_approx(deriv_value(&wb, "C1", "A1"), 3.0 * (2.0 * X + Y));
}
