//! Property tests over generated constants and cell values.

use crate::{deriv_value, workbook};
use proptest::prelude::*;
use tangent_core::Workbook;
use tangent_formula::deriv::sum::optimize_sum;
use tangent_formula::{
    CellReference, DerivContext, Differentiator, EvalPos, FormulaExpr, FunctionRegistry,
    UnaryOperator,
};

proptest! {
    #[test]
    fn constant_has_zero_derivative(k in any::<f64>(), row in 0u32..1000, col in 0u16..100) {
        let wb = Workbook::new();
        let registry = FunctionRegistry::new();
        let ctx = DerivContext::new(EvalPos::new(0, row, col));
        let d = Differentiator::new(&wb, &registry, &ctx);

        let ep = EvalPos::new(0, 5, 5);
        prop_assert_eq!(
            d.differentiate(&FormulaExpr::Number(k), &ep),
            Some(FormulaExpr::Number(0.0))
        );
        prop_assert_eq!(
            d.differentiate(&FormulaExpr::Boolean(k > 0.0), &ep),
            Some(FormulaExpr::Number(0.0))
        );
    }

    #[test]
    fn quadratic_slope(a in -100.0f64..100.0, b in -100.0f64..100.0, x in -100.0f64..100.0) {
        let wb = workbook(&[
            ("A1", &x.to_string()),
            ("C1", &a.to_string()),
            ("D1", &b.to_string()),
            ("B1", "=C1*A1^2+D1*A1"),
        ]);
        let expected = 2.0 * a * x + b;
        let actual = deriv_value(&wb, "B1", "A1");
        prop_assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "expected {}, got {}", expected, actual
        );
    }

    #[test]
    fn factored_negations_are_no_larger(count in 1usize..12) {
        let registry = FunctionRegistry::new();
        let args = (0..count as i32)
            .map(|i| {
                FormulaExpr::unary(
                    UnaryOperator::Negate,
                    FormulaExpr::CellRef(CellReference::relative(i, 1)),
                )
            })
            .collect();
        let call = FormulaExpr::function("SUM", args);

        let optimized = optimize_sum(&registry, &call).unwrap();
        prop_assert!(optimized.node_count() <= call.node_count());
        let inner = optimized.as_negation().unwrap();
        prop_assert_eq!(inner.function_name(), Some("SUM"));
        prop_assert_eq!(inner.args().len(), count);
    }
}
