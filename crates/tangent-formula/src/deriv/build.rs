//! Optimizing node constructors
//!
//! Each constructor takes its operands by value and folds a handful of
//! identities (`x+0`, `1*x`, `x^1`, ...) while building the node. Only numeric
//! literals count as constants: a sub-expression that would evaluate to zero
//! is still kept.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};

/// `a + b`
pub fn add(a: FormulaExpr, b: FormulaExpr) -> FormulaExpr {
    if a.is_number(0.0) {
        return b;
    }
    if b.is_number(0.0) {
        return a;
    }
    FormulaExpr::binary(BinaryOperator::Add, a, b)
}

/// `a - b`
pub fn sub(a: FormulaExpr, b: FormulaExpr) -> FormulaExpr {
    if b.is_number(0.0) {
        return a;
    }
    if a.is_number(0.0) {
        return neg(b);
    }
    FormulaExpr::binary(BinaryOperator::Subtract, a, b)
}

/// `a * b`
///
/// Negations are hoisted out of the product and a leading literal coefficient
/// is kept leftmost, so `(2*x)*y` becomes `2*(x*y)`.
pub fn mul(a: FormulaExpr, b: FormulaExpr) -> FormulaExpr {
    if a.is_number(1.0) || b.is_number(0.0) {
        return b;
    }
    if a.is_number(0.0) || b.is_number(1.0) {
        return a;
    }
    if a.is_number(-1.0) {
        return neg(b);
    }
    if b.is_number(-1.0) {
        return neg(a);
    }

    let a = match into_negated(a) {
        Ok(inner) => return neg(mul(inner, b)),
        Err(a) => a,
    };
    let b = match into_negated(b) {
        Ok(inner) => return neg(mul(a, inner)),
        Err(b) => b,
    };

    match into_scaled(a) {
        Ok((c, x)) => mul(FormulaExpr::Number(c), mul(x, b)),
        Err(a) => FormulaExpr::binary(BinaryOperator::Multiply, a, b),
    }
}

/// `a / b`
pub fn div(a: FormulaExpr, b: FormulaExpr) -> FormulaExpr {
    if a.is_number(0.0) || b.is_number(1.0) {
        return a;
    }
    FormulaExpr::binary(BinaryOperator::Divide, a, b)
}

/// `a ^ b`
pub fn pow(a: FormulaExpr, b: FormulaExpr) -> FormulaExpr {
    if b.is_number(1.0) {
        return a;
    }
    FormulaExpr::binary(BinaryOperator::Power, a, b)
}

/// `-a`
pub fn neg(a: FormulaExpr) -> FormulaExpr {
    if let Some(c) = a.as_number() {
        // 0.0 - c keeps -(0) a plain zero
        return FormulaExpr::Number(0.0 - c);
    }
    match into_scaled(a) {
        Ok((c, x)) => mul(FormulaExpr::Number(0.0 - c), x),
        Err(a) => FormulaExpr::unary(UnaryOperator::Negate, a),
    }
}

/// Take the operand out of a negation, or hand the expression back
fn into_negated(expr: FormulaExpr) -> Result<FormulaExpr, FormulaExpr> {
    match expr {
        FormulaExpr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => Ok(*operand),
        other => Err(other),
    }
}

/// Split `c * x` with a literal `c`, or hand the expression back
fn into_scaled(expr: FormulaExpr) -> Result<(f64, FormulaExpr), FormulaExpr> {
    match expr {
        FormulaExpr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => match left.as_number() {
            Some(c) => Ok((c, *right)),
            None => Err(FormulaExpr::BinaryOp {
                op: BinaryOperator::Multiply,
                left,
                right,
            }),
        },
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CellReference;
    use pretty_assertions::assert_eq;

    fn x() -> FormulaExpr {
        FormulaExpr::CellRef(CellReference::relative(0, 1))
    }

    fn y() -> FormulaExpr {
        FormulaExpr::CellRef(CellReference::relative(1, 0))
    }

    fn n(v: f64) -> FormulaExpr {
        FormulaExpr::Number(v)
    }

    fn negated(e: FormulaExpr) -> FormulaExpr {
        FormulaExpr::unary(UnaryOperator::Negate, e)
    }

    fn times(a: FormulaExpr, b: FormulaExpr) -> FormulaExpr {
        FormulaExpr::binary(BinaryOperator::Multiply, a, b)
    }

    #[test]
    fn test_add_sub() {
        assert_eq!(add(n(0.0), x()), x());
        assert_eq!(add(x(), n(0.0)), x());
        assert_eq!(
            add(x(), y()),
            FormulaExpr::binary(BinaryOperator::Add, x(), y())
        );

        assert_eq!(sub(x(), n(0.0)), x());
        assert_eq!(sub(n(0.0), x()), negated(x()));
        assert_eq!(sub(n(0.0), n(3.0)), n(-3.0));
        assert_eq!(
            sub(x(), y()),
            FormulaExpr::binary(BinaryOperator::Subtract, x(), y())
        );
    }

    #[test]
    fn test_mul_identities() {
        assert_eq!(mul(n(1.0), x()), x());
        assert_eq!(mul(x(), n(0.0)), n(0.0));
        assert_eq!(mul(n(0.0), x()), n(0.0));
        assert_eq!(mul(x(), n(1.0)), x());
        assert_eq!(mul(n(-1.0), x()), negated(x()));
        assert_eq!(mul(x(), n(-1.0)), negated(x()));
        assert_eq!(mul(x(), y()), times(x(), y()));
        // Literals are not folded into each other
        assert_eq!(mul(n(2.0), n(3.0)), times(n(2.0), n(3.0)));
    }

    #[test]
    fn test_mul_hoists_negation_and_coefficient() {
        assert_eq!(mul(negated(x()), y()), negated(times(x(), y())));
        assert_eq!(mul(x(), negated(y())), negated(times(x(), y())));
        assert_eq!(
            mul(times(n(2.0), x()), y()),
            times(n(2.0), times(x(), y()))
        );
        // Only a left-hand literal coefficient is recognized
        assert_eq!(
            mul(times(x(), n(2.0)), y()),
            times(times(x(), n(2.0)), y())
        );
    }

    #[test]
    fn test_div_pow() {
        assert_eq!(div(n(0.0), x()), n(0.0));
        assert_eq!(div(x(), n(1.0)), x());
        assert_eq!(
            div(n(1.0), x()),
            FormulaExpr::binary(BinaryOperator::Divide, n(1.0), x())
        );
        assert_eq!(pow(x(), n(1.0)), x());
        assert_eq!(
            pow(x(), n(2.0)),
            FormulaExpr::binary(BinaryOperator::Power, x(), n(2.0))
        );
    }

    #[test]
    fn test_neg() {
        assert_eq!(neg(n(2.5)), n(-2.5));
        assert_eq!(neg(n(0.0)), n(0.0));
        assert!(neg(n(0.0)).as_number().unwrap().is_sign_positive());
        assert_eq!(neg(times(n(3.0), x())), times(n(-3.0), x()));
        assert_eq!(neg(times(n(-1.0), x())), x());
        assert_eq!(neg(x()), negated(x()));
    }

    #[test]
    fn test_zero_is_only_a_literal() {
        let zero_valued = FormulaExpr::binary(BinaryOperator::Subtract, x(), x());
        assert_eq!(
            add(zero_valued.clone(), y()),
            FormulaExpr::binary(BinaryOperator::Add, zero_valued, y())
        );
        assert_eq!(add(FormulaExpr::Boolean(false), y()).node_count(), 3);
    }
}
