//! Symbolic differentiation of formulas
//!
//! Given a formula and a variable cell, the [`Differentiator`] rewrites the
//! formula's tree into the tree of its partial derivative with respect to that
//! cell. References to other formula cells are followed, differentiated at
//! their own position and relocated back, so a chain like `Z = Y*Y`,
//! `Y = X+1` differentiates all the way down to `X`.
//!
//! Every rule either produces a complete tree or gives up with `None`: there
//! are no partial results. Node construction goes through the optimizing
//! constructors in [`build`], which keep results small without a separate
//! simplification pass.
//!
//! # Example
//!
//! ```
//! use tangent_core::Workbook;
//! use tangent_formula::{builtin_registry, cell_derivative, EvalPos};
//!
//! let mut wb = Workbook::new();
//! let sheet = wb.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 3.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1^2+A1").unwrap();
//!
//! let y = EvalPos::new(0, 0, 1);
//! let x = EvalPos::new(0, 0, 0);
//! let deriv = cell_derivative(&wb, builtin_registry(), &y, &x).unwrap().unwrap();
//! assert_eq!(deriv.to_formula_string(&y), "=2*A1+1");
//! ```

pub mod build;
pub mod collect;
pub mod context;
pub mod entry;
mod resolve;
pub mod sum;

pub use collect::collect_args;
pub use context::DerivContext;
pub use entry::{cell_derivative, cell_derivative_value, expr_top_derivative};

use crate::ast::{BinaryOperator, EvalPos, FormulaExpr, UnaryOperator};
use crate::functions::FunctionRegistry;
use std::cell::Cell;
use tangent_core::Workbook;

/// Log target of the differentiation trace
pub const TRACE_TARGET: &str = "tangent_formula::deriv";

/// How many formula cells deep a derivative may follow references
pub const MAX_INDIRECTION_DEPTH: usize = 128;

/// Drives one differentiation walk
///
/// Derivative callbacks receive the differentiator so they can recurse into
/// their arguments, expand ranges and apply the chain rule.
pub struct Differentiator<'a> {
    workbook: &'a Workbook,
    registry: &'a FunctionRegistry,
    context: &'a DerivContext,
    depth: Cell<usize>,
}

impl<'a> Differentiator<'a> {
    /// Create a differentiator for the variable named by `context`
    pub fn new(
        workbook: &'a Workbook,
        registry: &'a FunctionRegistry,
        context: &'a DerivContext,
    ) -> Self {
        Self {
            workbook,
            registry,
            context,
            depth: Cell::new(0),
        }
    }

    /// Workbook references are resolved in
    pub fn workbook(&self) -> &'a Workbook {
        self.workbook
    }

    /// Functions and their derivative callbacks
    pub fn registry(&self) -> &'a FunctionRegistry {
        self.registry
    }

    /// The variable being differentiated with respect to
    pub fn context(&self) -> &'a DerivContext {
        self.context
    }

    /// Derivative of `expr` interpreted at `ep`, or `None` if it has none
    pub fn differentiate(&self, expr: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
        match expr {
            FormulaExpr::Number(_) | FormulaExpr::Boolean(_) => Some(FormulaExpr::Number(0.0)),
            FormulaExpr::String(_) | FormulaExpr::Error(_) => None,

            FormulaExpr::CellRef(cell_ref) => self.differentiate_reference(cell_ref, ep),

            FormulaExpr::UnaryOp { op, operand } => match op {
                UnaryOperator::Plus => self.differentiate(operand, ep),
                UnaryOperator::Negate => Some(build::neg(self.differentiate(operand, ep)?)),
                UnaryOperator::Percent => None,
            },

            FormulaExpr::BinaryOp { op, left, right } => {
                self.differentiate_binary(expr, *op, left, right, ep)
            }

            FormulaExpr::Function { .. } => self.differentiate_function(expr, ep),

            FormulaExpr::RangeRef(_) | FormulaExpr::NameRef(_) | FormulaExpr::Array(_) => None,
        }
    }

    /// Chain rule for a one-argument call: `outer * d(arg)`
    ///
    /// `outer` is the derivative of the function itself, evaluated at the
    /// argument. It is dropped when the argument has no derivative.
    pub fn chain(
        &self,
        call: &FormulaExpr,
        outer: FormulaExpr,
        ep: &EvalPos,
    ) -> Option<FormulaExpr> {
        let [arg] = call.args() else {
            return None;
        };
        let inner = self.differentiate(arg, ep)?;
        Some(build::mul(outer, inner))
    }

    /// Flatten range arguments into per-cell references
    pub fn collect_args(&self, args: &[FormulaExpr], ep: &EvalPos) -> Vec<FormulaExpr> {
        collect::collect_args(args, ep, self.workbook)
    }

    fn differentiate_binary(
        &self,
        expr: &FormulaExpr,
        op: BinaryOperator,
        a: &FormulaExpr,
        b: &FormulaExpr,
        ep: &EvalPos,
    ) -> Option<FormulaExpr> {
        match op {
            BinaryOperator::Add => {
                let da = self.differentiate(a, ep)?;
                let db = self.differentiate(b, ep)?;
                Some(build::add(da, db))
            }
            BinaryOperator::Subtract => {
                let da = self.differentiate(a, ep)?;
                let db = self.differentiate(b, ep)?;
                Some(build::sub(da, db))
            }
            BinaryOperator::Multiply => {
                let da = self.differentiate(a, ep)?;
                let db = self.differentiate(b, ep)?;
                Some(build::add(
                    build::mul(da, b.clone()),
                    build::mul(a.clone(), db),
                ))
            }
            BinaryOperator::Divide => {
                let da = self.differentiate(a, ep)?;
                let db = self.differentiate(b, ep)?;
                Some(build::div(
                    build::sub(build::mul(da, b.clone()), build::mul(a.clone(), db)),
                    build::mul(b.clone(), b.clone()),
                ))
            }
            BinaryOperator::Power => {
                let da = self.differentiate(a, ep)?;
                let db = self.differentiate(b, ep)?;
                self.differentiate_power(expr, a, b, da, db)
            }
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual
            | BinaryOperator::Concat
            | BinaryOperator::Range
            | BinaryOperator::Union
            | BinaryOperator::Intersect => None,
        }
    }

    fn differentiate_power(
        &self,
        expr: &FormulaExpr,
        a: &FormulaExpr,
        b: &FormulaExpr,
        da: FormulaExpr,
        db: FormulaExpr,
    ) -> Option<FormulaExpr> {
        if let Some(c) = b.as_number() {
            // c * a^(c-1) * da
            let reduced = build::pow(a.clone(), FormulaExpr::Number(c - 1.0));
            return Some(build::mul(
                build::mul(FormulaExpr::Number(c), reduced),
                da,
            ));
        }

        // a^b * (da*b/a + db*LN(a))
        let ln = self.registry.get("LN").filter(|def| !def.placeholder)?;
        let ln_a = FormulaExpr::function(&ln.name, vec![a.clone()]);
        Some(build::mul(
            expr.clone(),
            build::add(
                build::div(build::mul(da, b.clone()), a.clone()),
                build::mul(db, ln_a),
            ),
        ))
    }

    fn differentiate_function(&self, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
        let name = call.function_name()?;
        let Some(derivative) = self.registry.get(name).and_then(|def| def.derivative) else {
            log::trace!(target: TRACE_TARGET, "{} has no derivative", name);
            return None;
        };

        let result = derivative(self, call, ep)?;
        if sum::is_sum_call(&result) {
            if let Some(optimized) = sum::optimize_sum(self.registry, &result) {
                return Some(optimized);
            }
        }
        Some(result)
    }

    /// Run `f` one reference level deeper, giving up past the indirection limit
    fn descend<T>(&self, f: impl FnOnce() -> Option<T>) -> Option<T> {
        let depth = self.depth.get();
        if depth >= MAX_INDIRECTION_DEPTH {
            log::debug!(
                target: TRACE_TARGET,
                "giving up after {} levels of references",
                depth
            );
            return None;
        }
        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprTop;
    use crate::parser::parse_formula_at;
    use pretty_assertions::assert_eq;

    /// Differentiate `formula` written at B1 with respect to A1 and render it
    fn d(wb: &Workbook, registry: &FunctionRegistry, formula: &str) -> Option<String> {
        let ep = EvalPos::new(0, 0, 1);
        let ctx = DerivContext::new(EvalPos::new(0, 0, 0));
        let expr = parse_formula_at(formula, &ep).unwrap();
        Differentiator::new(wb, registry, &ctx)
            .differentiate(&expr, &ep)
            .map(|e| ExprTop::new(e).to_formula_string(&ep))
    }

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 2.0).unwrap();
        sheet.set_cell_value("C1", 5.0).unwrap();
        sheet.set_cell_value("D1", "label").unwrap();
        sheet.set_cell_value("E1", true).unwrap();
        sheet.set_cell_value("F1", tangent_core::CellError::Na).unwrap();
        wb
    }

    #[test]
    fn test_constants_and_references() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        assert_eq!(d(&wb, &registry, "=7").as_deref(), Some("=0"));
        assert_eq!(d(&wb, &registry, "=TRUE").as_deref(), Some("=0"));
        assert_eq!(d(&wb, &registry, "=\"x\""), None);
        assert_eq!(d(&wb, &registry, "=#N/A"), None);

        assert_eq!(d(&wb, &registry, "=A1").as_deref(), Some("=1"));
        assert_eq!(d(&wb, &registry, "=$A$1").as_deref(), Some("=1"));
        assert_eq!(d(&wb, &registry, "=C1").as_deref(), Some("=0"));
        assert_eq!(d(&wb, &registry, "=Z99").as_deref(), Some("=0"));
        assert_eq!(d(&wb, &registry, "=E1").as_deref(), Some("=0"));
        assert_eq!(d(&wb, &registry, "=D1"), None);
        assert_eq!(d(&wb, &registry, "=F1"), None);
        assert_eq!(d(&wb, &registry, "=Nowhere!A1"), None);
    }

    #[test]
    fn test_arithmetic_rules() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        assert_eq!(d(&wb, &registry, "=A1+C1").as_deref(), Some("=1"));
        assert_eq!(d(&wb, &registry, "=C1-A1").as_deref(), Some("=-1"));
        assert_eq!(d(&wb, &registry, "=+A1").as_deref(), Some("=1"));
        assert_eq!(d(&wb, &registry, "=-A1").as_deref(), Some("=-1"));
        assert_eq!(d(&wb, &registry, "=A1*C1").as_deref(), Some("=C1"));
        assert_eq!(d(&wb, &registry, "=A1*A1").as_deref(), Some("=A1+A1"));
        assert_eq!(d(&wb, &registry, "=A1/C1").as_deref(), Some("=C1/(C1*C1)"));
        assert_eq!(
            d(&wb, &registry, "=C1/A1").as_deref(),
            Some("=-C1/(A1*A1)")
        );
        assert_eq!(d(&wb, &registry, "=A1^3").as_deref(), Some("=3*A1^2"));
        assert_eq!(d(&wb, &registry, "=A1^2").as_deref(), Some("=2*A1"));
        assert_eq!(d(&wb, &registry, "=C1^A1").as_deref(), Some("=C1^A1*LN(C1)"));
    }

    #[test]
    fn test_symbolic_exponent_needs_ln() {
        let wb = workbook();
        let mut registry = FunctionRegistry::new();
        registry.unregister("LN");
        assert_eq!(d(&wb, &registry, "=C1^A1"), None);
        // A literal exponent does not need LN
        assert_eq!(d(&wb, &registry, "=A1^3").as_deref(), Some("=3*A1^2"));
    }

    #[test]
    fn test_opaque_operators() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        for formula in [
            "=A1=1",
            "=A1<>1",
            "=A1<1",
            "=A1<=1",
            "=A1>1",
            "=A1>=1",
            "=A1&\"x\"",
            "=A1%",
            "={1,2}",
            "=SomeName",
            "=A1:C1",
        ] {
            assert_eq!(d(&wb, &registry, formula), None, "{}", formula);
        }
    }

    #[test]
    fn test_failure_propagates() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        assert_eq!(d(&wb, &registry, "=A1+D1"), None);
        assert_eq!(d(&wb, &registry, "=D1-A1"), None);
        assert_eq!(d(&wb, &registry, "=-D1"), None);
        assert_eq!(d(&wb, &registry, "=A1*(A1>1)"), None);
        assert_eq!(d(&wb, &registry, "=(A1>1)/A1"), None);
        assert_eq!(d(&wb, &registry, "=A1^D1"), None);
        assert_eq!(d(&wb, &registry, "=D1^2"), None);
        assert_eq!(d(&wb, &registry, "=EXP(D1)"), None);
    }

    #[test]
    fn test_functions() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        assert_eq!(d(&wb, &registry, "=EXP(A1)").as_deref(), Some("=EXP(A1)"));
        assert_eq!(
            d(&wb, &registry, "=EXP(2*A1)").as_deref(),
            Some("=EXP(2*A1)*2")
        );
        assert_eq!(d(&wb, &registry, "=LN(A1)").as_deref(), Some("=1/A1"));
        assert_eq!(d(&wb, &registry, "=SIN(A1)").as_deref(), Some("=COS(A1)"));
        assert_eq!(d(&wb, &registry, "=COS(A1)").as_deref(), Some("=-SIN(A1)"));
        assert_eq!(d(&wb, &registry, "=TAN(A1)").as_deref(), Some("=1/COS(A1)^2"));
        assert_eq!(
            d(&wb, &registry, "=SQRT(A1)").as_deref(),
            Some("=1/(2*SQRT(A1))")
        );
        assert_eq!(
            d(&wb, &registry, "=LOG10(A1)").as_deref(),
            Some("=1/(A1*LN(10))")
        );
        assert_eq!(
            d(&wb, &registry, "=SUM(A1,C1,A1*3)").as_deref(),
            Some("=SUM(1,0,3)")
        );
        assert_eq!(
            d(&wb, &registry, "=SUMSQ(A1,C1)").as_deref(),
            Some("=SUM(2*A1,0)")
        );
        assert_eq!(
            d(&wb, &registry, "=SUMSQ(A1,A1)").as_deref(),
            Some("=2*SUM(A1,A1)")
        );
    }

    #[test]
    fn test_functions_without_derivative() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        assert_eq!(d(&wb, &registry, "=ABS(A1)"), None);
        assert_eq!(d(&wb, &registry, "=PI()"), None);
        assert_eq!(d(&wb, &registry, "=NOSUCH(A1)"), None);
        assert_eq!(d(&wb, &registry, "=EXP(A1,2)"), None);
    }

    #[test]
    fn test_sum_factoring() {
        let wb = workbook();
        let registry = FunctionRegistry::new();
        assert_eq!(
            d(&wb, &registry, "=SUM(-SIN(A1),-SIN(A1))").as_deref(),
            Some("=-SUM(COS(A1),COS(A1))")
        );
        assert_eq!(
            d(&wb, &registry, "=SUM(3*A1^2,3*A1*C1)").as_deref(),
            Some("=3*SUM(2*A1,C1)")
        );
        // Literal derivatives are not negations
        assert_eq!(
            d(&wb, &registry, "=SUM(-A1,-A1)").as_deref(),
            Some("=SUM(-1,-1)")
        );
    }
}
