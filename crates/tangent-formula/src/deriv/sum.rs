//! Building and factoring SUM calls

use super::build;
use crate::ast::FormulaExpr;
use crate::functions::FunctionRegistry;

const SUM: &str = "SUM";

/// Whether `expr` is a call to SUM
pub fn is_sum_call(expr: &FormulaExpr) -> bool {
    expr.function_name()
        .map_or(false, |name| name.eq_ignore_ascii_case(SUM))
}

/// `SUM(args...)`, factored when possible
///
/// The SUM entry is looked up in `registry`, and added as a placeholder when
/// the registry does not know it.
pub fn sum(registry: &FunctionRegistry, args: Vec<FormulaExpr>) -> FormulaExpr {
    let def = registry.lookup_or_add_placeholder(SUM);
    let call = FormulaExpr::function(&def.name, args);
    optimize_sum(registry, &call).unwrap_or(call)
}

/// Factor a common negation or a common literal coefficient out of a SUM
///
/// `SUM(-a,-b)` becomes `-SUM(a,b)` and `SUM(2*a,2*b)` becomes `2*SUM(a,b)`.
/// Returns `None` unless every argument has the same shape (an empty SUM
/// never does).
pub fn optimize_sum(registry: &FunctionRegistry, call: &FormulaExpr) -> Option<FormulaExpr> {
    let args = call.args();
    let first = args.first()?;

    if args.iter().all(|arg| arg.as_negation().is_some()) {
        let inner = args
            .iter()
            .filter_map(FormulaExpr::as_negation)
            .cloned()
            .collect();
        return Some(build::neg(sum(registry, inner)));
    }

    let (coefficient, _) = first.as_scaled()?;
    let factored = args
        .iter()
        .map(|arg| match arg.as_scaled() {
            Some((c, rest)) if c == coefficient => Some(rest.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(build::mul(
        FormulaExpr::Number(coefficient),
        sum(registry, factored),
    ))
}
