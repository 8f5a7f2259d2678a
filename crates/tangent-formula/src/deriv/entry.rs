//! Entry points for differentiating formulas and cells

use super::{DerivContext, Differentiator, TRACE_TARGET};
use crate::ast::{EvalPos, ExprTop};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
use crate::functions::FunctionRegistry;
use crate::parser::parse_formula_at;
use tangent_core::Workbook;

/// Derivative of a rooted formula interpreted at `ep`
///
/// The variable is taken from `ctx`. Returns `None` when the formula has no
/// derivative with respect to it.
pub fn expr_top_derivative(
    workbook: &Workbook,
    registry: &FunctionRegistry,
    texpr: &ExprTop,
    ep: &EvalPos,
    ctx: &DerivContext,
) -> Option<ExprTop> {
    let result = Differentiator::new(workbook, registry, ctx)
        .differentiate(texpr.expr(), ep)
        .map(ExprTop::new);

    if log::log_enabled!(target: TRACE_TARGET, log::Level::Debug) {
        let var = ctx.var();
        let var_name = match workbook.sheet_name(var.sheet) {
            Ok(sheet) => format!("{}!{}", sheet, var.address()),
            Err(_) => var.address().to_string(),
        };
        match &result {
            Some(deriv) => log::debug!(
                target: TRACE_TARGET,
                "Derivative of {} with respect to {}: {}",
                texpr.to_formula_string(ep),
                var_name,
                deriv.to_formula_string(ep)
            ),
            None => log::debug!(
                target: TRACE_TARGET,
                "Derivative of {} with respect to {}: cannot compute.",
                texpr.to_formula_string(ep),
                var_name
            ),
        }
    }

    result
}

/// Derivative of the formula in cell `y` with respect to cell `x`
///
/// The result is positioned at `y`. `Ok(None)` means the formula has no
/// derivative; an error means `y` holds no usable formula.
pub fn cell_derivative(
    workbook: &Workbook,
    registry: &FunctionRegistry,
    y: &EvalPos,
    x: &EvalPos,
) -> FormulaResult<Option<ExprTop>> {
    let worksheet = workbook
        .worksheet(y.sheet)
        .ok_or_else(|| FormulaError::InvalidReference(format!("sheet index {}", y.sheet)))?;
    let text = worksheet
        .cell_at(y.row, y.col)
        .and_then(|value| value.formula_text())
        .ok_or_else(|| FormulaError::NotAFormula(format!("{}!{}", worksheet.name(), y.address())))?;

    let texpr = ExprTop::new(parse_formula_at(text, y)?);
    let ctx = DerivContext::new(*x);
    Ok(expr_top_derivative(workbook, registry, &texpr, y, &ctx))
}

/// Numeric value of the derivative of cell `y` with respect to cell `x`
///
/// The derivative is evaluated at `y` with the current cell values. NaN when
/// there is no derivative or it does not evaluate to a number.
pub fn cell_derivative_value(
    workbook: &Workbook,
    registry: &FunctionRegistry,
    y: &EvalPos,
    x: &EvalPos,
) -> f64 {
    let deriv = match cell_derivative(workbook, registry, y, x) {
        Ok(Some(deriv)) => deriv,
        Ok(None) => return f64::NAN,
        Err(e) => {
            log::debug!(target: TRACE_TARGET, "no derivative for {}: {}", y.address(), e);
            return f64::NAN;
        }
    };

    let ctx = EvaluationContext::new(Some(workbook), *y).with_registry(registry);
    match evaluate(deriv.expr(), &ctx) {
        Ok(FormulaValue::Number(n)) => n,
        Ok(FormulaValue::Boolean(b)) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        Ok(_) => f64::NAN,
        Err(e) => {
            log::debug!(target: TRACE_TARGET, "cannot evaluate derivative: {}", e);
            f64::NAN
        }
    }
}
