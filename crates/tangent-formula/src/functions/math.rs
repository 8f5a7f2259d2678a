//! Math functions and their derivatives

use crate::ast::{BinaryOperator, EvalPos, FormulaExpr};
use crate::deriv::{build, sum, Differentiator};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use tangent_core::CellError;

/// Fold every number in the arguments, looking inside arrays
///
/// Text, booleans and blanks are skipped; the first error wins.
fn fold_numbers(
    args: &[FormulaValue],
    init: f64,
    mut f: impl FnMut(f64, f64) -> f64,
) -> Result<(f64, usize), CellError> {
    let mut acc = init;
    let mut count = 0;

    let values = args.iter().flat_map(|arg| match arg {
        FormulaValue::Array(rows) => rows.iter().flatten().collect::<Vec<_>>(),
        single => vec![single],
    });
    for value in values {
        match value {
            FormulaValue::Number(n) => {
                acc = f(acc, *n);
                count += 1;
            }
            FormulaValue::Error(e) => return Err(*e),
            _ => {} // Ignore non-numeric
        }
    }

    Ok((acc, count))
}

/// Apply `f` to the single numeric argument
///
/// Blank counts as 0 and booleans as 0/1; other kinds give `#VALUE!`.
fn with_number(args: &[FormulaValue], f: impl FnOnce(f64) -> FormulaValue) -> FormulaValue {
    match args.first() {
        Some(FormulaValue::Number(n)) => f(*n),
        Some(FormulaValue::Boolean(b)) => f(if *b { 1.0 } else { 0.0 }),
        Some(FormulaValue::Empty) => f(0.0),
        Some(FormulaValue::Error(e)) => FormulaValue::Error(*e),
        _ => FormulaValue::Error(CellError::Value),
    }
}

/// A finite result, or `#NUM!`
fn finite(n: f64) -> FormulaValue {
    if n.is_finite() {
        FormulaValue::Number(n)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match fold_numbers(args, 0.0, |acc, n| acc + n) {
        Ok((sum, _)) => FormulaValue::Number(sum),
        Err(e) => FormulaValue::Error(e),
    })
}

/// SUMSQ(number, ...) - Sum of the squares of the arguments
pub fn fn_sumsq(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match fold_numbers(args, 0.0, |acc, n| acc + n * n) {
        Ok((sum, _)) => FormulaValue::Number(sum),
        Err(e) => FormulaValue::Error(e),
    })
}

/// PRODUCT(number, ...) - Product of the arguments, 0 when there are no numbers
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match fold_numbers(args, 1.0, |acc, n| acc * n) {
        Ok((_, 0)) => FormulaValue::Number(0.0),
        Ok((product, _)) => FormulaValue::Number(product),
        Err(e) => FormulaValue::Error(e),
    })
}

/// ABS(number) - Returns the absolute value of a number
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| FormulaValue::Number(n.abs())))
}

/// SQRT(number) - Returns the positive square root of a number
/// Returns #NUM! error for negative numbers
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| {
        if n >= 0.0 {
            FormulaValue::Number(n.sqrt())
        } else {
            FormulaValue::Error(CellError::Num)
        }
    }))
}

/// POWER(number, power) - Returns the result of a number raised to a power
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = match with_number(args, FormulaValue::Number) {
        FormulaValue::Number(n) => n,
        other => return Ok(other),
    };
    Ok(with_number(&args[1..], |power| finite(number.powf(power))))
}

/// EXP(number) - Returns e raised to the power of a given number
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| finite(n.exp())))
}

/// LN(number) - Returns the natural logarithm of a number
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| {
        if n > 0.0 {
            FormulaValue::Number(n.ln())
        } else {
            FormulaValue::Error(CellError::Num)
        }
    }))
}

/// LOG10(number) - Returns the base-10 logarithm of a number
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| {
        if n > 0.0 {
            FormulaValue::Number(n.log10())
        } else {
            FormulaValue::Error(CellError::Num)
        }
    }))
}

/// SIN(number) - Returns the sine of an angle (in radians)
pub fn fn_sin(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| FormulaValue::Number(n.sin())))
}

/// COS(number) - Returns the cosine of an angle (in radians)
pub fn fn_cos(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| FormulaValue::Number(n.cos())))
}

/// TAN(number) - Returns the tangent of an angle (in radians)
pub fn fn_tan(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(with_number(args, |n| finite(n.tan())))
}

/// PI() - Returns the value of pi (3.14159265358979...)
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

// === Derivatives ===

fn single_arg(call: &FormulaExpr) -> Option<&FormulaExpr> {
    match call.args() {
        [arg] => Some(arg),
        _ => None,
    }
}

/// d/dx SUM(a, b, ...) = SUM(da, db, ...), ranges expanded cell by cell
pub fn deriv_sum(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    let args = d.collect_args(call.args(), ep);
    if args.is_empty() {
        return Some(FormulaExpr::Number(0.0));
    }

    let derivs = args
        .iter()
        .map(|arg| d.differentiate(arg, ep))
        .collect::<Option<Vec<_>>>()?;
    Some(sum::sum(d.registry(), derivs))
}

/// SUMSQ(a, b, ...) is differentiated as SUM(a^2, b^2, ...)
pub fn deriv_sumsq(
    d: &Differentiator<'_>,
    call: &FormulaExpr,
    ep: &EvalPos,
) -> Option<FormulaExpr> {
    let squares = d
        .collect_args(call.args(), ep)
        .into_iter()
        .map(|arg| FormulaExpr::binary(BinaryOperator::Power, arg, FormulaExpr::Number(2.0)))
        .collect();
    let sum_def = d.registry().lookup_or_add_placeholder("SUM");
    d.differentiate(&FormulaExpr::function(&sum_def.name, squares), ep)
}

/// d/dx EXP(u) = EXP(u) * du
pub fn deriv_exp(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    d.chain(call, call.clone(), ep)
}

/// d/dx LN(u) = 1/u * du
pub fn deriv_ln(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    let arg = single_arg(call)?;
    let outer = FormulaExpr::binary(
        BinaryOperator::Divide,
        FormulaExpr::Number(1.0),
        arg.clone(),
    );
    d.chain(call, outer, ep)
}

/// d/dx LOG10(u) = 1/(u*LN(10)) * du
pub fn deriv_log10(
    d: &Differentiator<'_>,
    call: &FormulaExpr,
    ep: &EvalPos,
) -> Option<FormulaExpr> {
    let arg = single_arg(call)?;
    let ln10 = FormulaExpr::function("LN", vec![FormulaExpr::Number(10.0)]);
    let outer = build::div(FormulaExpr::Number(1.0), build::mul(arg.clone(), ln10));
    d.chain(call, outer, ep)
}

/// d/dx SQRT(u) = 1/(2*SQRT(u)) * du
pub fn deriv_sqrt(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    let outer = build::div(
        FormulaExpr::Number(1.0),
        build::mul(FormulaExpr::Number(2.0), call.clone()),
    );
    d.chain(call, outer, ep)
}

/// d/dx SIN(u) = COS(u) * du
pub fn deriv_sin(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    let arg = single_arg(call)?;
    d.chain(call, FormulaExpr::function("COS", vec![arg.clone()]), ep)
}

/// d/dx COS(u) = -SIN(u) * du
pub fn deriv_cos(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    let arg = single_arg(call)?;
    let outer = build::neg(FormulaExpr::function("SIN", vec![arg.clone()]));
    d.chain(call, outer, ep)
}

/// d/dx TAN(u) = 1/COS(u)^2 * du
pub fn deriv_tan(d: &Differentiator<'_>, call: &FormulaExpr, ep: &EvalPos) -> Option<FormulaExpr> {
    let arg = single_arg(call)?;
    let cos = FormulaExpr::function("COS", vec![arg.clone()]);
    let outer = build::div(
        FormulaExpr::Number(1.0),
        build::pow(cos, FormulaExpr::Number(2.0)),
    );
    d.chain(call, outer, ep)
}
