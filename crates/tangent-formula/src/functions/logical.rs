//! Logical functions

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use tangent_core::CellError;

/// IF(condition, value_if_true, [value_if_false])
///
/// A missing false branch yields FALSE. Text conditions are `#VALUE!`.
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let (condition, if_true) = match args {
        [condition, if_true, ..] => (condition, if_true),
        _ => {
            return Err(FormulaError::Argument(
                "IF requires at least 2 arguments".into(),
            ))
        }
    };

    let condition = match condition {
        FormulaValue::Boolean(b) => *b,
        FormulaValue::Number(n) => *n != 0.0,
        FormulaValue::Empty => false,
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };

    if condition {
        Ok(if_true.clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
    }
}
