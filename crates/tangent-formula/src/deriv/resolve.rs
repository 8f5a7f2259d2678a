//! Differentiating through cell references

use super::Differentiator;
use crate::ast::{CellReference, EvalPos, FormulaExpr};
use crate::parser::parse_formula_at;
use crate::relocate::{relocate, RelocateInfo};
use tangent_core::CellValue;

impl Differentiator<'_> {
    /// Derivative of the value of the referenced cell
    ///
    /// The variable itself gives 1 and blank cells give 0. A formula cell is
    /// differentiated at its own position and the result moved back to `ep`.
    pub(super) fn differentiate_reference(
        &self,
        cell_ref: &CellReference,
        ep: &EvalPos,
    ) -> Option<FormulaExpr> {
        let target = cell_ref.make_absolute(Some(self.workbook()), ep)?;
        if target == *self.context().var() {
            return Some(FormulaExpr::Number(1.0));
        }

        let worksheet = self.workbook().worksheet(target.sheet)?;
        let text = match worksheet.cell_at(target.row, target.col) {
            None | Some(CellValue::Empty) => return Some(FormulaExpr::Number(0.0)),
            Some(CellValue::Formula { text, .. }) => text,
            Some(value) => return value_derivative(value),
        };

        let expr = match parse_formula_at(text, &target) {
            Ok(expr) => expr,
            Err(e) => {
                log::debug!(
                    target: super::TRACE_TARGET,
                    "cannot parse formula of {}!{}: {}",
                    worksheet.name(),
                    target.address(),
                    e
                );
                return None;
            }
        };
        let deriv = self.descend(|| self.differentiate(&expr, &target))?;

        let mut info = RelocateInfo::new(target, *ep);
        if target.sheet != ep.sheet {
            info = info.with_origin_sheet_name(worksheet.name());
        }
        Some(relocate(&deriv, &info).unwrap_or(deriv))
    }
}

/// Derivative of a literal cell value: 0 for numbers, none for anything else
fn value_derivative(value: &CellValue) -> Option<FormulaExpr> {
    value.is_number().then_some(FormulaExpr::Number(0.0))
}
