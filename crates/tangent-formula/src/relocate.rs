//! Moving expressions between cells
//!
//! A tree read at one position keeps pointing at the same cells when it is
//! reinterpreted at another, once every relative offset has been shifted by the
//! distance between the two positions.

use crate::ast::{CellReference, EvalPos, ExprTop, FormulaExpr};

/// Where an expression was written and where it is being moved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocateInfo {
    /// Position the expression's relative references are valid at
    pub origin: EvalPos,
    /// Position the relocated expression will be interpreted at
    pub target: EvalPos,
    /// Name of the origin sheet, used to qualify unqualified references
    /// when the expression changes sheets
    pub origin_sheet_name: Option<String>,
}

impl RelocateInfo {
    /// Describe a move from `origin` to `target`
    pub fn new(origin: EvalPos, target: EvalPos) -> Self {
        Self {
            origin,
            target,
            origin_sheet_name: None,
        }
    }

    /// Name the origin sheet
    pub fn with_origin_sheet_name<S: Into<String>>(mut self, name: S) -> Self {
        self.origin_sheet_name = Some(name.into());
        self
    }

    fn row_delta(&self) -> i32 {
        self.target.row as i32 - self.origin.row as i32
    }

    fn col_delta(&self) -> i32 {
        self.target.col as i32 - self.origin.col as i32
    }

    fn changes_sheet(&self) -> bool {
        self.origin.sheet != self.target.sheet
    }
}

/// Relocate `expr` as described by `info`
///
/// Returns `None` when no reference in the tree needed to change, in which
/// case `expr` is already valid at the target.
pub fn relocate(expr: &FormulaExpr, info: &RelocateInfo) -> Option<FormulaExpr> {
    let mut moved = expr.clone();
    relocate_in_place(&mut moved, info).then_some(moved)
}

impl ExprTop {
    /// Relocate the whole formula; `None` when nothing changed
    pub fn relocate(&self, info: &RelocateInfo) -> Option<ExprTop> {
        relocate(&self.expr, info).map(ExprTop::new)
    }
}

fn relocate_in_place(expr: &mut FormulaExpr, info: &RelocateInfo) -> bool {
    match expr {
        FormulaExpr::CellRef(cell_ref) => relocate_reference(cell_ref, info),
        FormulaExpr::RangeRef(range_ref) => {
            let start = relocate_reference(&mut range_ref.start, info);
            let end = relocate_reference(&mut range_ref.end, info);
            start | end
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            let left = relocate_in_place(left, info);
            let right = relocate_in_place(right, info);
            left | right
        }
        FormulaExpr::UnaryOp { operand, .. } => relocate_in_place(operand, info),
        FormulaExpr::Function { args, .. } => args
            .iter_mut()
            .fold(false, |changed, arg| relocate_in_place(arg, info) | changed),
        FormulaExpr::Array(rows) => rows
            .iter_mut()
            .flatten()
            .fold(false, |changed, item| relocate_in_place(item, info) | changed),
        FormulaExpr::Number(_)
        | FormulaExpr::String(_)
        | FormulaExpr::Boolean(_)
        | FormulaExpr::Error(_)
        | FormulaExpr::NameRef(_) => false,
    }
}

fn relocate_reference(cell_ref: &mut CellReference, info: &RelocateInfo) -> bool {
    let mut changed = false;

    if cell_ref.row_relative && info.row_delta() != 0 {
        cell_ref.row -= info.row_delta();
        changed = true;
    }
    if cell_ref.col_relative && info.col_delta() != 0 {
        cell_ref.col -= info.col_delta();
        changed = true;
    }

    if cell_ref.sheet.is_none() && info.changes_sheet() {
        if let Some(name) = &info.origin_sheet_name {
            cell_ref.sheet = Some(name.clone());
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula_at;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relocate_keeps_targets() {
        // Written at B10, moved to C20
        let origin = EvalPos::new(0, 9, 1);
        let target = EvalPos::new(0, 19, 2);
        let expr = parse_formula_at("=A1*$A$1+A$2", &origin).unwrap();

        let moved = relocate(&expr, &RelocateInfo::new(origin, target)).unwrap();
        assert_eq!(expr.to_formula_string(&origin), "=A1*$A$1+A$2");
        assert_eq!(moved.to_formula_string(&target), "=A1*$A$1+A$2");
        assert_ne!(moved, expr);
    }

    #[test]
    fn test_relocate_reports_no_change() {
        let pos = EvalPos::new(0, 3, 3);
        let expr = parse_formula_at("=SUM($A$1:$B$2)*2", &pos).unwrap();
        let info = RelocateInfo::new(pos, EvalPos::new(0, 40, 7));
        assert_eq!(relocate(&expr, &info), None);

        let relative = parse_formula_at("=B2", &pos).unwrap();
        assert_eq!(relocate(&relative, &RelocateInfo::new(pos, pos)), None);
    }

    #[test]
    fn test_relocate_across_sheets() {
        let origin = EvalPos::new(1, 0, 0);
        let target = EvalPos::new(0, 0, 0);
        let expr = parse_formula_at("=A2+Other!A3", &origin).unwrap();

        let info = RelocateInfo::new(origin, target).with_origin_sheet_name("Data");
        let moved = relocate(&expr, &info).unwrap();
        assert_eq!(moved.to_formula_string(&target), "=Data!A2+Other!A3");
    }

    #[test]
    fn test_relocate_range_and_expr_top() {
        let origin = EvalPos::new(0, 5, 0);
        let target = EvalPos::new(0, 6, 1);
        let top = ExprTop::new(parse_formula_at("=SUM(A1:B$2)", &origin).unwrap());

        let moved = top.relocate(&RelocateInfo::new(origin, target)).unwrap();
        assert_eq!(moved.to_formula_string(&target), "=SUM(A1:B$2)");
    }
}
