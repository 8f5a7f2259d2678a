//! The variable a derivative is taken with respect to

use crate::ast::EvalPos;

/// Names the one cell being differentiated with respect to
///
/// Built once per top-level call; the walk only ever borrows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivContext {
    var: EvalPos,
}

impl DerivContext {
    /// Differentiate with respect to the cell at `var`
    pub fn new(var: EvalPos) -> Self {
        Self { var }
    }

    /// The variable cell
    pub fn var(&self) -> &EvalPos {
        &self.var
    }

    /// Point the context at another variable cell
    pub fn set_var(&mut self, var: EvalPos) {
        self.var = var;
    }
}
