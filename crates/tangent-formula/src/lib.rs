//! # tangent-formula
//!
//! Formula trees for tangent, and their symbolic derivatives.
//!
//! This crate provides:
//! - Formula parsing (text → AST) and rendering (AST → text)
//! - Formula evaluation against a [`tangent_core::Workbook`]
//! - Relocation of relative references between cells
//! - Built-in math functions, some with derivative rules
//! - Differentiation of a formula with respect to a cell
//!
//! ## Example
//!
//! ```rust
//! use tangent_core::Workbook;
//! use tangent_formula::{builtin_registry, cell_derivative_value, EvalPos};
//!
//! let mut wb = Workbook::new();
//! let sheet = wb.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_formula("B1", "=EXP(A1)*A1").unwrap();
//!
//! let y = EvalPos::new(0, 0, 1);
//! let x = EvalPos::new(0, 0, 0);
//! let slope = cell_derivative_value(&wb, builtin_registry(), &y, &x);
//! assert!((slope - 3.0 * 2f64.exp()).abs() < 1e-9);
//! ```

pub mod ast;
pub mod deriv;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod relocate;

pub use ast::{
    BinaryOperator, CellReference, EvalPos, ExprTop, FormulaExpr, RangeReference, UnaryOperator,
};
pub use deriv::{
    cell_derivative, cell_derivative_value, expr_top_derivative, DerivContext, Differentiator,
};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, FormulaValue};
pub use functions::{builtin_registry, FunctionDef, FunctionRegistry};
pub use parser::{parse_formula, parse_formula_at};
pub use relocate::{relocate, RelocateInfo};
