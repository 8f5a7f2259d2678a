//! Common utilities for the differentiation tests.

use tangent_core::{CellAddress, Workbook};
use tangent_formula::{cell_derivative, cell_derivative_value, EvalPos, FunctionRegistry};

/// Build a one-sheet workbook from `(address, content)` pairs.
///
/// Content starting with `=` is stored as a formula, content that parses as a
/// number as a number, and anything else as text.
pub fn workbook(cells: &[(&str, &str)]) -> Workbook {
    let mut wb = Workbook::new();
    fill(&mut wb, 0, cells);
    wb
}

/// Store `cells` on sheet `index` of `wb`
pub fn fill(wb: &mut Workbook, index: usize, cells: &[(&str, &str)]) {
    let sheet = wb.worksheet_mut(index).expect("sheet should exist");
    for (address, content) in cells {
        if content.starts_with('=') {
            sheet.set_cell_formula(address, content).unwrap();
        } else if let Ok(n) = content.parse::<f64>() {
            sheet.set_cell_value(address, n).unwrap();
        } else {
            sheet.set_cell_value(address, *content).unwrap();
        }
    }
}

/// Position of `address` on sheet `sheet`
pub fn pos_on(sheet: usize, address: &str) -> EvalPos {
    EvalPos::from_address(sheet, CellAddress::parse(address).unwrap())
}

/// Position of `address` on the first sheet
pub fn pos(address: &str) -> EvalPos {
    pos_on(0, address)
}

/// Rendered derivative of cell `y` with respect to cell `x`, both on the first sheet
pub fn deriv_text(wb: &Workbook, y: &str, x: &str) -> Option<String> {
    deriv_text_with(wb, &FunctionRegistry::new(), &pos(y), &pos(x))
}

/// Rendered derivative of `y` with respect to `x` using `registry`
pub fn deriv_text_with(
    wb: &Workbook,
    registry: &FunctionRegistry,
    y: &EvalPos,
    x: &EvalPos,
) -> Option<String> {
    cell_derivative(wb, registry, y, x)
        .expect("result cell should hold a formula")
        .map(|deriv| deriv.to_formula_string(y))
}

/// Value of the derivative of cell `y` with respect to cell `x`
pub fn deriv_value(wb: &Workbook, y: &str, x: &str) -> f64 {
    cell_derivative_value(wb, &FunctionRegistry::new(), &pos(y), &pos(x))
}

/// Assert two floats agree to within a relative tolerance
#[track_caller]
pub fn assert_approx(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "Expected {expected}, got {actual}"
    );
}
