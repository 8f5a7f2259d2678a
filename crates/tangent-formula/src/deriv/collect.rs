//! Expanding range arguments into per-cell references

use crate::ast::{CellReference, EvalPos, FormulaExpr, RangeReference};
use tangent_core::{CellAddress, CellRange, Workbook, Worksheet};

/// Flatten a function's arguments for differentiation
///
/// Every range argument is replaced by one reference per non-blank cell in
/// it, in row-major order. The references carry the range's start-corner
/// `$` flags and sheet. Other arguments are cloned as they are; so is a
/// range whose sheet or corners cannot be resolved.
pub fn collect_args(args: &[FormulaExpr], ep: &EvalPos, workbook: &Workbook) -> Vec<FormulaExpr> {
    let mut collected = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FormulaExpr::RangeRef(range_ref) => match resolve_range(range_ref, ep, workbook) {
                Some((range, worksheet)) => {
                    collected.extend(
                        occupied_cells(&range, worksheet)
                            .map(|addr| FormulaExpr::CellRef(reference_to(&range_ref.start, addr, ep))),
                    );
                }
                None => collected.push(arg.clone()),
            },
            other => collected.push(other.clone()),
        }
    }
    collected
}

fn resolve_range<'w>(
    range_ref: &RangeReference,
    ep: &EvalPos,
    workbook: &'w Workbook,
) -> Option<(CellRange, &'w Worksheet)> {
    let range = range_ref.resolve(ep)?;
    let sheet = range_ref.start.resolve_sheet(Some(workbook), ep)?;
    Some((range, workbook.worksheet(sheet)?))
}

/// Non-blank cells of `range`, row by row
fn occupied_cells<'w>(
    range: &CellRange,
    worksheet: &'w Worksheet,
) -> Box<dyn Iterator<Item = CellAddress> + 'w> {
    let range = *range;
    // Walk whichever side is smaller: the range or the stored cells
    if range.cell_count() <= worksheet.cell_count() as u64 {
        Box::new(range.cells().filter(move |addr| {
            worksheet
                .cell_at(addr.row, addr.col)
                .map_or(false, |value| !value.is_empty())
        }))
    } else {
        Box::new(
            worksheet
                .iter_cells()
                .filter(move |(row, col, value)| range.contains(*row, *col) && !value.is_empty())
                .map(|(row, col, _)| CellAddress::new(row, col)),
        )
    }
}

/// A reference to `addr`, encoded at `ep` with the flags and sheet of `template`
fn reference_to(template: &CellReference, addr: CellAddress, ep: &EvalPos) -> CellReference {
    CellReference {
        sheet: template.sheet.clone(),
        row: if template.row_relative {
            addr.row as i32 - ep.row as i32
        } else {
            addr.row as i32
        },
        col: if template.col_relative {
            addr.col as i32 - ep.col as i32
        } else {
            addr.col as i32
        },
        row_relative: template.row_relative,
        col_relative: template.col_relative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula_at;
    use pretty_assertions::assert_eq;

    fn rendered(args: &[FormulaExpr], ep: &EvalPos) -> Vec<String> {
        args.iter().map(|a| a.display_at(ep).to_string()).collect()
    }

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_value("B1", 2.0).unwrap();
        sheet.set_cell_value("B2", "text").unwrap();
        sheet.set_cell_formula("A3", "=A1*2").unwrap();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.worksheet_mut(1)
            .unwrap()
            .set_cell_value("C5", 9.0)
            .unwrap();
        wb
    }

    #[test]
    fn test_expands_in_row_major_order() {
        let wb = workbook();
        let ep = EvalPos::new(0, 9, 4);
        let call = parse_formula_at("=SUM(A1:B3,7)", &ep).unwrap();

        let args = collect_args(call.args(), &ep, &wb);
        assert_eq!(rendered(&args, &ep), vec!["A1", "B1", "B2", "A3", "7"]);
    }

    #[test]
    fn test_keeps_start_corner_flags_and_sheet() {
        let wb = workbook();
        let ep = EvalPos::new(0, 0, 7);
        let call = parse_formula_at("=SUM($A1:B$2,Data!$C$1:D9)", &ep).unwrap();

        let args = collect_args(call.args(), &ep, &wb);
        assert_eq!(
            rendered(&args, &ep),
            vec!["$A1", "$B1", "$B2", "Data!$C$5"]
        );
    }

    #[test]
    fn test_large_range_walks_stored_cells() {
        let wb = workbook();
        let ep = EvalPos::default();
        let call = parse_formula_at("=SUM(A1:Z1000)", &ep).unwrap();

        let args = collect_args(call.args(), &ep, &wb);
        assert_eq!(rendered(&args, &ep), vec!["A1", "B1", "B2", "A3"]);
    }

    #[test]
    fn test_unresolvable_range_is_kept() {
        let wb = workbook();
        let ep = EvalPos::default();
        let call = parse_formula_at("=SUM(Missing!A1:A2)", &ep).unwrap();

        let args = collect_args(call.args(), &ep, &wb);
        assert_eq!(args, call.args().to_vec());
    }
}
