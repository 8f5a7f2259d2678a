//! Formula rendering
//!
//! Turns an expression back into A1-style formula text at a given position.
//! Parentheses are only emitted where the parser's precedence rules need them,
//! so rendered text parses back into the same tree.

use std::fmt;

use crate::ast::{
    BinaryOperator, CellReference, EvalPos, ExprTop, FormulaExpr, RangeReference, UnaryOperator,
};

// Binding strength, loosest first; mirrors the parser's precedence levels.
const PREC_SET: u8 = 0;
const PREC_COMPARISON: u8 = 1;
const PREC_CONCAT: u8 = 2;
const PREC_ADDITIVE: u8 = 3;
const PREC_MULTIPLICATIVE: u8 = 4;
const PREC_POWER: u8 = 5;
const PREC_UNARY: u8 = 6;
const PREC_RANGE: u8 = 7;
const PREC_PRIMARY: u8 = 8;

impl FormulaExpr {
    /// Render as formula text (with the leading `=`) for the cell at `pos`
    pub fn to_formula_string(&self, pos: &EvalPos) -> String {
        format!("={}", self.display_at(pos))
    }

    /// Display adapter rendering the expression (without `=`) at `pos`
    pub fn display_at<'a>(&'a self, pos: &'a EvalPos) -> impl fmt::Display + 'a {
        ExprDisplay { expr: self, pos }
    }
}

impl ExprTop {
    /// Render as formula text (with the leading `=`) for the cell at `pos`
    pub fn to_formula_string(&self, pos: &EvalPos) -> String {
        self.expr.to_formula_string(pos)
    }
}

struct ExprDisplay<'a> {
    expr: &'a FormulaExpr,
    pos: &'a EvalPos,
}

impl ExprDisplay<'_> {
    fn child<'b>(&'b self, expr: &'b FormulaExpr) -> ExprDisplay<'b> {
        ExprDisplay {
            expr,
            pos: self.pos,
        }
    }

    fn write_operand(
        &self,
        f: &mut fmt::Formatter<'_>,
        expr: &FormulaExpr,
        parens: bool,
    ) -> fmt::Result {
        if parens {
            write!(f, "({})", self.child(expr))
        } else {
            write!(f, "{}", self.child(expr))
        }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, items: &[FormulaExpr]) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            self.write_operand(f, item, precedence(item) == PREC_SET)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr {
            FormulaExpr::Number(n) => write_number(f, *n),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::Error(e) => write!(f, "{}", e),

            FormulaExpr::CellRef(cell_ref) => write_cell_ref(f, cell_ref, self.pos),
            FormulaExpr::RangeRef(range_ref) => write_range_ref(f, range_ref, self.pos),
            FormulaExpr::NameRef(name) => f.write_str(name),

            FormulaExpr::BinaryOp { op, left, right } => {
                let prec = binary_precedence(*op);
                let (left_parens, right_parens) = match op {
                    // Right associative
                    BinaryOperator::Power => (precedence(left) <= prec, precedence(right) < prec),
                    BinaryOperator::Range => (
                        precedence(left) < PREC_PRIMARY,
                        precedence(right) < PREC_PRIMARY,
                    ),
                    _ => (precedence(left) < prec, precedence(right) <= prec),
                };
                self.write_operand(f, left, left_parens)?;
                f.write_str(binary_symbol(*op))?;
                self.write_operand(f, right, right_parens)
            }

            FormulaExpr::UnaryOp { op, operand } => match op {
                UnaryOperator::Negate | UnaryOperator::Plus => {
                    f.write_str(if *op == UnaryOperator::Negate { "-" } else { "+" })?;
                    self.write_operand(f, operand, precedence(operand) < PREC_UNARY)
                }
                UnaryOperator::Percent => {
                    let is_percent = matches!(
                        operand.as_ref(),
                        FormulaExpr::UnaryOp {
                            op: UnaryOperator::Percent,
                            ..
                        }
                    );
                    let parens = !is_percent && precedence(operand) < PREC_RANGE;
                    self.write_operand(f, operand, parens)?;
                    f.write_str("%")
                }
            },

            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                self.write_list(f, args)?;
                f.write_str(")")
            }

            FormulaExpr::Array(rows) => {
                f.write_str("{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    self.write_list(f, row)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn binary_precedence(op: BinaryOperator) -> u8 {
    match op {
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEqual => PREC_COMPARISON,
        BinaryOperator::Concat => PREC_CONCAT,
        BinaryOperator::Add | BinaryOperator::Subtract => PREC_ADDITIVE,
        BinaryOperator::Multiply | BinaryOperator::Divide => PREC_MULTIPLICATIVE,
        BinaryOperator::Power => PREC_POWER,
        BinaryOperator::Range => PREC_RANGE,
        BinaryOperator::Union | BinaryOperator::Intersect => PREC_SET,
    }
}

fn binary_symbol(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Subtract => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Power => "^",
        BinaryOperator::Equal => "=",
        BinaryOperator::NotEqual => "<>",
        BinaryOperator::LessThan => "<",
        BinaryOperator::LessEqual => "<=",
        BinaryOperator::GreaterThan => ">",
        BinaryOperator::GreaterEqual => ">=",
        BinaryOperator::Concat => "&",
        BinaryOperator::Range => ":",
        BinaryOperator::Union => ",",
        BinaryOperator::Intersect => " ",
    }
}

fn precedence(expr: &FormulaExpr) -> u8 {
    match expr {
        FormulaExpr::BinaryOp { op, .. } => binary_precedence(*op),
        FormulaExpr::UnaryOp { .. } => PREC_UNARY,
        // A negative literal prints with a leading '-'
        FormulaExpr::Number(n) if n.is_sign_negative() => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() {
        write!(f, "{}", n)
    } else {
        f.write_str("#NUM!")
    }
}

fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: Option<&str>) -> fmt::Result {
    let Some(name) = sheet else {
        return Ok(());
    };
    let bare = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        write!(f, "{}!", name)
    } else {
        write!(f, "'{}'!", name.replace('\'', "''"))
    }
}

fn write_cell_ref(
    f: &mut fmt::Formatter<'_>,
    cell_ref: &CellReference,
    pos: &EvalPos,
) -> fmt::Result {
    match cell_ref.resolve(pos) {
        Some(address) => {
            write_sheet_prefix(f, cell_ref.sheet.as_deref())?;
            write!(f, "{}", address)
        }
        None => f.write_str("#REF!"),
    }
}

fn write_range_ref(
    f: &mut fmt::Formatter<'_>,
    range_ref: &RangeReference,
    pos: &EvalPos,
) -> fmt::Result {
    match (range_ref.start.resolve(pos), range_ref.end.resolve(pos)) {
        (Some(start), Some(end)) => {
            write_sheet_prefix(f, range_ref.sheet())?;
            write!(f, "{}:{}", start, end)
        }
        _ => f.write_str("#REF!"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_formula, parse_formula_at};
    use pretty_assertions::assert_eq;

    fn round_trip(formula: &str) {
        let pos = EvalPos::new(0, 4, 3);
        let ast = parse_formula_at(formula, &pos).unwrap();
        let rendered = ast.to_formula_string(&pos);
        assert_eq!(rendered, formula);
        assert_eq!(parse_formula_at(&rendered, &pos).unwrap(), ast);
    }

    #[test]
    fn test_round_trips() {
        for formula in [
            "=1+2*3",
            "=(1+2)*3",
            "=A1-(B1-C1)",
            "=A1-B1-C1",
            "=2^3^2",
            "=(2^3)^2",
            "=-A1^2",
            "=-(A1^2)",
            "=+A1",
            "=A1*-B1",
            "=(A1+B1)%",
            "=A1%%",
            "=SUM($A$1:B$3,Data!C4,'My Sheet'!$D5)",
            "=IF(A1>=0,\"a\"\"b\",FALSE)&C3",
            "={1,2;3,#N/A}",
            "=EXP(LN(A1)*2)/(1+A1)",
        ] {
            round_trip(formula);
        }
    }

    #[test]
    fn test_render_moves_with_position() {
        let ast = parse_formula_at("=A1+$A$1", &EvalPos::new(0, 9, 1)).unwrap();
        assert_eq!(ast.to_formula_string(&EvalPos::new(0, 9, 1)), "=A1+$A$1");
        assert_eq!(ast.to_formula_string(&EvalPos::new(0, 19, 2)), "=B11+$A$1");
        // Shifted off the sheet
        assert_eq!(ast.to_formula_string(&EvalPos::new(0, 0, 0)), "=#REF!+$A$1");
    }

    #[test]
    fn test_render_built_trees() {
        let pos = EvalPos::default();
        let x = FormulaExpr::CellRef(CellReference::relative(0, 1));

        let neg_const = FormulaExpr::binary(
            BinaryOperator::Multiply,
            FormulaExpr::Number(-2.0),
            x.clone(),
        );
        assert_eq!(neg_const.to_formula_string(&pos), "=-2*B1");

        let nested = FormulaExpr::binary(
            BinaryOperator::Multiply,
            FormulaExpr::Number(2.0),
            FormulaExpr::binary(BinaryOperator::Multiply, x.clone(), FormulaExpr::Number(3.0)),
        );
        assert_eq!(nested.to_formula_string(&pos), "=2*(B1*3)");
        assert_eq!(
            parse_formula(&nested.to_formula_string(&pos)).unwrap(),
            nested
        );

        let top = ExprTop::new(FormulaExpr::unary(UnaryOperator::Negate, x));
        assert_eq!(top.to_formula_string(&pos), "=-B1");
    }
}
