//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. References resolve against the
//! context's position; a referenced formula cell without a cached result is
//! parsed and evaluated at its own position.

use crate::ast::{BinaryOperator, CellReference, EvalPos, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{builtin_registry, FunctionRegistry};
use crate::parser::parse_formula_at;
use tangent_core::{CellError, CellRange, CellValue, Workbook};

/// Nesting limit for formula cells evaluated through references
pub const MAX_EVAL_DEPTH: usize = 128;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::String(s) => FormulaValue::String(s),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Error(e) => FormulaValue::Error(e),
            CellValue::Formula { cached_value, .. } => cached_value
                .map(|v| (*v).into())
                .unwrap_or(FormulaValue::Empty),
        }
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Reference to the workbook for cell lookups
    pub workbook: Option<&'a Workbook>,
    /// Functions callable from formulas
    pub registry: &'a FunctionRegistry,
    /// Position relative references are interpreted at
    pub pos: EvalPos,
    depth: usize,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context using the built-in functions
    pub fn new(workbook: Option<&'a Workbook>, pos: EvalPos) -> Self {
        Self {
            workbook,
            registry: builtin_registry(),
            pos,
            depth: 0,
        }
    }

    /// Create a simple context without workbook (for testing)
    pub fn simple() -> Self {
        Self::new(None, EvalPos::default())
    }

    /// Use `registry` for function lookups
    pub fn with_registry(mut self, registry: &'a FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Context for evaluating another cell's formula
    fn nested(&self, pos: EvalPos) -> FormulaResult<Self> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(FormulaError::CircularReference);
        }
        Ok(Self {
            workbook: self.workbook,
            registry: self.registry,
            pos,
            depth: self.depth + 1,
        })
    }

    fn sheet_index(&self, sheet: Option<&str>) -> Option<usize> {
        match sheet {
            Some(name) => self.workbook?.sheet_index(name),
            None => Some(self.pos.sheet),
        }
    }

    /// Get a cell value from the workbook
    ///
    /// Formula cells are evaluated when they carry no cached result.
    pub fn get_cell_value(
        &self,
        sheet: Option<&str>,
        row: u32,
        col: u16,
    ) -> FormulaResult<FormulaValue> {
        let workbook = match self.workbook {
            Some(wb) => wb,
            None => return Ok(FormulaValue::Empty),
        };

        let sheet_idx = match self.sheet_index(sheet) {
            Some(idx) => idx,
            None => return Ok(FormulaValue::Error(CellError::Ref)),
        };

        let worksheet = match workbook.worksheet(sheet_idx) {
            Some(ws) => ws,
            None => return Ok(FormulaValue::Error(CellError::Ref)),
        };

        match worksheet.cell_at(row, col) {
            Some(CellValue::Formula {
                text,
                cached_value: None,
            }) => {
                let pos = EvalPos::new(sheet_idx, row, col);
                let expr = parse_formula_at(text, &pos)?;
                evaluate(&expr, &self.nested(pos)?)
            }
            Some(value) => Ok(value.clone().into()),
            None => Ok(FormulaValue::Empty),
        }
    }

    /// Get a range of cell values as an array
    pub fn get_range_values(
        &self,
        sheet: Option<&str>,
        range: &CellRange,
    ) -> FormulaResult<FormulaValue> {
        if let Some(workbook) = self.workbook {
            let sheet_idx = self.sheet_index(sheet);
            if sheet_idx.and_then(|idx| workbook.worksheet(idx)).is_none() {
                return Ok(FormulaValue::Error(CellError::Ref));
            }
        }

        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row in range.start.row..=range.end.row {
            let mut cols = Vec::with_capacity(range.col_count() as usize);
            for col in range.start.col..=range.end.col {
                cols.push(self.get_cell_value(sheet, row, col)?);
            }
            rows.push(cols);
        }

        Ok(FormulaValue::Array(rows))
    }

    fn get_reference_value(&self, cell_ref: &CellReference) -> FormulaResult<FormulaValue> {
        match (cell_ref.resolve_row(&self.pos), cell_ref.resolve_col(&self.pos)) {
            (Some(row), Some(col)) => self.get_cell_value(cell_ref.sheet.as_deref(), row, col),
            _ => Ok(FormulaValue::Error(CellError::Ref)),
        }
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => ctx.get_reference_value(cell_ref),

        FormulaExpr::RangeRef(range_ref) => match range_ref.resolve(&ctx.pos) {
            Some(range) => ctx.get_range_values(range_ref.sheet(), &range),
            None => Ok(FormulaValue::Error(CellError::Ref)),
        },

        // No defined names in this workbook model
        FormulaExpr::NameRef(_) => Ok(FormulaValue::Error(CellError::Name)),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

/// Apply a numeric operator, `#VALUE!` when either side is not a number
fn arithmetic(
    left: &FormulaValue,
    right: &FormulaValue,
    f: impl FnOnce(f64, f64) -> FormulaValue,
) -> FormulaValue {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => f(l, r),
        _ => FormulaValue::Error(CellError::Value),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    // Evaluate operands first
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    // Propagate errors
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let value = match op {
        // Arithmetic operators
        BinaryOperator::Add => {
            arithmetic(&left_val, &right_val, |l, r| FormulaValue::Number(l + r))
        }
        BinaryOperator::Subtract => {
            arithmetic(&left_val, &right_val, |l, r| FormulaValue::Number(l - r))
        }
        BinaryOperator::Multiply => {
            arithmetic(&left_val, &right_val, |l, r| FormulaValue::Number(l * r))
        }
        BinaryOperator::Divide => arithmetic(&left_val, &right_val, |l, r| {
            if r == 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                FormulaValue::Number(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(&left_val, &right_val, |l, r| {
            let result = l.powf(r);
            if result.is_finite() {
                FormulaValue::Number(result)
            } else {
                // 0^-1, negative^fraction
                FormulaValue::Error(CellError::Num)
            }
        }),

        // Comparison operators
        BinaryOperator::Equal => FormulaValue::Boolean(compare_values(&left_val, &right_val) == 0),
        BinaryOperator::NotEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != 0)
        }
        BinaryOperator::LessThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) < 0)
        }
        BinaryOperator::LessEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) <= 0)
        }
        BinaryOperator::GreaterThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) > 0)
        }
        BinaryOperator::GreaterEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) >= 0)
        }

        // Concatenation
        BinaryOperator::Concat => {
            FormulaValue::String(left_val.as_string() + &right_val.as_string())
        }

        // Reference algebra only makes sense where a reference is expected
        BinaryOperator::Range | BinaryOperator::Union | BinaryOperator::Intersect => {
            return Err(FormulaError::Evaluation(
                "Range operators not supported in this context".into(),
            ))
        }
    };

    Ok(value)
}

/// Compare two values for ordering (spreadsheet-style comparison)
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> i32 {
    let left = match left {
        FormulaValue::Empty => &FormulaValue::Number(0.0),
        v => v,
    };
    let right = match right {
        FormulaValue::Empty => &FormulaValue::Number(0.0),
        v => v,
    };

    match (left, right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => match l.partial_cmp(r) {
            Some(std::cmp::Ordering::Less) => -1,
            Some(std::cmp::Ordering::Greater) => 1,
            _ => 0,
        },

        // Strings compare case-insensitively
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase()) as i32
        }

        // FALSE < TRUE
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => (*l as i32) - (*r as i32),

        // Mixed types: number < string < boolean
        (FormulaValue::Number(_), FormulaValue::String(_)) => -1,
        (FormulaValue::String(_), FormulaValue::Number(_)) => 1,
        (FormulaValue::Number(_), FormulaValue::Boolean(_)) => -1,
        (FormulaValue::Boolean(_), FormulaValue::Number(_)) => 1,
        (FormulaValue::String(_), FormulaValue::Boolean(_)) => -1,
        (FormulaValue::Boolean(_), FormulaValue::String(_)) => 1,

        _ => 0,
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    // Propagate errors
    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let n = match val.as_number() {
        Some(n) => n,
        None if op == UnaryOperator::Plus => return Ok(val),
        None => return Ok(FormulaValue::Error(CellError::Value)),
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Plus => val,
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = ctx
        .registry
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    // Check argument count
    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    // Call the function
    (func.implementation)(&evaluated_args, ctx)
}
