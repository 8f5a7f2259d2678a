//! Formula Abstract Syntax Tree types
//!
//! References are stored the way they are written relative to the cell that owns
//! the formula: a relative row or column is an offset from the [`EvalPos`] the
//! expression is interpreted at, an absolute one is a 0-based coordinate. The same
//! tree therefore means different cells at different positions, which is what lets
//! a derivative computed in one cell be moved into another.

use tangent_core::{CellAddress, CellError, Workbook, MAX_COLS, MAX_ROWS};

/// Position an expression is interpreted at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EvalPos {
    /// Worksheet index within the workbook
    pub sheet: usize,
    /// Row (0-based)
    pub row: u32,
    /// Column (0-based)
    pub col: u16,
}

impl EvalPos {
    /// Create a new evaluation position
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// Create a position from a parsed cell address
    pub fn from_address(sheet: usize, address: CellAddress) -> Self {
        Self::new(sheet, address.row, address.col)
    }

    /// The cell at this position as a plain (relative-flagged) address
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Named range or defined name
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Build a binary operation node
    pub fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> Self {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a unary operation node
    pub fn unary(op: UnaryOperator, operand: FormulaExpr) -> Self {
        FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Build a function call node; the name is stored uppercase
    pub fn function<S: AsRef<str>>(name: S, args: Vec<FormulaExpr>) -> Self {
        FormulaExpr::Function {
            name: name.as_ref().to_uppercase(),
            args,
        }
    }

    /// The value of a numeric literal
    ///
    /// Only [`FormulaExpr::Number`] counts: booleans and unevaluated
    /// sub-expressions are never treated as numeric constants.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaExpr::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is the numeric literal `value`
    pub fn is_number(&self, value: f64) -> bool {
        self.as_number() == Some(value)
    }

    /// The operand of a unary negation
    pub fn as_negation(&self) -> Option<&FormulaExpr> {
        match self {
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => Some(operand),
            _ => None,
        }
    }

    /// Split a product whose left factor is a numeric literal into `(constant, rest)`
    pub fn as_scaled(&self) -> Option<(f64, &FormulaExpr)> {
        match self {
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Multiply,
                left,
                right,
            } => left.as_number().map(|c| (c, right.as_ref())),
            _ => None,
        }
    }

    /// Function name, if this is a function call
    pub fn function_name(&self) -> Option<&str> {
        match self {
            FormulaExpr::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Arguments of a function call (empty for every other node)
    pub fn args(&self) -> &[FormulaExpr] {
        match self {
            FormulaExpr::Function { args, .. } => args,
            _ => &[],
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + match self {
            FormulaExpr::BinaryOp { left, right, .. } => left.node_count() + right.node_count(),
            FormulaExpr::UnaryOp { operand, .. } => operand.node_count(),
            FormulaExpr::Function { args, .. } => args.iter().map(Self::node_count).sum(),
            FormulaExpr::Array(rows) => rows.iter().flatten().map(Self::node_count).sum(),
            _ => 0,
        }
    }
}

/// Cell reference with optional sheet
///
/// `row`/`col` hold an offset from the evaluation position when the matching
/// `*_relative` flag is set, and an absolute 0-based coordinate otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub row: i32,
    pub col: i32,
    pub row_relative: bool,
    pub col_relative: bool,
}

impl CellReference {
    /// A fully absolute reference (`$C$3` style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            sheet: None,
            row: row as i32,
            col: col as i32,
            row_relative: false,
            col_relative: false,
        }
    }

    /// A fully relative reference given as offsets from the evaluation position
    pub fn relative(row_offset: i32, col_offset: i32) -> Self {
        Self {
            sheet: None,
            row: row_offset,
            col: col_offset,
            row_relative: true,
            col_relative: true,
        }
    }

    /// Qualify the reference with a sheet name
    pub fn with_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Encode an A1 address written in the cell at `origin`
    pub fn from_address(address: CellAddress, origin: &EvalPos) -> Self {
        let (row, row_relative) = if address.row_absolute {
            (address.row as i32, false)
        } else {
            (address.row as i32 - origin.row as i32, true)
        };
        let (col, col_relative) = if address.col_absolute {
            (address.col as i32, false)
        } else {
            (address.col as i32 - origin.col as i32, true)
        };
        Self {
            sheet: None,
            row,
            col,
            row_relative,
            col_relative,
        }
    }

    /// Row this reference points at when interpreted at `pos`
    pub fn resolve_row(&self, pos: &EvalPos) -> Option<u32> {
        let row = if self.row_relative {
            pos.row as i64 + self.row as i64
        } else {
            self.row as i64
        };
        (0..MAX_ROWS as i64).contains(&row).then_some(row as u32)
    }

    /// Column this reference points at when interpreted at `pos`
    pub fn resolve_col(&self, pos: &EvalPos) -> Option<u16> {
        let col = if self.col_relative {
            pos.col as i64 + self.col as i64
        } else {
            self.col as i64
        };
        (0..MAX_COLS as i64).contains(&col).then_some(col as u16)
    }

    /// A1 address this reference points at, keeping its `$` markers
    ///
    /// Returns `None` when the target falls outside the sheet.
    pub fn resolve(&self, pos: &EvalPos) -> Option<CellAddress> {
        Some(CellAddress::with_absolute(
            self.resolve_row(pos)?,
            self.resolve_col(pos)?,
            !self.row_relative,
            !self.col_relative,
        ))
    }

    /// Sheet index this reference points at
    ///
    /// An unqualified reference lives on `pos`'s sheet. A named sheet needs a
    /// workbook to be found in.
    pub fn resolve_sheet(&self, workbook: Option<&Workbook>, pos: &EvalPos) -> Option<usize> {
        match &self.sheet {
            None => Some(pos.sheet),
            Some(name) => workbook?.sheet_index(name),
        }
    }

    /// The absolute position of the referenced cell
    pub fn make_absolute(&self, workbook: Option<&Workbook>, pos: &EvalPos) -> Option<EvalPos> {
        Some(EvalPos::new(
            self.resolve_sheet(workbook, pos)?,
            self.resolve_row(pos)?,
            self.resolve_col(pos)?,
        ))
    }
}

/// Range reference with optional sheet
///
/// Both corners use the same encoding as [`CellReference`]; the sheet is
/// carried by `start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeReference {
    pub start: CellReference,
    pub end: CellReference,
}

impl RangeReference {
    /// Create a range reference; the end corner shares the start corner's sheet
    pub fn new(start: CellReference, end: CellReference) -> Self {
        let end = CellReference {
            sheet: start.sheet.clone(),
            ..end
        };
        Self { start, end }
    }

    /// Sheet qualifier of the range
    pub fn sheet(&self) -> Option<&str> {
        self.start.sheet.as_deref()
    }

    /// Resolve both corners at `pos` into a normalized range
    pub fn resolve(&self, pos: &EvalPos) -> Option<tangent_core::CellRange> {
        Some(tangent_core::CellRange::new(
            self.start.resolve(pos)?,
            self.end.resolve(pos)?,
        ))
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Range
    Range,
    Union,
    Intersect,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Prefix `-`
    Negate,
    /// Prefix `+`, kept so formulas render back as written
    Plus,
    /// Postfix `%`
    Percent,
}

/// A rooted expression: the whole formula of a cell
#[derive(Debug, Clone, PartialEq)]
pub struct ExprTop {
    pub expr: FormulaExpr,
}

impl ExprTop {
    /// Wrap an expression as a formula root
    pub fn new(expr: FormulaExpr) -> Self {
        Self { expr }
    }

    /// Borrow the root expression
    pub fn expr(&self) -> &FormulaExpr {
        &self.expr
    }

    /// Unwrap the root expression
    pub fn into_inner(self) -> FormulaExpr {
        self.expr
    }
}

impl From<FormulaExpr> for ExprTop {
    fn from(expr: FormulaExpr) -> Self {
        Self::new(expr)
    }
}
