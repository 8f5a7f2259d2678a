//! Built-in spreadsheet functions
//!
//! The registry maps upper-case names to [`FunctionDef`]s. Besides the value
//! implementation a function may carry a derivative callback, which is how the
//! differentiation engine learns the calculus of individual functions.

pub mod logical;
pub mod math;

use crate::ast::{EvalPos, FormulaExpr};
use crate::deriv::Differentiator;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tangent_core::CellError;

/// Function implementation signature
///
/// Functions can consult the evaluation context (workbook, current position)
/// to match spreadsheet semantics.
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Derivative callback signature
///
/// Receives the differentiator driving the walk, the whole call expression and
/// the position it is interpreted at. `None` means the call has no derivative.
pub type DerivativeImpl =
    fn(&Differentiator<'_>, &FormulaExpr, &EvalPos) -> Option<FormulaExpr>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: String,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
    /// Symbolic derivative, if the function has one
    pub derivative: Option<DerivativeImpl>,
    /// Created on demand for a name nothing registered
    pub placeholder: bool,
}

impl FunctionDef {
    /// A stand-in for an unknown function; it evaluates to `#NAME?`
    pub fn placeholder<S: AsRef<str>>(name: S) -> Self {
        Self {
            name: name.as_ref().to_uppercase(),
            min_args: 0,
            max_args: None,
            implementation: fn_placeholder,
            volatile: false,
            derivative: None,
            placeholder: true,
        }
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .field("derivative", &self.derivative.is_some())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

fn fn_placeholder(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Error(CellError::Name))
}

/// Function registry
///
/// Registered functions are fixed once the registry is built. Placeholders
/// can be added later through a shared reference.
pub struct FunctionRegistry {
    functions: AHashMap<String, Arc<FunctionDef>>,
    placeholders: RwLock<AHashMap<String, Arc<FunctionDef>>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_logical_functions();

        registry
    }

    /// Create a registry with no functions at all
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
            placeholders: RwLock::new(AHashMap::new()),
        }
    }

    /// Look up a function by name, including placeholders
    pub fn get(&self, name: &str) -> Option<Arc<FunctionDef>> {
        let key = name.to_uppercase();
        if let Some(def) = self.functions.get(&key) {
            return Some(Arc::clone(def));
        }
        self.placeholders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Whether a real (non-placeholder) function is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Look up a function, creating a placeholder entry when it is unknown
    pub fn lookup_or_add_placeholder(&self, name: &str) -> Arc<FunctionDef> {
        if let Some(def) = self.get(name) {
            return def;
        }

        let key = name.to_uppercase();
        let mut placeholders = self
            .placeholders
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(placeholders.entry(key).or_insert_with_key(|key| {
            log::debug!("adding placeholder for unknown function {}", key);
            Arc::new(FunctionDef::placeholder(key))
        }))
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        let key = def.name.to_uppercase();
        self.placeholders
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.functions.insert(key, Arc::new(def));
    }

    /// Remove a registered function
    pub fn unregister(&mut self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.remove(&name.to_uppercase())
    }

    /// Number of registered (non-placeholder) functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no function is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_math_functions(&mut self) {
        // SUM
        self.register(FunctionDef {
            name: "SUM".into(),
            min_args: 1,
            max_args: None,
            implementation: math::fn_sum,
            volatile: false,
            derivative: Some(math::deriv_sum),
            placeholder: false,
        });

        // SUMSQ
        self.register(FunctionDef {
            name: "SUMSQ".into(),
            min_args: 1,
            max_args: None,
            implementation: math::fn_sumsq,
            volatile: false,
            derivative: Some(math::deriv_sumsq),
            placeholder: false,
        });

        // PRODUCT
        self.register(FunctionDef {
            name: "PRODUCT".into(),
            min_args: 1,
            max_args: None,
            implementation: math::fn_product,
            volatile: false,
            derivative: None,
            placeholder: false,
        });

        // ABS
        self.register(FunctionDef {
            name: "ABS".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_abs,
            volatile: false,
            derivative: None,
            placeholder: false,
        });

        // SQRT
        self.register(FunctionDef {
            name: "SQRT".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_sqrt,
            volatile: false,
            derivative: Some(math::deriv_sqrt),
            placeholder: false,
        });

        // POWER
        self.register(FunctionDef {
            name: "POWER".into(),
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_power,
            volatile: false,
            derivative: None,
            placeholder: false,
        });

        // EXP
        self.register(FunctionDef {
            name: "EXP".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_exp,
            volatile: false,
            derivative: Some(math::deriv_exp),
            placeholder: false,
        });

        // LN
        self.register(FunctionDef {
            name: "LN".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_ln,
            volatile: false,
            derivative: Some(math::deriv_ln),
            placeholder: false,
        });

        // LOG10
        self.register(FunctionDef {
            name: "LOG10".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_log10,
            volatile: false,
            derivative: Some(math::deriv_log10),
            placeholder: false,
        });

        // SIN
        self.register(FunctionDef {
            name: "SIN".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_sin,
            volatile: false,
            derivative: Some(math::deriv_sin),
            placeholder: false,
        });

        // COS
        self.register(FunctionDef {
            name: "COS".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_cos,
            volatile: false,
            derivative: Some(math::deriv_cos),
            placeholder: false,
        });

        // TAN
        self.register(FunctionDef {
            name: "TAN".into(),
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_tan,
            volatile: false,
            derivative: Some(math::deriv_tan),
            placeholder: false,
        });

        // PI
        self.register(FunctionDef {
            name: "PI".into(),
            min_args: 0,
            max_args: Some(0),
            implementation: math::fn_pi,
            volatile: false,
            derivative: None,
            placeholder: false,
        });
    }

    fn register_logical_functions(&mut self) {
        // IF
        self.register(FunctionDef {
            name: "IF".into(),
            min_args: 2,
            max_args: Some(3),
            implementation: logical::fn_if,
            volatile: false,
            derivative: None,
            placeholder: false,
        });
    }
}

/// Registry holding every built-in function, created on first use
pub fn builtin_registry() -> &'static FunctionRegistry {
    static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}
