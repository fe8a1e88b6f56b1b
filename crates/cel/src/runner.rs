//! The public façade a host embeds: [`Environment`] declares the world an
//! expression runs against, [`Environment::program`] attaches a parsed AST
//! to it, and [`Program::interpreted_runner`]/[`Program::transpiled_runner`]
//! pick which execution path actually walks the tree.
//!
//! Grounded in the teacher's `Runner`/`Exception`-at-the-boundary shape: the
//! core evaluator keeps `Error` as data internally, and only this outermost
//! layer turns a [`Value::Error`] into a `Result::Err` a host can `?`
//! through. A host embeds `Environment` → `Program` → `Runner`; `evaluate`
//! raises the first-class Error as the boundary exception.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::activation::{Activation, CelFunction};
use crate::ast::{Expr, Node};
use crate::error::EvalError;
use crate::eval;
use crate::ops;
use crate::transpile::{self, Transpiler};
use crate::value::{CelType, Value};

/// A host-supplied function, registered by name into the base table an
/// [`Environment`] carries into every [`Runner`] it produces.
pub type HostFunction = CelFunction;

/// The declared world an expression evaluates against: pre-declared
/// identifier types, a package prefix for longest-prefix resolution, and a
/// function table layered over the fixed base table in `crate::ops`.
pub struct Environment {
    annotations: Vec<(String, CelType)>,
    functions: IndexMap<String, HostFunction>,
    package: Option<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            annotations: Vec::new(),
            functions: IndexMap::new(),
            package: None,
        }
    }

    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Declares `name` as having type `ty`, so referencing it before a value
    /// is bound resolves to [`crate::namespace::Resolved::Annotation`]
    /// instead of "undeclared reference".
    pub fn declare(&mut self, name: &str, ty: CelType) {
        self.annotations.push((name.to_string(), ty));
    }

    /// Registers a host function, layered over (and able to shadow) the
    /// fixed base table (`size`, `type`, the Timestamp accessors, ...).
    pub fn register_function(&mut self, name: &str, f: HostFunction) {
        self.functions.insert(name.to_string(), f);
    }

    fn base_activation(&self) -> Activation {
        let mut base = ops::base_function_table();
        for (name, f) in &self.functions {
            base.insert(name.clone(), Rc::clone(f));
        }
        let activation = Activation::new(Rc::new(base)).with_package(self.package.clone());
        for (name, ty) in &self.annotations {
            activation.load_annotation(name, ty.clone());
        }
        activation
    }

    /// Attaches `ast` to this environment, ready to be run by either
    /// runner. Cheap: no evaluation happens until `Runner::evaluate`.
    #[must_use]
    pub fn program(&self, ast: Expr) -> Program {
        Program {
            ast: Node::new(ast),
            base_activation: self.base_activation(),
        }
    }
}

/// A parsed expression paired with the environment snapshot it runs
/// against.
pub struct Program {
    ast: Node,
    base_activation: Activation,
}

impl Program {
    /// A runner that re-walks the AST on every `evaluate` call -- the
    /// reference semantics; the tree-walking Evaluator is the implementation
    /// every other execution path is checked against.
    #[must_use]
    pub fn interpreted_runner(&self) -> Runner {
        Runner {
            base_activation: self.base_activation.cloned(),
            mode: RunMode::Interpreted { ast: self.ast.clone() },
        }
    }

    /// A runner backed by a once-compiled closure tree (`crate::transpile`).
    /// Compilation happens here, not lazily on first `evaluate`, so the cost
    /// is paid once regardless of how many times the runner is reused.
    #[must_use]
    pub fn transpiled_runner(&self) -> Runner {
        let thunk = Transpiler::new().compile(&self.ast.expr);
        Runner {
            base_activation: self.base_activation.cloned(),
            mode: RunMode::Transpiled { thunk },
        }
    }
}

enum RunMode {
    Interpreted { ast: Node },
    Transpiled { thunk: transpile::Thunk },
}

/// A compiled, reusable handle to one of the two execution paths. Distinct
/// `Runner`s from the same `Program` never share activation state: each
/// `interpreted_runner`/`transpiled_runner` call clones the base activation,
/// so bindings made via `evaluate` on one runner never leak into another.
pub struct Runner {
    base_activation: Activation,
    mode: RunMode,
}

impl Runner {
    /// Binds `bindings` into a fresh copy of the program's base activation
    /// and evaluates, raising a surfaced [`Value::Error`] as a Rust
    /// `Result::Err` at this boundary: internally `Error` is data; only
    /// this public API turns it into something `?`-able.
    ///
    /// A `FatalError` here means the AST handed to `Environment::program`
    /// was not well-formed. The parser is an external collaborator and its
    /// AST trees are treated as read-only input this crate's node kinds can
    /// always walk, so a malformed tree is an invariant violation on the
    /// caller's side rather than an ordinary CEL failure.
    pub fn evaluate(&self, bindings: &[(&str, Value)]) -> Result<Value, EvalError> {
        let activation = self.base_activation.cloned();
        for (name, value) in bindings {
            activation.bind(name, value.clone());
        }
        let result = match &self.mode {
            RunMode::Interpreted { ast } => eval::eval(ast, &activation),
            RunMode::Transpiled { thunk } => transpile::result(&activation, thunk),
        };
        match result.expect("AST handed to Environment::program must be well-formed") {
            Value::Error(e) => Err((*e).clone()),
            v => Ok(v),
        }
    }
}
