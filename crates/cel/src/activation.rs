//! [`Activation`]: an identifier namespace plus a layered function table.
//!
//! Grounded in the original implementation's `Activation` class
//! (`original_source/src/celpy/evaluation.py` lines 1123-1290): an
//! `Activation` seeds a [`NameContainer`] from annotations and variables,
//! layers user-supplied functions over the base function table, and carries
//! an optional package prefix for name resolution. `nested_activation`
//! pushes a child scope for macro-bound loop variables (`map`, `filter`,
//! `all`, ...).

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::namespace::{NameContainer, NameContainerRef, Resolved};
use crate::value::{CelType, Value};

/// A host or base-table function: takes already-evaluated arguments and
/// produces a `Value` (an error overload surfaces as `Value::Error`, not a
/// Rust `Result`, so it composes with the rest of the evaluator uniformly).
pub type CelFunction = Rc<dyn Fn(&[Value]) -> Value>;

#[derive(Clone)]
pub struct FunctionTable {
    local: Rc<RefCell<IndexMap<String, CelFunction>>>,
    base: Rc<IndexMap<String, CelFunction>>,
}

impl FunctionTable {
    #[must_use]
    pub fn new(base: Rc<IndexMap<String, CelFunction>>) -> Self {
        Self {
            local: Rc::new(RefCell::new(IndexMap::new())),
            base,
        }
    }

    pub fn register(&self, name: impl Into<String>, f: CelFunction) {
        self.local.borrow_mut().insert(name.into(), f);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<CelFunction> {
        self.local.borrow().get(name).cloned().or_else(|| self.base.get(name).cloned())
    }

    #[must_use]
    pub fn layered_on(&self, more_local: Rc<RefCell<IndexMap<String, CelFunction>>>) -> Self {
        Self {
            local: more_local,
            base: Rc::clone(&self.base),
        }
    }
}

/// Namespace plus function table plus package prefix: the full context an
/// [`crate::eval::Evaluator`] or transpiled closure needs to resolve a name.
#[derive(Clone)]
pub struct Activation {
    identifiers: NameContainerRef,
    functions: FunctionTable,
    package: Option<String>,
}

impl Activation {
    #[must_use]
    pub fn new(base_functions: Rc<IndexMap<String, CelFunction>>) -> Self {
        Self {
            identifiers: NameContainer::new_ref(None),
            functions: FunctionTable::new(base_functions),
            package: None,
        }
    }

    #[must_use]
    pub fn with_package(mut self, package: Option<String>) -> Self {
        self.package = package;
        self
    }

    pub fn load_annotation(&self, name: &str, annotation: CelType) {
        self.identifiers.borrow_mut().load_annotation(name, annotation);
    }

    pub fn load_value(&self, name: &str, value: Value) {
        self.identifiers.borrow_mut().load_value(name, value);
    }

    pub fn register_function(&self, name: impl Into<String>, f: CelFunction) {
        self.functions.register(name, f);
    }

    #[must_use]
    pub fn lookup_function(&self, name: &str) -> Option<CelFunction> {
        self.functions.lookup(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Resolved, EvalError> {
        if let Some(root) = name.strip_prefix('.') {
            return NameContainer::resolve_name(&self.identifiers, None, root);
        }
        NameContainer::resolve_name(&self.identifiers, self.package.as_deref(), name)
    }

    /// A deep-ish clone: identifiers get their own `NameContainer` shell
    /// (entries copied, parent shared) so mutating the clone's locals never
    /// perturbs the original, matching the original implementation's
    /// `Activation.clone`.
    #[must_use]
    pub fn cloned(&self) -> Self {
        Self {
            identifiers: NameContainer::shallow_clone(&self.identifiers),
            functions: self.functions.clone(),
            package: self.package.clone(),
        }
    }

    /// Pushes a fresh child scope chained to this activation, used by macro
    /// evaluation to bind a loop variable (`n` in `[1,2].map(n, n + 1)`)
    /// without touching the parent's namespace.
    #[must_use]
    pub fn nested(&self) -> Self {
        Self {
            identifiers: NameContainer::new_ref(Some(Rc::clone(&self.identifiers))),
            functions: self.functions.clone(),
            package: self.package.clone(),
        }
    }

    pub fn bind(&self, name: &str, value: Value) {
        self.identifiers.borrow_mut().load_value(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_base() -> Rc<IndexMap<String, CelFunction>> {
        Rc::new(IndexMap::new())
    }

    #[test]
    fn nested_activation_shadows_without_mutating_parent() {
        let parent = Activation::new(empty_base());
        parent.bind("n", Value::Int(1));
        let child = parent.nested();
        child.bind("n", Value::Int(2));
        assert_eq!(child.resolve("n").ok().map(resolved_value), Some(Value::Int(2)));
        assert_eq!(parent.resolve("n").ok().map(resolved_value), Some(Value::Int(1)));
    }

    #[test]
    fn registered_function_overrides_base() {
        let mut base = IndexMap::new();
        let base_fn: CelFunction = Rc::new(|_: &[Value]| Value::Int(0));
        base.insert("f".to_string(), base_fn);
        let activation = Activation::new(Rc::new(base));
        activation.register_function("f", Rc::new(|_: &[Value]| Value::Int(99)));
        let result = activation.lookup_function("f").unwrap()(&[]);
        assert_eq!(result, Value::Int(99));
    }

    fn resolved_value(r: Resolved) -> Value {
        match r {
            Resolved::Value(v) => v,
            _ => panic!("expected a value"),
        }
    }
}
