//! The closure transpiler: lowers an `Expr` tree into a reusable tree of
//! boxed closures instead of re-walking the AST node-by-node on every
//! evaluation.
//!
//! The original design is a two-phase decorate/collect lowering into
//! host-language *source text* that is then compiled. Rust has no safe,
//! dependency-free runtime `exec`, so this crate's reading of "transpile to
//! host-language code executing the same semantics" is: the host language
//! is Rust, and a tree of `Rc<dyn Fn(&Activation) -> Result<Value,
//! FatalError>>` closures *is* compiled Rust code, built once by
//! [`Transpiler::compile`] and invoked many times without re-matching on
//! `Expr` variants. The decorate phase's `expr_number` bookkeeping is kept
//! (see [`Transpiler::tag`]) for parity with the two-phase design even
//! though nothing here needs to substitute placeholders into generated
//! text; the "collect" phase has no separate step because each closure
//! already owns its children's closures by the time `decorate` returns.
//!
//! Grounded in the original implementation's `Transpiler` class
//! (`original_source/src/celpy/evaluation.py`, `Transpiler.walk`/`.visit_*`
//! methods from roughly line 3100 onward) for which nodes are "simple"
//! (arithmetic, comparison, member/index, literals, constructors) versus
//! "deferred" (`&&`, `||`, `?:`, macros, `has`) — deferred nodes are exactly
//! the ones whose closures must not evaluate every child eagerly.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use crate::activation::Activation;
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{EvalErrorKind, FatalError};
use crate::eval::{eval_chain, resolved_to_value, select_field};
use crate::macros;
use crate::ops;
use crate::value::{CelMap, MapKey, MessageValue, Value, error_value};

/// A compiled node: reusable across many evaluations against different
/// activations.
pub type Thunk = Rc<dyn Fn(&Activation) -> Result<Value, FatalError>>;

/// Lowers `Expr` trees into [`Thunk`] trees. Stateless beyond the
/// `expr_number` counter; one instance can compile many independent trees.
#[derive(Default)]
pub struct Transpiler {
    next_expr_number: Cell<u32>,
}

impl Transpiler {
    #[must_use]
    pub fn new() -> Self {
        Self { next_expr_number: Cell::new(0) }
    }

    /// Phase 1 (decorate) and phase 2 (collect) collapse into one
    /// post-order walk: building a node's closure after its children's
    /// closures already exist is exactly what "collect" achieves here.
    #[must_use]
    pub fn compile(&self, expr: &Expr) -> Thunk {
        self.decorate(expr)
    }

    fn tag(&self) -> u32 {
        let n = self.next_expr_number.get();
        self.next_expr_number.set(n + 1);
        n
    }

    fn decorate(&self, expr: &Expr) -> Thunk {
        let _expr_number = self.tag();
        match expr {
            Expr::Literal(lit) => {
                let v = lit.clone().into_value();
                Rc::new(move |_act| Ok(v.clone()))
            }

            Expr::Ident(_) | Expr::DotIdent(_) => {
                let expr = expr.clone();
                Rc::new(move |act| resolved_to_value(eval_chain(&expr, act)?))
            }

            Expr::MemberDot(base, field) => {
                let base_expr = (**base).clone();
                let field = field.clone();
                Rc::new(move |act| {
                    let base_resolved = eval_chain(&base_expr, act)?;
                    resolved_to_value(select_field(base_resolved, &field)?)
                })
            }

            Expr::Paren(inner) => self.decorate(inner),

            Expr::ListLit(items) => {
                let thunks: Vec<Thunk> = items.iter().map(|i| self.decorate(i)).collect();
                Rc::new(move |act| {
                    let mut values = Vec::with_capacity(thunks.len());
                    for t in &thunks {
                        let v = t(act)?;
                        if v.is_error() {
                            return Ok(v);
                        }
                        values.push(v);
                    }
                    Ok(Value::List(Arc::from(values)))
                })
            }

            Expr::MapLit(pairs) => {
                let thunks: Vec<(Thunk, Thunk)> = pairs.iter().map(|(k, v)| (self.decorate(k), self.decorate(v))).collect();
                Rc::new(move |act| {
                    let mut map = CelMap::new();
                    for (kt, vt) in &thunks {
                        let k = kt(act)?;
                        if k.is_error() {
                            return Ok(k);
                        }
                        let v = vt(act)?;
                        if v.is_error() {
                            return Ok(v);
                        }
                        let key = match MapKey::try_from_value(&k) {
                            Ok(key) => key,
                            Err(e) => return Ok(Value::Error(Arc::new(e))),
                        };
                        if let Err(e) = map.insert_unique(key, v) {
                            return Ok(Value::Error(Arc::new(e)));
                        }
                    }
                    Ok(Value::Map(Arc::new(map)))
                })
            }

            Expr::MemberObject(type_name, fields) => {
                let type_name = type_name.clone();
                let field_thunks: Vec<(String, Thunk)> = fields.iter().map(|f| (f.name.clone(), self.decorate(&f.value))).collect();
                Rc::new(move |act| {
                    let mut message = MessageValue::new(type_name.clone());
                    for (name, t) in &field_thunks {
                        let v = t(act)?;
                        if v.is_error() {
                            return Ok(v);
                        }
                        message.fields.insert(Arc::from(name.as_str()), v);
                    }
                    Ok(Value::Message(Arc::new(message)))
                })
            }

            Expr::MemberIndex(base, key) => {
                let base_t = self.decorate(base);
                let key_t = self.decorate(key);
                Rc::new(move |act| {
                    let b = base_t(act)?;
                    if b.is_error() {
                        return Ok(b);
                    }
                    let k = key_t(act)?;
                    if k.is_error() {
                        return Ok(k);
                    }
                    Ok(ops::index(&b, &k))
                })
            }

            Expr::Unary(op, inner) => {
                let op = *op;
                let t = self.decorate(inner);
                Rc::new(move |act| {
                    let v = t(act)?;
                    Ok(ops::apply_unary(op, &v))
                })
            }

            Expr::Binary(BinaryOp::And, left, right) => {
                let l = self.decorate(left);
                let r = self.decorate(right);
                Rc::new(move |act| eval_and_thunk(&l, &r, act))
            }

            Expr::Binary(BinaryOp::Or, left, right) => {
                let l = self.decorate(left);
                let r = self.decorate(right);
                Rc::new(move |act| eval_or_thunk(&l, &r, act))
            }

            Expr::Binary(op, left, right) => {
                let op = *op;
                let l = self.decorate(left);
                let r = self.decorate(right);
                Rc::new(move |act| {
                    let lv = l(act)?;
                    let rv = r(act)?;
                    Ok(ops::apply_binary(op, &lv, &rv))
                })
            }

            Expr::Conditional(cond, then_branch, else_branch) => {
                let c = self.decorate(cond);
                let t = self.decorate(then_branch);
                let e = self.decorate(else_branch);
                Rc::new(move |act| match c(act)?.as_bool_operand() {
                    Ok(true) => t(act),
                    Ok(false) => e(act),
                    Err(err) => Ok(Value::Error(Arc::new(err))),
                })
            }

            Expr::IdentArg(name, args) => self.decorate_call(name, None, args),
            Expr::DotIdentArg(name, args) => self.decorate_call(name, None, args),
            Expr::MemberDotArg(base, name, args) => self.decorate_call(name, Some(base), args),
        }
    }

    fn decorate_call(&self, name: &str, receiver_base: Option<&Expr>, args: &[Expr]) -> Thunk {
        if let Some(macro_thunk) = self.try_decorate_macro(name, receiver_base, args) {
            return macro_thunk;
        }

        let name = name.to_string();
        let receiver_t = receiver_base.map(|b| self.decorate(b));
        let arg_ts: Vec<Thunk> = args.iter().map(|a| self.decorate(a)).collect();
        Rc::new(move |act| {
            let mut values = Vec::with_capacity(arg_ts.len() + usize::from(receiver_t.is_some()));
            if let Some(rt) = &receiver_t {
                let v = rt(act)?;
                if v.is_error() {
                    return Ok(v);
                }
                values.push(v);
            }
            for t in &arg_ts {
                let v = t(act)?;
                if v.is_error() {
                    return Ok(v);
                }
                values.push(v);
            }
            match act.lookup_function(&name) {
                Some(f) => Ok(f(&values)),
                None => Ok(error_value(EvalErrorKind::UnboundFunction(name.clone()))),
            }
        })
    }

    /// Macro lowering: builds a source thunk and a body thunk once, then
    /// calls the same `macros::fold_*` combinators the interpreter uses,
    /// bridging the per-element body through a nested activation exactly
    /// as `crate::macros` does.
    fn try_decorate_macro(&self, name: &str, receiver_base: Option<&Expr>, args: &[Expr]) -> Option<Thunk> {
        match (name, receiver_base, args) {
            ("has", None, [target]) => {
                let t = self.decorate(target);
                Some(Rc::new(move |act: &Activation| match t(act) {
                    Ok(v) => Ok(Value::Bool(!v.is_error())),
                    Err(_) => Ok(Value::Bool(false)),
                }))
            }
            ("dyn", None, [inner]) => Some(self.decorate(inner)),
            ("map", Some(source), [bind_var, expr]) => self.decorate_fold(source, bind_var, expr, macros::fold_map),
            ("filter", Some(source), [bind_var, expr]) => self.decorate_fold(source, bind_var, expr, macros::fold_filter),
            ("all", Some(source), [bind_var, expr]) => self.decorate_fold(source, bind_var, expr, |e, b| macros::fold_all_exists(e, b, true)),
            ("exists", Some(source), [bind_var, expr]) => self.decorate_fold(source, bind_var, expr, |e, b| macros::fold_all_exists(e, b, false)),
            ("exists_one", Some(source), [bind_var, expr]) => self.decorate_fold(source, bind_var, expr, macros::fold_exists_one),
            ("reduce", Some(source), [acc_var, item_var, init, step]) => self.decorate_reduce(source, acc_var, item_var, init, step),
            ("min", Some(source), []) => Some(self.decorate_min(source)),
            _ => None,
        }
    }

    fn decorate_fold(
        &self,
        source: &Expr,
        bind_var: &Expr,
        expr: &Expr,
        fold: impl Fn(Vec<Value>, &mut dyn FnMut(Value) -> Result<Value, FatalError>) -> Result<Value, FatalError> + 'static,
    ) -> Option<Thunk> {
        let name = match bind_var {
            Expr::Ident(n) => n.clone(),
            _ => return None,
        };
        let source_t = self.decorate(source);
        let body_t = self.decorate(expr);
        Some(Rc::new(move |act: &Activation| {
            let source_v = source_t(act)?;
            if source_v.is_error() {
                return Ok(source_v);
            }
            let elements = match macros::source_elements(&source_v) {
                Ok(e) => e,
                Err(err) => return Ok(err),
            };
            let mut body = |element: Value| -> Result<Value, FatalError> {
                let nested = act.nested();
                nested.bind(&name, element);
                body_t(&nested)
            };
            fold(elements, &mut body)
        }))
    }

    fn decorate_reduce(&self, source: &Expr, acc_var: &Expr, item_var: &Expr, init: &Expr, step: &Expr) -> Option<Thunk> {
        let (Expr::Ident(acc_name), Expr::Ident(item_name)) = (acc_var, item_var) else {
            return None;
        };
        let acc_name = acc_name.clone();
        let item_name = item_name.clone();
        let source_t = self.decorate(source);
        let init_t = self.decorate(init);
        let step_t = self.decorate(step);
        Some(Rc::new(move |act: &Activation| {
            let source_v = source_t(act)?;
            if source_v.is_error() {
                return Ok(source_v);
            }
            let elements = match macros::source_elements(&source_v) {
                Ok(e) => e,
                Err(err) => return Ok(err),
            };
            let init_v = init_t(act)?;
            macros::fold_reduce(init_v, elements, |acc, element| {
                let nested = act.nested();
                nested.bind(&acc_name, acc);
                nested.bind(&item_name, element);
                step_t(&nested)
            })
        }))
    }

    fn decorate_min(&self, source: &Expr) -> Thunk {
        let source_t = self.decorate(source);
        Rc::new(move |act: &Activation| {
            let source_v = source_t(act)?;
            if source_v.is_error() {
                return Ok(source_v);
            }
            match macros::source_elements(&source_v) {
                Ok(elements) => macros::fold_min(elements),
                Err(err) => Ok(err),
            }
        })
    }
}

fn eval_and_thunk(left: &Thunk, right: &Thunk, act: &Activation) -> Result<Value, FatalError> {
    let left_v = left(act)?;
    if matches!(left_v, Value::Bool(false)) {
        return Ok(Value::Bool(false));
    }
    let right_v = right(act)?;
    if matches!(right_v, Value::Bool(false)) {
        return Ok(Value::Bool(false));
    }
    match left_v.as_bool_operand() {
        Ok(l) => match right_v.as_bool_operand() {
            Ok(r) => Ok(Value::Bool(l && r)),
            Err(e) => Ok(Value::Error(Arc::new(e))),
        },
        Err(e) => Ok(Value::Error(Arc::new(e))),
    }
}

fn eval_or_thunk(left: &Thunk, right: &Thunk, act: &Activation) -> Result<Value, FatalError> {
    let left_v = left(act)?;
    if matches!(left_v, Value::Bool(true)) {
        return Ok(Value::Bool(true));
    }
    let right_v = right(act)?;
    if matches!(right_v, Value::Bool(true)) {
        return Ok(Value::Bool(true));
    }
    match left_v.as_bool_operand() {
        Ok(l) => match right_v.as_bool_operand() {
            Ok(r) => Ok(Value::Bool(l || r)),
            Err(e) => Ok(Value::Error(Arc::new(e))),
        },
        Err(e) => Ok(Value::Error(Arc::new(e))),
    }
}

/// The single seam the transpiled closure tree runs through: here it is the
/// identity over an already-`Result`-returning thunk, kept as a named call
/// site rather than inlined so a host embedding this crate has one place
/// to hang diagnostics on, matching the original implementation's
/// `result()` wrapper.
pub fn result(activation: &Activation, thunk: &Thunk) -> Result<Value, FatalError> {
    thunk(activation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal, Node};
    use crate::error::EvalErrorKind;
    use crate::eval::eval;
    use crate::ops::base_function_table;

    fn activation() -> Activation {
        Activation::new(Rc::new(base_function_table()))
    }

    fn assert_equivalent(expr: Expr) {
        let act = activation();
        let interpreted = eval(&Node::new(expr.clone()), &act).unwrap();
        let transpiler = Transpiler::new();
        let thunk = transpiler.compile(&expr);
        let transpiled = result(&act, &thunk).unwrap();
        assert_eq!(interpreted, transpiled);
    }

    #[test]
    fn arithmetic_matches_the_evaluator() {
        assert_equivalent(Expr::Binary(
            BinaryOp::Mul,
            Expr::Literal(Literal::Int(7)).boxed(),
            Expr::Paren(Expr::Binary(BinaryOp::Add, Expr::Literal(Literal::Int(3)).boxed(), Expr::Literal(Literal::Int(3)).boxed()).boxed()).boxed(),
        ));
    }

    #[test]
    fn short_circuit_or_matches_the_evaluator() {
        assert_equivalent(Expr::Binary(
            BinaryOp::Or,
            Expr::Binary(BinaryOp::Div, Expr::Literal(Literal::Int(2)).boxed(), Expr::Literal(Literal::Int(0)).boxed()).boxed(),
            Expr::Literal(Literal::Bool(true)).boxed(),
        ));
    }

    #[test]
    fn compiled_closure_is_reusable_across_activations() {
        let transpiler = Transpiler::new();
        let expr = Expr::Binary(BinaryOp::Add, Expr::Ident("x".to_string()).boxed(), Expr::Literal(Literal::Int(1)).boxed());
        let thunk = transpiler.compile(&expr);

        let act1 = activation();
        act1.bind("x", Value::Int(1));
        let act2 = activation();
        act2.bind("x", Value::Int(41));

        assert_eq!(result(&act1, &thunk).unwrap(), Value::Int(2));
        assert_eq!(result(&act2, &thunk).unwrap(), Value::Int(42));
    }

    #[test]
    fn map_macro_matches_the_evaluator() {
        let list = Expr::ListLit(vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2)), Expr::Literal(Literal::Int(3))]);
        assert_equivalent(Expr::MemberDotArg(
            list.boxed(),
            "map".to_string(),
            vec![Expr::Ident("n".to_string()), Expr::Binary(BinaryOp::Div, Expr::Ident("n".to_string()).boxed(), Expr::Literal(Literal::Int(2)).boxed())],
        ));
    }

    #[test]
    fn unbound_function_is_an_error_in_the_compiled_tree() {
        let act = activation();
        let transpiler = Transpiler::new();
        let thunk = transpiler.compile(&Expr::IdentArg("nope".to_string(), vec![]));
        let v = result(&act, &thunk).unwrap();
        assert!(matches!(v, Value::Error(e) if matches!(e.kind, EvalErrorKind::UnboundFunction(_))));
    }
}
