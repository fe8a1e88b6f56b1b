//! Macro combinators: `map`, `filter`, `all`, `exists`, `exists_one`,
//! `reduce`, `min`, `has`, `dyn`.
//!
//! These are recognized *syntactically* at the call site
//! (`member.ident(bindVar, expr)` for the iteration macros, bare
//! `ident(expr)` for `has`/`dyn`) rather than dispatched through the
//! ordinary function table, because their argument-evaluation discipline
//! differs -- `bindVar` is a name, not a value, and the body expression is
//! evaluated once per element in a fresh nested [`Activation`] rather than
//! once up front. Grounded in the original implementation's
//! `member_dot_arg`/`macro_has_eval` handling
//! (`original_source/src/celpy/evaluation.py` around lines 2640-2652).
//!
//! The `fold_*` functions are the narrow interface the tree-walking
//! evaluator ([`try_eval_macro`]) and the closure transpiler
//! (`crate::transpile`) both route through — they take already-evaluated
//! elements and a per-element body closure, so they carry no opinion about
//! *how* that body gets evaluated (by re-walking an `Expr`, or by calling a
//! pre-built closure).

use std::sync::Arc;

use crate::activation::Activation;
use crate::ast::Expr;
use crate::error::{EvalErrorKind, FatalError};
use crate::eval::EvalFn;
use crate::value::{MapKey, Value, error_value};

/// Attempts to dispatch `name` as a macro. Returns `Ok(None)` when `name`
/// is not a recognized macro form (or the arity/shape doesn't match), so
/// the caller can fall through to ordinary function dispatch.
pub fn try_eval_macro(name: &str, receiver_base: Option<&Expr>, args: &[Expr], activation: &Activation, eval_expr: EvalFn) -> Result<Option<Value>, FatalError> {
    match (name, receiver_base, args) {
        ("has", None, [target]) => Ok(Some(eval_has(target, activation, eval_expr))),
        ("dyn", None, [inner]) => Ok(Some(eval_expr(inner, activation)?)),
        ("map", Some(source), [bind_var, expr]) => Ok(Some(dispatch_fold(source, bind_var, expr, activation, eval_expr, fold_map)?)),
        ("filter", Some(source), [bind_var, expr]) => Ok(Some(dispatch_fold(source, bind_var, expr, activation, eval_expr, fold_filter)?)),
        ("all", Some(source), [bind_var, expr]) => Ok(Some(dispatch_fold(source, bind_var, expr, activation, eval_expr, |elements, body| fold_all_exists(elements, body, true))?)),
        ("exists", Some(source), [bind_var, expr]) => Ok(Some(dispatch_fold(source, bind_var, expr, activation, eval_expr, |elements, body| fold_all_exists(elements, body, false))?)),
        ("exists_one", Some(source), [bind_var, expr]) => Ok(Some(dispatch_fold(source, bind_var, expr, activation, eval_expr, fold_exists_one)?)),
        ("reduce", Some(source), [acc_var, item_var, init, step]) => Ok(Some(reduce_macro(source, acc_var, item_var, init, step, activation, eval_expr)?)),
        ("min", Some(source), []) => Ok(Some(min_macro(source, activation, eval_expr)?)),
        _ => Ok(None),
    }
}

fn bind_name(expr: &Expr) -> Result<&str, FatalError> {
    match expr {
        Expr::Ident(name) => Ok(name),
        other => Err(FatalError::Syntax {
            message: format!("macro bind variable must be a bare identifier, found {other:?}"),
            position: None,
        }),
    }
}

pub(crate) fn source_elements(source: &Value) -> Result<Vec<Value>, Value> {
    match source {
        Value::List(items) => Ok(items.iter().cloned().collect()),
        Value::Map(map) => Ok(map.keys().cloned().map(MapKey::into_value).collect()),
        Value::Error(_) => Err(source.clone()),
        _ => Err(error_value(EvalErrorKind::NoSuchOverload)),
    }
}

/// Evaluates `source`, resolves it into an element vector, and -- unless
/// the source itself was an error or not iterable -- hands the elements to
/// `fold` together with a per-element body closure that binds `bind_var`
/// in a fresh nested activation and runs `expr` through `eval_expr`.
fn dispatch_fold(
    source: &Expr,
    bind_var: &Expr,
    expr: &Expr,
    activation: &Activation,
    eval_expr: EvalFn,
    fold: impl FnOnce(Vec<Value>, &mut dyn FnMut(Value) -> Result<Value, FatalError>) -> Result<Value, FatalError>,
) -> Result<Value, FatalError> {
    let name = bind_name(bind_var)?;
    let source_v = eval_expr(source, activation)?;
    if source_v.is_error() {
        return Ok(source_v);
    }
    let elements = match source_elements(&source_v) {
        Ok(e) => e,
        Err(err) => return Ok(err),
    };
    let mut body = |element: Value| -> Result<Value, FatalError> {
        let nested = activation.nested();
        nested.bind(name, element);
        eval_expr(expr, &nested)
    };
    fold(elements, &mut body)
}

/// `map(bindVar, expr)`: evaluate `expr` once per element, collecting into
/// a new list. Fails fast on the first per-element error, unlike
/// `all`/`exists`, which defer.
pub(crate) fn fold_map(elements: Vec<Value>, body: &mut dyn FnMut(Value) -> Result<Value, FatalError>) -> Result<Value, FatalError> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        let v = body(element)?;
        if v.is_error() {
            return Ok(v);
        }
        out.push(v);
    }
    Ok(Value::List(Arc::from(out)))
}

/// `filter(bindVar, expr)`: keep elements whose predicate is `true`.
pub(crate) fn fold_filter(elements: Vec<Value>, body: &mut dyn FnMut(Value) -> Result<Value, FatalError>) -> Result<Value, FatalError> {
    let mut out = Vec::new();
    for element in elements {
        let v = body(element.clone())?;
        match v.as_bool_operand() {
            Ok(true) => out.push(element),
            Ok(false) => {}
            Err(e) => return Ok(Value::Error(Arc::new(e))),
        }
    }
    Ok(Value::List(Arc::from(out)))
}

/// Shared implementation of `all` (`want_all = true`) and `exists`
/// (`want_all = false`): a deciding element (`false` for `all`, `true` for
/// `exists`) wins over any Error produced by another element, the same
/// commutative short-circuit rule `&&`/`||` use, extended to macro folds.
pub(crate) fn fold_all_exists(elements: Vec<Value>, body: &mut dyn FnMut(Value) -> Result<Value, FatalError>, want_all: bool) -> Result<Value, FatalError> {
    let deciding = !want_all;
    let mut pending_error: Option<Value> = None;
    for element in elements {
        let v = body(element)?;
        match v.as_bool_operand() {
            Ok(b) if b == deciding => return Ok(Value::Bool(deciding)),
            Ok(_) => {}
            Err(e) => {
                pending_error.get_or_insert(Value::Error(Arc::new(e)));
            }
        }
    }
    Ok(pending_error.unwrap_or(Value::Bool(want_all)))
}

/// `exists_one(bindVar, expr)`: exactly one truthy element.
pub(crate) fn fold_exists_one(elements: Vec<Value>, body: &mut dyn FnMut(Value) -> Result<Value, FatalError>) -> Result<Value, FatalError> {
    let mut count = 0i64;
    for element in elements {
        let v = body(element)?;
        match v.as_bool_operand() {
            Ok(true) => count += 1,
            Ok(false) => {}
            Err(e) => return Ok(Value::Error(Arc::new(e))),
        }
    }
    Ok(Value::Bool(count == 1))
}

/// `reduce(accVar, itemVar, init, step)`: a left fold seeded by `init`,
/// failing fast on the first error produced by `step`.
pub(crate) fn fold_reduce(init: Value, elements: Vec<Value>, mut body: impl FnMut(Value, Value) -> Result<Value, FatalError>) -> Result<Value, FatalError> {
    if init.is_error() {
        return Ok(init);
    }
    let mut acc = init;
    for element in elements {
        acc = body(acc, element)?;
        if acc.is_error() {
            return Ok(acc);
        }
    }
    Ok(acc)
}

/// `min()`: `reduce(a, i, +inf, a < i ? a : i)`, with an empty source
/// reported as an error rather than returning `+inf`.
pub(crate) fn fold_min(elements: Vec<Value>) -> Result<Value, FatalError> {
    if elements.is_empty() {
        return Ok(error_value(EvalErrorKind::InvalidArgument));
    }
    let mut acc = elements[0].clone();
    for element in &elements[1..] {
        acc = match acc.lt(element).as_bool_operand() {
            Ok(true) => acc,
            Ok(false) => element.clone(),
            Err(e) => return Ok(Value::Error(Arc::new(e))),
        };
    }
    Ok(acc)
}

fn reduce_macro(source: &Expr, acc_var: &Expr, item_var: &Expr, init: &Expr, step: &Expr, activation: &Activation, eval_expr: EvalFn) -> Result<Value, FatalError> {
    let acc_name = bind_name(acc_var)?;
    let item_name = bind_name(item_var)?;
    let source_v = eval_expr(source, activation)?;
    if source_v.is_error() {
        return Ok(source_v);
    }
    let elements = match source_elements(&source_v) {
        Ok(e) => e,
        Err(err) => return Ok(err),
    };
    let init_v = eval_expr(init, activation)?;
    fold_reduce(init_v, elements, |acc, element| {
        let nested = activation.nested();
        nested.bind(acc_name, acc);
        nested.bind(item_name, element);
        eval_expr(step, &nested)
    })
}

fn min_macro(source: &Expr, activation: &Activation, eval_expr: EvalFn) -> Result<Value, FatalError> {
    let source_v = eval_expr(source, activation)?;
    if source_v.is_error() {
        return Ok(source_v);
    }
    match source_elements(&source_v) {
        Ok(elements) => fold_min(elements),
        Err(err) => Ok(err),
    }
}

/// `has(e.f)`: true iff `e.f` evaluates without error (and, for a message
/// field, is present). Never surfaces the error or the value itself.
fn eval_has(target: &Expr, activation: &Activation, eval_expr: EvalFn) -> Value {
    match eval_expr(target, activation) {
        Ok(v) => Value::Bool(!v.is_error()),
        Err(_) => Value::Bool(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::ast::{BinaryOp, Literal, Node};
    use crate::eval::eval;
    use indexmap::IndexMap;
    use std::rc::Rc;

    fn activation() -> Activation {
        Activation::new(Rc::new(crate::ops::base_function_table()))
    }

    #[test]
    fn map_divides_each_element() {
        // "[1, 2, 3].map(n, n / 2)" => List[0, 1, 1]
        let list = Expr::ListLit(vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2)), Expr::Literal(Literal::Int(3))]);
        let e = Expr::MemberDotArg(
            list.boxed(),
            "map".to_string(),
            vec![Expr::Ident("n".to_string()), Expr::Binary(BinaryOp::Div, Expr::Ident("n".to_string()).boxed(), Expr::Literal(Literal::Int(2)).boxed())],
        );
        let result = eval(&Node::new(e), &activation()).unwrap();
        assert_eq!(result, Value::List(Arc::from([Value::Int(0), Value::Int(1), Value::Int(1)])));
    }

    #[test]
    fn filter_keeps_truthy_elements() {
        let list = Expr::ListLit(vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2)), Expr::Literal(Literal::Int(3))]);
        let e = Expr::MemberDotArg(
            list.boxed(),
            "filter".to_string(),
            vec![
                Expr::Ident("n".to_string()),
                Expr::Binary(BinaryOp::Gt, Expr::Ident("n".to_string()).boxed(), Expr::Literal(Literal::Int(1)).boxed()),
            ],
        );
        let result = eval(&Node::new(e), &activation()).unwrap();
        assert_eq!(result, Value::List(Arc::from([Value::Int(2), Value::Int(3)])));
    }

    #[test]
    fn has_is_true_on_present_map_key() {
        let map_lit = Expr::MapLit(vec![(Expr::Literal(Literal::String("a".into())), Expr::Literal(Literal::Int(1)))]);
        let present = Expr::IdentArg("has".to_string(), vec![Expr::MemberDot(map_lit.clone().boxed(), "a".to_string())]);
        assert_eq!(eval(&Node::new(present), &activation()).unwrap(), Value::Bool(true));

        let absent = Expr::IdentArg("has".to_string(), vec![Expr::MemberDot(map_lit.boxed(), "b".to_string())]);
        assert_eq!(eval(&Node::new(absent), &activation()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn all_short_circuits_on_false_despite_error() {
        let list = Expr::ListLit(vec![Expr::Literal(Literal::Int(0)), Expr::Literal(Literal::Int(1))]);
        let e = Expr::MemberDotArg(
            list.boxed(),
            "all".to_string(),
            vec![
                Expr::Ident("n".to_string()),
                Expr::Binary(BinaryOp::Gt, Expr::Binary(BinaryOp::Div, Expr::Literal(Literal::Int(1)).boxed(), Expr::Ident("n".to_string()).boxed()).boxed(), Expr::Literal(Literal::Int(0)).boxed()),
            ],
        );
        // n=0 divides by zero (Error), n=1 is false -- false wins.
        assert_eq!(eval(&Node::new(e), &activation()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn exists_one_counts_exactly_one_match() {
        let list = Expr::ListLit(vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2)), Expr::Literal(Literal::Int(3))]);
        let e = Expr::MemberDotArg(
            list.boxed(),
            "exists_one".to_string(),
            vec![Expr::Ident("n".to_string()), Expr::Binary(BinaryOp::Eq, Expr::Ident("n".to_string()).boxed(), Expr::Literal(Literal::Int(2)).boxed())],
        );
        assert_eq!(eval(&Node::new(e), &activation()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn min_over_empty_list_is_an_error() {
        let e = Expr::MemberDotArg(Expr::ListLit(vec![]).boxed(), "min".to_string(), vec![]);
        let result = eval(&Node::new(e), &activation()).unwrap();
        assert!(matches!(result, Value::Error(err) if err.kind == EvalErrorKind::InvalidArgument));
    }

    #[test]
    fn reduce_sums_a_list() {
        let list = Expr::ListLit(vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2)), Expr::Literal(Literal::Int(3))]);
        let e = Expr::MemberDotArg(
            list.boxed(),
            "reduce".to_string(),
            vec![
                Expr::Ident("acc".to_string()),
                Expr::Ident("i".to_string()),
                Expr::Literal(Literal::Int(0)),
                Expr::Binary(BinaryOp::Add, Expr::Ident("acc".to_string()).boxed(), Expr::Ident("i".to_string()).boxed()),
            ],
        );
        assert_eq!(eval(&Node::new(e), &activation()).unwrap(), Value::Int(6));
    }

    #[test]
    fn unrelated_call_falls_through_to_function_dispatch() {
        let mut table = IndexMap::new();
        let f: crate::activation::CelFunction = Rc::new(|_: &[Value]| Value::Int(7));
        table.insert("seven".to_string(), f);
        let act = Activation::new(Rc::new(table));
        let e = Expr::IdentArg("seven".to_string(), vec![]);
        assert_eq!(eval(&Node::new(e), &act).unwrap(), Value::Int(7));
    }
}
