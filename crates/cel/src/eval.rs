//! The tree-walking evaluator: the reference semantics every other
//! execution path (the transpiler's closure tree) must match exactly.
//!
//! Grounded in the original implementation's `Evaluator` class
//! (`original_source/src/celpy/evaluation.py` lines 1384 onward): `primary`
//! resolves identifiers through the Activation, `member_dot` distinguishes
//! namespace navigation from map/message field sugar, and short-circuit
//! nodes never evaluate the branch they don't need.

use std::sync::Arc;

use crate::activation::Activation;
use crate::ast::{BinaryOp, Expr, Literal, Node, UnaryOp};
use crate::error::{EvalErrorKind, FatalError};
use crate::macros;
use crate::namespace::{NameContainer, Resolved};
use crate::ops;
use crate::value::{CelMap, MapKey, Value, error_value};

/// Evaluates `node` against `activation`, returning a `Value` (which may
/// itself be [`Value::Error`] -- this function only raises [`FatalError`]
/// for a malformed AST, never for an ordinary evaluation failure).
pub fn eval(node: &Node, activation: &Activation) -> Result<Value, FatalError> {
    eval_expr(&node.expr, activation)
}

fn eval_expr(expr: &Expr, activation: &Activation) -> Result<Value, FatalError> {
    match expr {
        Expr::Literal(lit) => Ok(eval_literal(lit)),

        Expr::Ident(_) | Expr::DotIdent(_) => resolved_to_value(eval_chain(expr, activation)?),

        Expr::MemberDot(base, field) => {
            let base_resolved = eval_chain(base, activation)?;
            resolved_to_value(select_field(base_resolved, field)?)
        }

        Expr::Paren(inner) => eval_expr(inner, activation),

        Expr::ListLit(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                let v = eval_expr(item, activation)?;
                if v.is_error() {
                    return Ok(v);
                }
                values.push(v);
            }
            Ok(Value::List(Arc::from(values)))
        }

        Expr::MapLit(pairs) => {
            let mut map = CelMap::new();
            for (k, v) in pairs {
                let key_value = eval_expr(k, activation)?;
                if key_value.is_error() {
                    return Ok(key_value);
                }
                let val_value = eval_expr(v, activation)?;
                if val_value.is_error() {
                    return Ok(val_value);
                }
                let key = match MapKey::try_from_value(&key_value) {
                    Ok(k) => k,
                    Err(e) => return Ok(Value::Error(Arc::new(e))),
                };
                if let Err(e) = map.insert_unique(key, val_value) {
                    return Ok(Value::Error(Arc::new(e)));
                }
            }
            Ok(Value::Map(Arc::new(map)))
        }

        Expr::MemberObject(type_name, fields) => {
            let mut message = crate::value::MessageValue::new(type_name.clone());
            for field in fields {
                let v = eval_expr(&field.value, activation)?;
                if v.is_error() {
                    return Ok(v);
                }
                message.fields.insert(Arc::from(field.name.as_str()), v);
            }
            Ok(Value::Message(Arc::new(message)))
        }

        Expr::MemberIndex(base, key) => {
            let base_v = eval_expr(base, activation)?;
            if base_v.is_error() {
                return Ok(base_v);
            }
            let key_v = eval_expr(key, activation)?;
            if key_v.is_error() {
                return Ok(key_v);
            }
            Ok(ops::index(&base_v, &key_v))
        }

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, activation)?;
            Ok(ops::apply_unary(*op, &v))
        }

        Expr::Binary(BinaryOp::And, left, right) => eval_and(left, right, activation),
        Expr::Binary(BinaryOp::Or, left, right) => eval_or(left, right, activation),
        Expr::Binary(op, left, right) => {
            let left_v = eval_expr(left, activation)?;
            let right_v = eval_expr(right, activation)?;
            Ok(ops::apply_binary(*op, &left_v, &right_v))
        }

        Expr::Conditional(cond, then_branch, else_branch) => {
            let cond_v = eval_expr(cond, activation)?;
            match cond_v.as_bool_operand() {
                Ok(true) => eval_expr(then_branch, activation),
                Ok(false) => eval_expr(else_branch, activation),
                Err(e) => Ok(Value::Error(Arc::new(e))),
            }
        }

        Expr::IdentArg(name, args) => eval_call(name, None, args, activation),
        Expr::DotIdentArg(name, args) => eval_call(name, None, args, activation),
        Expr::MemberDotArg(base, name, args) => eval_call(name, Some(base), args, activation),
    }
}

fn eval_literal(lit: &Literal) -> Value {
    lit.clone().into_value()
}

/// `a && b`: `false && X = false`, regardless of which side produced the
/// `false` -- an `Error` on the other side never overrides a deciding
/// `false`. An `Error` is only surfaced when neither side is `false`.
fn eval_and(left: &Expr, right: &Expr, activation: &Activation) -> Result<Value, FatalError> {
    let left_v = eval_expr(left, activation)?;
    if matches!(left_v, Value::Bool(false)) {
        return Ok(Value::Bool(false));
    }
    let right_v = eval_expr(right, activation)?;
    if matches!(right_v, Value::Bool(false)) {
        return Ok(Value::Bool(false));
    }
    match (left_v.as_bool_operand(), right_v) {
        (Ok(l), right_v) => match right_v.as_bool_operand() {
            Ok(r) => Ok(Value::Bool(l && r)),
            Err(e) => Ok(Value::Error(Arc::new(e))),
        },
        (Err(e), _) => Ok(Value::Error(Arc::new(e))),
    }
}

fn eval_or(left: &Expr, right: &Expr, activation: &Activation) -> Result<Value, FatalError> {
    let left_v = eval_expr(left, activation)?;
    if matches!(left_v, Value::Bool(true)) {
        return Ok(Value::Bool(true));
    }
    let right_v = eval_expr(right, activation)?;
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

/// Walks a pure identifier/member-dot chain through the Activation's
/// namespace, falling back to ordinary evaluation (wrapped as
/// [`Resolved::Value`]) for any other expression shape. This is what lets
/// `a.b.c` prefer the longest namespace match over map-indexing sugar
/// while still letting `f().b` work as field selection on a plain value.
pub(crate) fn eval_chain(expr: &Expr, activation: &Activation) -> Result<Resolved, FatalError> {
    match expr {
        Expr::Ident(name) => Ok(activation.resolve(name).unwrap_or_else(|e| Resolved::Value(Value::Error(Arc::new(e))))),
        Expr::DotIdent(name) => {
            let dotted = format!(".{name}");
            Ok(activation.resolve(&dotted).unwrap_or_else(|e| Resolved::Value(Value::Error(Arc::new(e)))))
        }
        Expr::MemberDot(base, field) => {
            let base_resolved = eval_chain(base, activation)?;
            select_field(base_resolved, field)
        }
        other => Ok(Resolved::Value(eval_expr(other, activation)?)),
    }
}

pub(crate) fn select_field(resolved: Resolved, field: &str) -> Result<Resolved, FatalError> {
    match resolved {
        Resolved::Container(nc) => match NameContainer::find_name(&nc, std::slice::from_ref(&field)) {
            Ok(referent) => Ok(referent
                .resolved()
                .unwrap_or_else(|| Resolved::Value(error_value(EvalErrorKind::NoSuchField)))),
            Err(_) => Ok(Resolved::Value(error_value(EvalErrorKind::NoSuchField))),
        },
        Resolved::Value(v) => {
            if v.is_error() {
                Ok(Resolved::Value(v))
            } else {
                Ok(Resolved::Value(ops::select_field_value(&v, field)))
            }
        }
        Resolved::Annotation(_) => Ok(Resolved::Value(error_value(EvalErrorKind::NoFieldSelection))),
    }
}

pub(crate) fn resolved_to_value(resolved: Resolved) -> Result<Value, FatalError> {
    match resolved {
        Resolved::Value(v) => Ok(v),
        Resolved::Annotation(t) => Ok(Value::Type(t)),
        Resolved::Container(_) => Ok(error_value(EvalErrorKind::NoSuchOverload)),
    }
}

/// Free-function call (`receiver_base = None`) or receiver-style method
/// call (`a.f(args)`, `receiver_base = Some(a)`). Macro names are
/// intercepted before ordinary dispatch: `map`, `filter`, and friends are
/// never entries in the function dispatch table.
fn eval_call(name: &str, receiver_base: Option<&Expr>, args: &[Expr], activation: &Activation) -> Result<Value, FatalError> {
    if let Some(result) = macros::try_eval_macro(name, receiver_base, args, activation, eval_expr)? {
        return Ok(result);
    }

    let mut values = Vec::with_capacity(args.len() + usize::from(receiver_base.is_some()));
    if let Some(base) = receiver_base {
        let base_v = eval_expr(base, activation)?;
        if base_v.is_error() {
            return Ok(base_v);
        }
        values.push(base_v);
    }
    for a in args {
        let v = eval_expr(a, activation)?;
        if v.is_error() {
            return Ok(v);
        }
        values.push(v);
    }

    match activation.lookup_function(name) {
        Some(f) => Ok(f(&values)),
        None => Ok(error_value(EvalErrorKind::UnboundFunction(name.to_string()))),
    }
}

/// Re-exported so `crate::macros` can recurse back into ordinary evaluation
/// without a circular `pub(crate)` item; `EvalError`/`FatalError` stay in
/// scope here for call sites that need to build diagnostics by hand.
pub type EvalFn = fn(&Expr, &Activation) -> Result<Value, FatalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Activation, CelFunction};
    use indexmap::IndexMap;
    use std::rc::Rc;

    fn activation() -> Activation {
        Activation::new(Rc::new(ops::base_function_table()))
    }

    fn run(expr: Expr) -> Value {
        eval(&Node::new(expr), &activation()).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        // "7 * (3 + 3)" => Int 42
        let e = Expr::Binary(
            BinaryOp::Mul,
            Expr::Literal(Literal::Int(7)).boxed(),
            Expr::Paren(Expr::Binary(BinaryOp::Add, Expr::Literal(Literal::Int(3)).boxed(), Expr::Literal(Literal::Int(3)).boxed()).boxed()).boxed(),
        );
        assert_eq!(run(e), Value::Int(42));
    }

    #[test]
    fn short_circuit_or_absorbs_divide_by_zero() {
        // "2 / 0 || true" => Bool true
        let e = Expr::Binary(
            BinaryOp::Or,
            Expr::Binary(BinaryOp::Div, Expr::Literal(Literal::Int(2)).boxed(), Expr::Literal(Literal::Int(0)).boxed()).boxed(),
            Expr::Literal(Literal::Bool(true)).boxed(),
        );
        assert_eq!(run(e), Value::Bool(true));
    }

    #[test]
    fn short_circuit_and_absorbs_error_on_right() {
        let e = Expr::Binary(
            BinaryOp::And,
            Expr::Literal(Literal::Bool(false)).boxed(),
            Expr::Binary(BinaryOp::Div, Expr::Literal(Literal::Int(2)).boxed(), Expr::Literal(Literal::Int(0)).boxed()).boxed(),
        );
        assert_eq!(run(e), Value::Bool(false));
    }

    #[test]
    fn map_index_success_and_failure() {
        let map_expr = Expr::MapLit(vec![
            (Expr::Literal(Literal::String("a".into())), Expr::Literal(Literal::Int(1))),
            (Expr::Literal(Literal::String("b".into())), Expr::Literal(Literal::Int(2))),
        ]);
        let ok = Expr::MemberIndex(map_expr.clone().boxed(), Expr::Literal(Literal::String("a".into())).boxed());
        assert_eq!(run(ok), Value::Int(1));

        let missing = Expr::MemberIndex(map_expr.boxed(), Expr::Literal(Literal::String("c".into())).boxed());
        assert!(matches!(run(missing), Value::Error(e) if e.kind == EvalErrorKind::NoSuchKey));
    }

    #[test]
    fn overflow_is_an_error() {
        let e = Expr::Binary(BinaryOp::Add, Expr::Literal(Literal::Int(i64::MAX)).boxed(), Expr::Literal(Literal::Int(1)).boxed());
        assert!(matches!(run(e), Value::Error(err) if err.kind == EvalErrorKind::Overflow));
    }

    #[test]
    fn longest_prefix_name_resolution() {
        let act = activation();
        act.load_value("a.b", Value::String("x".into()));
        let mut inner = CelMap::new();
        inner.insert_unique(MapKey::String("b".into()), Value::String("y".into())).unwrap();
        act.load_value("a", Value::Map(Arc::new(inner)));
        let expr = Expr::MemberDot(Expr::Ident("a".to_string()).boxed(), "b".to_string());
        let result = eval(&Node::new(expr), &act).unwrap();
        assert_eq!(result, Value::String("x".into()));
    }

    #[test]
    fn unbound_function_is_an_error() {
        let no_functions = Activation::new(Rc::new(IndexMap::<String, CelFunction>::new()));
        let e = Expr::IdentArg("nope".to_string(), vec![]);
        let result = eval(&Node::new(e), &no_functions).unwrap();
        assert!(matches!(result, Value::Error(err) if matches!(err.kind, EvalErrorKind::UnboundFunction(_))));
    }
}
