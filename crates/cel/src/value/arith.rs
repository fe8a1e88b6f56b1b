//! Arithmetic operators over [`Value`], dispatched by operand-type pair.
//!
//! Mirrors the teacher's `bytecode/vm/binary.rs` dispatch shape (native op
//! first, typed fallback second) but with CEL's simpler rule: there is no
//! dunder protocol to fall back to, only a fixed overload set. Every
//! function here returns a `Value` rather than a `Result`, folding failure
//! into `Value::Error` directly, since Error is a first-class variant of
//! the Value sum and every operator must pattern-match on it explicitly.

use super::{Value, error_value};
use crate::error::EvalErrorKind;

/// `Error ∘ X = Error` for every arithmetic operator. Returns `Some(value)`
/// if either operand already carries a deferred error, preferring the left
/// operand per left-to-right evaluation order.
fn propagate_error(left: &Value, right: &Value) -> Option<Value> {
    if let Value::Error(_) = left {
        Some(left.clone())
    } else if let Value::Error(_) = right {
        Some(right.clone())
    } else {
        None
    }
}

pub fn add(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Uint(a), Value::Uint(b)) => a
            .checked_add(*b)
            .map(Value::Uint)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
        (Value::String(a), Value::String(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            Value::String(s.into())
        }
        (Value::Bytes(a), Value::Bytes(b)) => {
            let mut v = Vec::with_capacity(a.len() + b.len());
            v.extend_from_slice(a);
            v.extend_from_slice(b);
            Value::Bytes(v.into())
        }
        (Value::List(a), Value::List(b)) => {
            let mut v = Vec::with_capacity(a.len() + b.len());
            v.extend(a.iter().cloned());
            v.extend(b.iter().cloned());
            Value::List(v.into())
        }
        (Value::Duration(a), Value::Duration(b)) => a
            .checked_add(*b)
            .map(Value::Duration)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Timestamp(a), Value::Duration(b)) | (Value::Duration(b), Value::Timestamp(a)) => a
            .checked_add(*b)
            .map(Value::Timestamp)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

pub fn sub(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_sub(*b)
            .map(Value::Int)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Uint(a), Value::Uint(b)) => a
            .checked_sub(*b)
            .map(Value::Uint)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Double(a), Value::Double(b)) => Value::Double(a - b),
        (Value::Duration(a), Value::Duration(b)) => a
            .checked_sub(*b)
            .map(Value::Duration)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Timestamp(a), Value::Duration(b)) => a
            .checked_sub(*b)
            .map(Value::Timestamp)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Timestamp(a), Value::Timestamp(b)) => a
            .checked_diff(*b)
            .map(Value::Duration)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

pub fn mul(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_mul(*b)
            .map(Value::Int)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Uint(a), Value::Uint(b)) => a
            .checked_mul(*b)
            .map(Value::Uint)
            .unwrap_or_else(|| error_value(EvalErrorKind::Overflow)),
        (Value::Double(a), Value::Double(b)) => Value::Double(a * b),
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

pub fn div(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => error_value(EvalErrorKind::DivideByZero),
        (Value::Int(a), Value::Int(b)) => {
            if *a == i64::MIN && *b == -1 {
                error_value(EvalErrorKind::Overflow)
            } else {
                Value::Int(a / b)
            }
        }
        (Value::Uint(_), Value::Uint(0)) => error_value(EvalErrorKind::DivideByZero),
        (Value::Uint(a), Value::Uint(b)) => Value::Uint(a / b),
        (Value::Double(_), Value::Double(b)) if *b == 0.0 => error_value(EvalErrorKind::DivideByZero),
        (Value::Double(a), Value::Double(b)) => Value::Double(a / b),
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

pub fn rem(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => error_value(EvalErrorKind::ModulusByZero),
        (Value::Int(a), Value::Int(b)) => {
            if *a == i64::MIN && *b == -1 {
                error_value(EvalErrorKind::Overflow)
            } else {
                Value::Int(a % b)
            }
        }
        (Value::Uint(_), Value::Uint(0)) => error_value(EvalErrorKind::ModulusByZero),
        (Value::Uint(a), Value::Uint(b)) => Value::Uint(a % b),
        // Modulus on doubles is not defined -- no such overload, not divide-by-zero.
        (Value::Double(_), Value::Double(_)) => error_value(EvalErrorKind::NoSuchOverload),
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

pub fn neg(value: &Value) -> Value {
    match value {
        Value::Error(_) => value.clone(),
        Value::Int(i64::MIN) => error_value(EvalErrorKind::Overflow),
        Value::Int(a) => Value::Int(-a),
        Value::Double(a) => Value::Double(-a),
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}
