//! Relational and equality operators over [`Value`].
//!
//! Cross-type comparisons between numeric kinds are permitted and obey
//! mathematical ordering -- `1 < 1.5`, `1u < 2`. Grounded in the original
//! implementation's `bool_lt`/`bool_le`/... wrappers
//! (`original_source/src/celpy/evaluation.py` lines 493-513), which all
//! delegate to a single cross-type ordering before turning it into a bool.

use std::cmp::Ordering;

use super::{Value, error_value, values_equal};
use crate::error::EvalErrorKind;

/// Orders two numeric values mathematically, widening to the representation
/// that loses the least information for the pair at hand.
fn numeric_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Uint(b)) => {
            if *a < 0 {
                Some(Ordering::Less)
            } else {
                Some((*a as u64).cmp(b))
            }
        }
        (Value::Uint(a), Value::Int(b)) => numeric_order(&Value::Int(*b), &Value::Uint(*a)).map(Ordering::reverse),
        (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
        (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Uint(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
        (Value::Double(a), Value::Uint(b)) => a.partial_cmp(&(*b as f64)),
        _ => None,
    }
}

/// Orders two same-kind non-numeric values (`string`, `bytes`, `bool`,
/// `duration`, `timestamp`).
fn same_kind_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    numeric_order(left, right).or_else(|| same_kind_order(left, right))
}

fn propagate_error(left: &Value, right: &Value) -> Option<Value> {
    if let Value::Error(_) = left {
        Some(left.clone())
    } else if let Value::Error(_) = right {
        Some(right.clone())
    } else {
        None
    }
}

macro_rules! relational_op {
    ($name:ident, $ord_check:expr) => {
        pub fn $name(left: &Value, right: &Value) -> Value {
            if let Some(err) = propagate_error(left, right) {
                return err;
            }
            match order(left, right) {
                Some(o) => Value::Bool($ord_check(o)),
                None => error_value(EvalErrorKind::NoSuchOverload),
            }
        }
    };
}

relational_op!(less_than, |o: Ordering| o == Ordering::Less);
relational_op!(less_or_equal, |o: Ordering| o != Ordering::Greater);
relational_op!(greater_than, |o: Ordering| o == Ordering::Greater);
relational_op!(greater_or_equal, |o: Ordering| o != Ordering::Less);

/// `==`. Cross-type numeric equality is permitted; comparisons between
/// incompatible non-numeric kinds are simply `false`, not an error (CEL
/// treats `==`/`!=` as total over all value pairs, unlike ordering).
pub fn equal(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    Value::Bool(values_equal(left, right))
}

pub fn not_equal(left: &Value, right: &Value) -> Value {
    if let Some(err) = propagate_error(left, right) {
        return err;
    }
    Value::Bool(!values_equal(left, right))
}
