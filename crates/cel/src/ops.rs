//! The operator set shared by the evaluator and the transpiler.
//!
//! The operator set lives behind a narrow interface so both can consume it:
//! [`apply_binary`]/[`apply_unary`] are that interface for
//! arithmetic/relational/indexing operators; [`base_function_table`] builds
//! the fixed base table (`size`, `contains`, `type`, the Timestamp/Duration
//! accessors, and the type-conversion constructors). Short-circuit
//! operators (`&&`, `||`, ternary) are deliberately excluded here -- they
//! need access to the *unevaluated* right-hand side, which a
//! `Value, Value -> Value` interface cannot express.

use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::activation::CelFunction;
use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{EvalError, EvalErrorKind};
use crate::value::temporal::{Duration, Timestamp};
use crate::value::{MapKey, Value, error_value, values_equal};

fn err_value(e: EvalError) -> Value {
    Value::Error(Arc::new(e))
}

/// Applies every [`BinaryOp`] except [`BinaryOp::And`]/[`BinaryOp::Or`],
/// which the evaluator special-cases for short-circuiting.
#[must_use]
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => left.add(right),
        BinaryOp::Sub => left.sub(right),
        BinaryOp::Mul => left.mul(right),
        BinaryOp::Div => left.div(right),
        BinaryOp::Mod => left.rem(right),
        BinaryOp::Lt => left.lt(right),
        BinaryOp::Le => left.le(right),
        BinaryOp::Gt => left.gt(right),
        BinaryOp::Ge => left.ge(right),
        BinaryOp::Eq => left.eq_value(right),
        BinaryOp::Ne => left.ne_value(right),
        BinaryOp::In => membership(left, right),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators are handled by the evaluator"),
    }
}

#[must_use]
pub fn apply_unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Neg => value.neg(),
        UnaryOp::Not => match value {
            Value::Bool(b) => Value::Bool(!b),
            Value::Error(_) => value.clone(),
            _ => error_value(EvalErrorKind::NoSuchOverload),
        },
    }
}

/// `probe in container`: true if any element equals `probe`, Error if none
/// matched but at least one comparison could not be made, false otherwise.
#[must_use]
pub fn membership(probe: &Value, container: &Value) -> Value {
    if let Value::Error(_) = probe {
        return probe.clone();
    }
    if let Value::Error(_) = container {
        return container.clone();
    }
    match container {
        Value::List(items) => {
            let mut saw_type_error = false;
            for item in items.iter() {
                if values_equal(probe, item) {
                    return Value::Bool(true);
                }
                if !comparable_kinds(probe, item) {
                    saw_type_error = true;
                }
            }
            if saw_type_error {
                error_value(EvalErrorKind::NoSuchOverload)
            } else {
                Value::Bool(false)
            }
        }
        Value::Map(map) => match MapKey::try_from_value(probe) {
            Ok(key) => Value::Bool(map.contains_key(&key)),
            Err(e) => Value::Error(Arc::new(e)),
        },
        Value::String(haystack) => match probe {
            Value::String(needle) => Value::Bool(haystack.contains(needle.as_ref())),
            _ => error_value(EvalErrorKind::NoSuchOverload),
        },
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

fn comparable_kinds(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Int(_) | Value::Uint(_) | Value::Double(_), Value::Int(_) | Value::Uint(_) | Value::Double(_))
    ) || std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// `container[key]`: 0-based list indexing, map key lookup.
#[must_use]
pub fn index(container: &Value, key: &Value) -> Value {
    if let Value::Error(_) = container {
        return container.clone();
    }
    if let Value::Error(_) = key {
        return key.clone();
    }
    match container {
        Value::List(items) => {
            let idx = match key {
                Value::Int(i) => *i,
                Value::Uint(u) => match i64::try_from(*u) {
                    Ok(i) => i,
                    Err(_) => return error_value(EvalErrorKind::InvalidArgument),
                },
                _ => return error_value(EvalErrorKind::InvalidArgument),
            };
            if idx < 0 || idx as usize >= items.len() {
                error_value(EvalErrorKind::InvalidArgument)
            } else {
                items[idx as usize].clone()
            }
        }
        Value::Map(map) => match MapKey::try_from_value(key) {
            Ok(k) => map.get(&k).cloned().unwrap_or_else(|| error_value(EvalErrorKind::NoSuchKey)),
            Err(e) => Value::Error(Arc::new(e)),
        },
        _ => error_value(EvalErrorKind::NoSuchOverload),
    }
}

/// `a.b` field-selection sugar for `Map`/`Message` values, the fallback
/// case once `a` is not itself a name-resolution container.
#[must_use]
pub fn select_field_value(container: &Value, field: &str) -> Value {
    match container {
        Value::Map(map) => {
            let key = MapKey::String(Arc::from(field));
            map.get(&key)
                .cloned()
                .unwrap_or_else(|| error_value(EvalErrorKind::NoSuchMemberInMapping(field.to_string())))
        }
        Value::Message(m) => m
            .fields
            .get(field)
            .cloned()
            .unwrap_or_else(|| error_value(EvalErrorKind::NoSuchField)),
        Value::Error(_) => container.clone(),
        _ => error_value(EvalErrorKind::NoFieldSelection),
    }
}

fn arg(args: &[Value], i: usize) -> &Value {
    static ERR_SLOT: Value = Value::Null;
    args.get(i).unwrap_or(&ERR_SLOT)
}

fn conversion_error() -> Value {
    error_value(EvalErrorKind::InvalidArgument)
}

/// Builds the fixed base function table: `size`,
/// `contains`, `type`, `endsWith`, `startsWith`, `matches`, the Timestamp
/// accessors, and the type-conversion constructors. Receiver-style calls
/// (`a.f(b)`) and free-function calls (`f(a, b)`) both land here with the
/// receiver as the first argument.
#[must_use]
pub fn base_function_table() -> IndexMap<String, CelFunction> {
    let mut table: IndexMap<String, CelFunction> = IndexMap::new();
    let mut register = |name: &str, f: CelFunction| {
        table.insert(name.to_string(), f);
    };

    register(
        "size",
        Rc::new(|args| arg(args, 0).size().map_or_else(err_value, Value::Int)),
    );
    register(
        "contains",
        Rc::new(|args| match (arg(args, 0), arg(args, 1)) {
            (Value::String(haystack), Value::String(needle)) => Value::Bool(haystack.contains(needle.as_ref())),
            (Value::Error(_), _) => arg(args, 0).clone(),
            (_, Value::Error(_)) => arg(args, 1).clone(),
            _ => error_value(EvalErrorKind::NoSuchOverload),
        }),
    );
    register(
        "startsWith",
        Rc::new(|args| match (arg(args, 0), arg(args, 1)) {
            (Value::String(s), Value::String(prefix)) => Value::Bool(s.starts_with(prefix.as_ref())),
            _ => error_value(EvalErrorKind::NoSuchOverload),
        }),
    );
    register(
        "endsWith",
        Rc::new(|args| match (arg(args, 0), arg(args, 1)) {
            (Value::String(s), Value::String(suffix)) => Value::Bool(s.ends_with(suffix.as_ref())),
            _ => error_value(EvalErrorKind::NoSuchOverload),
        }),
    );
    register(
        "matches",
        Rc::new(|args| match (arg(args, 0), arg(args, 1)) {
            (Value::String(s), Value::String(pattern)) => match regex::Regex::new(pattern) {
                Ok(re) => Value::Bool(re.is_match(s)),
                Err(_) => error_value(EvalErrorKind::InvalidArgument),
            },
            _ => error_value(EvalErrorKind::NoSuchOverload),
        }),
    );
    register("type", Rc::new(|args| Value::Type(arg(args, 0).type_of())));

    register(
        "int",
        Rc::new(|args| match arg(args, 0) {
            Value::Int(i) => Value::Int(*i),
            Value::Uint(u) => i64::try_from(*u).map_or_else(|_| error_value(EvalErrorKind::Overflow), Value::Int),
            Value::Double(d) => {
                if d.is_finite() && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                    Value::Int(*d as i64)
                } else {
                    error_value(EvalErrorKind::Overflow)
                }
            }
            Value::String(s) => crate::literal::parse_int(s).map_or_else(err_value, Value::Int),
            _ => conversion_error(),
        }),
    );
    register(
        "uint",
        Rc::new(|args| match arg(args, 0) {
            Value::Uint(u) => Value::Uint(*u),
            Value::Int(i) => u64::try_from(*i).map_or_else(|_| error_value(EvalErrorKind::Overflow), Value::Uint),
            Value::Double(d) => {
                if d.is_finite() && *d >= 0.0 && *d <= u64::MAX as f64 {
                    Value::Uint(*d as u64)
                } else {
                    error_value(EvalErrorKind::Overflow)
                }
            }
            Value::String(s) => crate::literal::parse_uint(s).map_or_else(err_value, Value::Uint),
            _ => conversion_error(),
        }),
    );
    register(
        "double",
        Rc::new(|args| match arg(args, 0) {
            Value::Double(d) => Value::Double(*d),
            Value::Int(i) => Value::Double(*i as f64),
            Value::Uint(u) => Value::Double(*u as f64),
            Value::String(s) => crate::literal::parse_float(s).map_or_else(err_value, Value::Double),
            _ => conversion_error(),
        }),
    );
    register(
        "bool",
        Rc::new(|args| match arg(args, 0) {
            Value::Bool(b) => Value::Bool(*b),
            Value::String(s) => match s.as_ref() {
                "true" | "TRUE" | "True" => Value::Bool(true),
                "false" | "FALSE" | "False" => Value::Bool(false),
                _ => conversion_error(),
            },
            _ => conversion_error(),
        }),
    );
    register(
        "string",
        Rc::new(|args| match arg(args, 0) {
            Value::String(s) => Value::String(Arc::clone(s)),
            Value::Bytes(b) => std::str::from_utf8(b).map_or_else(|_| error_value(EvalErrorKind::InvalidUtf8), |s| Value::String(Arc::from(s))),
            Value::Error(_) => arg(args, 0).clone(),
            other => Value::String(Arc::from(other.to_string())),
        }),
    );
    register(
        "bytes",
        Rc::new(|args| match arg(args, 0) {
            Value::Bytes(b) => Value::Bytes(Arc::clone(b)),
            Value::String(s) => Value::Bytes(Arc::from(s.as_bytes())),
            _ => conversion_error(),
        }),
    );
    register(
        "duration",
        Rc::new(|args| match arg(args, 0) {
            Value::String(s) => Duration::parse(s).map_or_else(err_value, Value::Duration),
            Value::Duration(d) => Value::Duration(*d),
            _ => conversion_error(),
        }),
    );
    register(
        "timestamp",
        Rc::new(|args| match arg(args, 0) {
            Value::String(s) => Timestamp::parse(s).map_or_else(err_value, Value::Timestamp),
            Value::Timestamp(t) => Value::Timestamp(*t),
            _ => conversion_error(),
        }),
    );
    register(
        "list",
        Rc::new(|args| match arg(args, 0) {
            Value::List(l) => Value::List(Arc::clone(l)),
            _ => conversion_error(),
        }),
    );
    register(
        "map",
        Rc::new(|args| match arg(args, 0) {
            Value::Map(m) => Value::Map(Arc::clone(m)),
            _ => conversion_error(),
        }),
    );

    macro_rules! timestamp_accessor {
        ($name:literal, $method:ident) => {
            register(
                $name,
                Rc::new(|args| {
                    let tz = match args.get(1) {
                        Some(Value::String(s)) => s.to_string(),
                        _ => String::new(),
                    };
                    match arg(args, 0) {
                        Value::Timestamp(t) => t.$method(&tz).map_or_else(err_value, Value::Int),
                        Value::Error(_) => arg(args, 0).clone(),
                        _ => error_value(EvalErrorKind::NoSuchOverload),
                    }
                }),
            );
        };
    }
    timestamp_accessor!("getFullYear", get_full_year);
    timestamp_accessor!("getMonth", get_month);
    timestamp_accessor!("getDayOfYear", get_day_of_year);
    timestamp_accessor!("getDayOfMonth", get_day_of_month);
    timestamp_accessor!("getDate", get_date);
    timestamp_accessor!("getDayOfWeek", get_day_of_week);

    macro_rules! duration_or_timestamp_accessor {
        ($name:literal, $ts_method:ident, $dur_method:ident) => {
            register(
                $name,
                Rc::new(|args| {
                    let tz = match args.get(1) {
                        Some(Value::String(s)) => s.to_string(),
                        _ => String::new(),
                    };
                    match arg(args, 0) {
                        Value::Duration(d) => Value::Int(d.$dur_method()),
                        Value::Timestamp(t) => t.$ts_method(&tz).map_or_else(err_value, Value::Int),
                        Value::Error(_) => arg(args, 0).clone(),
                        _ => error_value(EvalErrorKind::NoSuchOverload),
                    }
                }),
            );
        };
    }
    duration_or_timestamp_accessor!("getHours", get_hours, hours);
    duration_or_timestamp_accessor!("getMinutes", get_minutes, minutes);
    duration_or_timestamp_accessor!("getSeconds", get_seconds, seconds);
    duration_or_timestamp_accessor!("getMilliseconds", get_milliseconds, milliseconds);

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    #[test]
    fn membership_over_list() {
        let list = Value::List(Arc::from([Value::Int(1), Value::Int(2)]));
        assert_eq!(membership(&Value::Int(2), &list), Value::Bool(true));
        assert_eq!(membership(&Value::Int(9), &list), Value::Bool(false));
    }

    #[test]
    fn negative_index_is_invalid_argument() {
        let list = Value::List(Arc::from([Value::Int(1)]));
        let result = index(&list, &Value::Int(-1));
        assert!(matches!(result, Value::Error(e) if e.kind == EvalErrorKind::InvalidArgument));
    }

    #[test]
    fn binary_dispatch_matches_value_methods() {
        assert_eq!(apply_binary(BinaryOp::Add, &Value::Int(1), &Value::Int(2)), Value::Int(3));
    }

    #[test]
    fn size_function_counts_code_points() {
        let table = base_function_table();
        let size = table.get("size").unwrap();
        assert_eq!(size(&[Value::String("hello".into())]), Value::Int(5));
    }
}
