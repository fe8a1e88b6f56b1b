//! The CEL `Value` type and its arithmetic/comparison/conversion rules.
//!
//! Grounded in the teacher's `value.rs` (a tagged-union `Value` with inline
//! immediates and `Rc`/arena-backed containers) but reshaped for CEL: no
//! heap arena or reference counting protocol is needed because CEL values
//! are immutable after construction and never cycle, so `Arc`-shared
//! interiors are enough. Submodules mirror the teacher's
//! `bytecode/vm/{binary,compare}.rs` split.

mod arith;
mod compare;
pub mod map;
pub mod temporal;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use map::{CelMap, MapKey};
pub use temporal::{Duration, Timestamp};

use crate::error::{EvalError, EvalErrorKind};

/// A CEL struct literal (`member_object` in the AST contract):
/// `Type.Name{field: value, ...}`. Not a protobuf message -- see
/// `DESIGN.md` for that scope decision. A field is present if and only if
/// it was assigned; there is no zero-value registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageValue {
    pub type_name: Arc<str>,
    pub fields: IndexMap<Arc<str>, Value, ahash::RandomState>,
}

impl MessageValue {
    #[must_use]
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::default(),
        }
    }
}

/// A reflective type handle: `type()` returns one of these, with a stable
/// display name. Types are themselves values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelType {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Duration,
    Timestamp,
    List,
    Map,
    Type,
    Function,
    Message(Arc<str>),
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null_type"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Uint => write!(f, "uint"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::Bytes => write!(f, "bytes"),
            Self::Duration => write!(f, "duration"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
            Self::Type => write!(f, "type"),
            Self::Function => write!(f, "function"),
            Self::Message(name) => write!(f, "{name}"),
        }
    }
}

/// The CEL value sum. `Error` is a variant of `Value` itself, not a
/// wrapping `Result` -- see `crate::error` for why.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    Duration(Duration),
    Timestamp(Timestamp),
    List(Arc<[Value]>),
    Map(Arc<CelMap>),
    Type(CelType),
    Message(Arc<MessageValue>),
    /// A callable handle: either a base-table name or a host-registered one.
    Function(Arc<str>),
    Error(Arc<EvalError>),
}

/// Builds an error `Value` inline, used throughout `arith`/`compare`/`eval`
/// wherever an operator's checked fallback path is reached.
#[must_use]
pub fn error_value(kind: EvalErrorKind) -> Value {
    Value::Error(Arc::new(EvalError::new(kind)))
}

impl Value {
    #[must_use]
    pub fn type_of(&self) -> CelType {
        match self {
            Self::Null => CelType::Null,
            Self::Bool(_) => CelType::Bool,
            Self::Int(_) => CelType::Int,
            Self::Uint(_) => CelType::Uint,
            Self::Double(_) => CelType::Double,
            Self::String(_) => CelType::String,
            Self::Bytes(_) => CelType::Bytes,
            Self::Duration(_) => CelType::Duration,
            Self::Timestamp(_) => CelType::Timestamp,
            Self::List(_) => CelType::List,
            Self::Map(_) => CelType::Map,
            Self::Type(_) => CelType::Type,
            Self::Message(m) => CelType::Message(Arc::clone(&m.type_name)),
            Self::Function(_) => CelType::Function,
            Self::Error(_) => CelType::Null, // type() of an error is unreachable: callers check is_error() first.
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// CEL truthiness: only `bool` values participate in `&&`/`||`/`?:`
    /// conditions; anything else is a type error, matching the original
    /// implementation's `boolean()` wrapper.
    pub fn as_bool_operand(&self) -> Result<bool, EvalError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Error(e) => Err((**e).clone()),
            _ => Err(EvalError::new(EvalErrorKind::NoSuchOverload)),
        }
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        arith::add(self, other)
    }
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        arith::sub(self, other)
    }
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        arith::mul(self, other)
    }
    #[must_use]
    pub fn div(&self, other: &Self) -> Self {
        arith::div(self, other)
    }
    #[must_use]
    pub fn rem(&self, other: &Self) -> Self {
        arith::rem(self, other)
    }
    #[must_use]
    pub fn neg(&self) -> Self {
        arith::neg(self)
    }

    #[must_use]
    pub fn lt(&self, other: &Self) -> Self {
        compare::less_than(self, other)
    }
    #[must_use]
    pub fn le(&self, other: &Self) -> Self {
        compare::less_or_equal(self, other)
    }
    #[must_use]
    pub fn gt(&self, other: &Self) -> Self {
        compare::greater_than(self, other)
    }
    #[must_use]
    pub fn ge(&self, other: &Self) -> Self {
        compare::greater_or_equal(self, other)
    }
    #[must_use]
    pub fn eq_value(&self, other: &Self) -> Self {
        compare::equal(self, other)
    }
    #[must_use]
    pub fn ne_value(&self, other: &Self) -> Self {
        compare::not_equal(self, other)
    }

    /// `size()`: code-point length for strings, byte length for bytes,
    /// element count for lists/maps.
    pub fn size(&self) -> Result<i64, EvalError> {
        match self {
            Self::String(s) => Ok(s.chars().count() as i64),
            Self::Bytes(b) => Ok(b.len() as i64),
            Self::List(l) => Ok(l.len() as i64),
            Self::Map(m) => Ok(m.len() as i64),
            Self::Error(e) => Err((**e).clone()),
            _ => Err(EvalError::new(EvalErrorKind::NoSuchOverload)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "b\"{}\"", String::from_utf8_lossy(b)),
            Self::Duration(d) => write!(f, "{d}"),
            Self::Timestamp(t) => write!(f, "{t}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {v}", k.clone().into_value())?;
                }
                write!(f, "}}")
            }
            Self::Type(t) => write!(f, "{t}"),
            Self::Message(m) => write!(f, "{}{{...}}", m.type_name),
            Self::Function(name) => write!(f, "<function {name}>"),
            Self::Error(e) => write!(f, "<error: {e}>"),
        }
    }
}

/// Full CEL equality, including cross-numeric-kind comparisons and
/// elementwise container comparison. Used by `compare::equal`/`not_equal`
/// after [`Value::Error`] operands have already been intercepted.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Uint(b)) | (Value::Uint(b), Value::Int(a)) => *a >= 0 && (*a as u64) == *b,
        (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => (*a as f64) == *b,
        (Value::Uint(a), Value::Double(b)) | (Value::Double(b), Value::Uint(a)) => (*a as f64) == *b,
        (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y)),
        (Value::Map(a), Value::Map(b)) => a == b,
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_numeric_equality() {
        assert!(values_equal(&Value::Int(1), &Value::Double(1.0)));
        assert!(values_equal(&Value::Uint(2), &Value::Int(2)));
    }

    #[test]
    fn type_display_uses_the_fixed_name_vocabulary() {
        assert_eq!(Value::Int(1).type_of().to_string(), "int");
        assert_eq!(Value::Null.type_of().to_string(), "null_type");
        assert_eq!(Value::List(Arc::from([])).type_of().to_string(), "list");
    }
}
