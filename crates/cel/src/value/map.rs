//! CEL map values and the closed set of hashable key types.
//!
//! Grounded in the teacher's `types/dict.rs` split (a dedicated submodule per
//! container kind); keys must be hashable, with no duplicates.

use std::sync::Arc;

use indexmap::IndexMap;

use super::Value;
use crate::error::{EvalError, EvalErrorKind};

/// The closed projection of [`Value`] usable as a CEL map key.
///
/// CEL keys are `int`, `uint`, `bool`, or `string` -- never `double` (which
/// cannot implement a total `Hash`), `list`, `map`, or `null`. Constructing a
/// `MapKey` from anything else fails with a fixed error vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Uint(u64),
    Bool(bool),
    String(Arc<str>),
}

impl MapKey {
    /// Attempts to project a `Value` into a map key.
    ///
    /// Returns `"unsupported key type"` for container/null/double values and
    /// `"bad key type"` for a first-class [`crate::error::EvalError`] used as a key.
    pub fn try_from_value(value: &Value) -> Result<Self, EvalError> {
        match value {
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::Uint(u) => Ok(Self::Uint(*u)),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::String(s) => Ok(Self::String(Arc::from(s.as_ref()))),
            Value::Error(_) => Err(EvalError::new(EvalErrorKind::BadKeyType)),
            _ => Err(EvalError::new(EvalErrorKind::UnsupportedKeyType)),
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Uint(u) => Value::Uint(u),
            Self::Bool(b) => Value::Bool(b),
            Self::String(s) => Value::String(Arc::from(s.as_ref())),
        }
    }
}

/// An ordered CEL map: `indexmap` keeps iteration order stable within a
/// single evaluation, undefined-but-stable across runs, without this crate
/// needing to invent its own ordered-hash-map machinery.
#[derive(Debug, Clone, Default)]
pub struct CelMap {
    entries: IndexMap<MapKey, Value, ahash::RandomState>,
}

impl CelMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, failing on a duplicate key: maps fail at
    /// construction, not silently overwrite, when two entries collide.
    pub fn insert_unique(&mut self, key: MapKey, value: Value) -> Result<(), EvalError> {
        if self.entries.contains_key(&key) {
            let shown = key.into_value();
            return Err(EvalError::new(EvalErrorKind::DuplicateKey(format!("{shown}"))));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }
}

impl PartialEq for CelMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(k, v)| other.entries.get(k) == Some(v))
    }
}

