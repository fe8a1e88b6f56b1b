//! First-class evaluation errors.
//!
//! CEL has no exceptions: a failed operation produces an [`EvalError`] value
//! that flows through the evaluator exactly like any other [`crate::value::Value`].
//! Arithmetic and relational operators propagate it unchanged; logical `&&`,
//! `||`, and the ternary absorb it per the short-circuit rules in
//! [`crate::eval`]. This mirrors the teacher crate's `RunError`/`ExcType`
//! split (`exception_private.rs`), adapted to CEL's fixed message vocabulary
//! instead of Python's exception class hierarchy.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

/// A source position, carried when the error originated at a parsed AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

/// The fixed vocabulary of CEL evaluation failures.
///
/// Each variant corresponds to exactly one of the fixed-vocabulary messages;
/// variants that need interpolated detail (a key, a name, a container) carry
/// it as a field instead of being parameterized by a free-form string, so
/// the vocabulary stays closed and `Display` stays the single source of
/// truth for wording.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum EvalErrorKind {
    #[strum(serialize = "no such overload")]
    NoSuchOverload,
    #[strum(serialize = "no matching overload")]
    NoMatchingOverload,
    #[strum(serialize = "no such key")]
    NoSuchKey,
    #[strum(serialize = "no such field")]
    NoSuchField,
    #[strum(to_string = "no such member in mapping: '{0}'")]
    NoSuchMemberInMapping(String),
    #[strum(serialize = "invalid_argument")]
    InvalidArgument,
    #[strum(serialize = "return error for overflow")]
    Overflow,
    #[strum(serialize = "divide by zero")]
    DivideByZero,
    #[strum(serialize = "modulus or divide by zero")]
    ModulusByZero,
    #[strum(serialize = "invalid UTF-8")]
    InvalidUtf8,
    #[strum(to_string = "undeclared reference to '{name}' (in container '{container}')")]
    UndeclaredReference { name: String, container: String },
    #[strum(serialize = "range error")]
    RangeError,
    #[strum(serialize = "unsupported key type")]
    UnsupportedKeyType,
    #[strum(serialize = "bad key type")]
    BadKeyType,
    #[strum(serialize = "does not support field selection")]
    NoFieldSelection,
    #[strum(to_string = "duplicate key in map literal: {0}")]
    DuplicateKey(String),
    #[strum(to_string = "unbound function '{0}'")]
    UnboundFunction(String),
}

/// A deferred, first-class evaluation failure.
///
/// Cheap to clone: `kind` is a closed enum and `position` is `Copy`.
/// `message()` formats `kind` on demand rather than caching a `String`.
/// `position` records where the error originated, for diagnostics only -- it
/// plays no role in short-circuit semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub position: Option<CodeLoc>,
}

impl EvalError {
    #[must_use]
    pub fn new(kind: EvalErrorKind) -> Self {
        Self { kind, position: None }
    }

    #[must_use]
    pub fn at(kind: EvalErrorKind, position: CodeLoc) -> Self {
        Self {
            kind,
            position: Some(position),
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(loc) => write!(f, "{} (at {}:{})", self.kind, loc.line, loc.column),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {}

/// Fatal, non-recoverable failures: a malformed AST from the parser, or a
/// valid-but-unimplemented construct. Unlike [`EvalError`] these are never
/// absorbed by short-circuit logic -- they are fatal to evaluation itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// The AST did not have the expected shape for its node kind.
    Syntax { message: String, position: Option<CodeLoc> },
    /// A construct this runtime does not implement (e.g. a protobuf field
    /// initializer on a non-message member).
    Unsupported { message: String, position: Option<CodeLoc> },
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message, .. } => write!(f, "syntax error: {message}"),
            Self::Unsupported { message, .. } => write!(f, "unsupported: {message}"),
        }
    }
}

impl std::error::Error for FatalError {}
