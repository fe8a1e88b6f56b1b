//! A runtime for the Common Expression Language: a type system with CEL's
//! numeric and temporal semantics, longest-prefix name resolution, a
//! tree-walking evaluator, and a closure transpiler. This crate consumes an
//! already-parsed [`Expr`] tree; parsing CEL source text is out of scope.
//!
//! The module layout mirrors the teacher's layering: value representation
//! and arithmetic (`value`), the name-resolution tree (`namespace`) and the
//! per-evaluation scope built on top of it (`activation`), the shared
//! operator set (`ops`), the two execution paths that consume it
//! (`eval`, `transpile`), the macro combinators both paths route through
//! (`macros`), and the public façade a host actually embeds (`runner`).

mod activation;
mod ast;
mod error;
mod eval;
mod literal;
mod macros;
mod namespace;
mod ops;
mod runner;
mod transpile;
mod value;

pub use activation::{Activation, CelFunction, FunctionTable};
pub use ast::{BinaryOp, Expr, FieldInit, Literal, MessageValue, Node, UnaryOp, build_map, type_name_for};
pub use error::{CodeLoc, EvalError, EvalErrorKind, FatalError};
pub use namespace::{NameContainer, NameContainerRef, NotFound, Referent, Resolved};
pub use runner::{Environment, HostFunction, Program, Runner};
pub use value::{CelMap, CelType, MapKey, Value};
pub use value::temporal::{Duration, Timestamp};
