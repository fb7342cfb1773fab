//! Core types for sqlnest.
//!
//! This crate provides the foundations the planner and the facade build on:
//!
//! - `Value`, `Row` and `Record` for parameters, fetched rows and nested results
//! - `Connection`, the seam to the SQL executor
//! - the metadata model (`ModelDef` definitions baked into an immutable `Orm`)
//! - the request DSLs: `Attributes`, `Filter` and `SortKey`
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod attributes;
pub mod connection;
pub mod definition;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod model;
pub mod orm;
mod patterns;
pub mod record;
pub mod row;
pub mod sort;
pub mod value;

pub use attributes::{AttributeSpec, Attributes};
pub use connection::Connection;
pub use definition::{
    AssociatedFieldDef, AssociationDef, CalculatedFieldDef, DataFieldDef, FieldDef, HopDef,
    ModelDef,
};
pub use dialect::Dialect;
pub use error::{
    DefinitionError, Error, ExecutionError, Result, SyntaxError, SyntaxErrorKind,
    UnknownFieldError, UsageError, UsageErrorKind,
};
pub use filter::{Condition, Filter, Operator};
pub use model::{
    AssociatedField, CalculatedField, ComputeFn, DataField, Field, FilterFn, Hop, JoinFilter,
    JoinType, Model, ModelRef,
};
pub use orm::{Orm, OrmBuilder};
pub use record::{Node, Record};
pub use row::{ColumnInfo, Row};
pub use sort::SortKey;
pub use value::{Value, ValueKey};
