//! SELECT description and rendering for sqlnest.
//!
//! `sqlnest-query` is the **statement layer**. The planner describes each
//! query context as a [`Select`] with aliased [`Join`]s, [`Expr`] predicates
//! and [`OrderBy`] terms; this crate renders it into dialect SQL plus bound
//! parameters for a [`Connection`](sqlnest_core::Connection) to execute.
//!
//! Batched child queries carry an [`Expr::Batch`] placeholder in their WHERE
//! clause until the parent's key values are known and bound with
//! [`Select::bind`].

pub mod clause;
pub mod expr;
pub mod join;
pub mod select;

pub use clause::{OrderBy, OrderDirection};
pub use expr::{BinaryOp, Expr};
pub use join::Join;
pub use select::{Select, SelectColumn};
