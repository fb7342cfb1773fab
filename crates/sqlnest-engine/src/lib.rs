//! Planning, batched execution and result assembly for sqlnest.
//!
//! A request ([`FindOptions`]) is planned by the [`Planner`] into a tree of
//! [`QueryContext`]s: the root covers the requested model plus every
//! single-value association reached by attributes, filters or sort keys
//! (each distinct path joined once), and each one-to-many attribute becomes
//! a child context fetched in one batched query keyed by the parent rows.
//!
//! The [`Executor`] runs that tree over a [`Connection`](sqlnest_core::Connection)
//! and assembles nested [`Record`](sqlnest_core::Record)s.

pub mod assemble;
pub mod context;
pub mod execute;
mod joins;
pub mod options;
pub mod planner;
mod resolve;
mod translate;

pub use assemble::{Groups, assemble, group_rows, wrap};
pub use context::{
    AttributeNode, AttributeTree, BATCH_SLOT, ChildLink, ChildShape, ColumnEntry, ColumnRegistry,
    JoinEntry, JoinRegistry, QueryContext, ROOT_ALIAS,
};
pub use execute::{Executor, Phase};
pub use options::FindOptions;
pub use planner::Planner;
