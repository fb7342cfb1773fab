//! sqlnest - nested attribute queries over relational models.
//!
//! Describe tables and their associations once, then ask for nested shapes:
//!
//! - single-value associations (`city.country`) become joins in one query
//! - one-to-many associations (`customer.notes`) become one batched query per
//!   level, keyed by the parent rows, run concurrently with their siblings
//! - filters and sort keys can reach through associations (`country.name`)
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlnest::prelude::*;
//!
//! let orm = Orm::builder()
//!     .model(
//!         ModelDef::new("Countries")
//!             .table("countries")
//!             .field(FieldDef::data("id").primary_key())
//!             .field(FieldDef::data("name")),
//!     )
//!     .model(
//!         ModelDef::new("Cities")
//!             .table("cities")
//!             .field(FieldDef::data("id").primary_key())
//!             .field(FieldDef::data("name"))
//!             .field(FieldDef::data("country_id"))
//!             .field(FieldDef::associated("country", HopDef::to("Countries"))),
//!     )
//!     .bake()?;
//!
//! let session = Session::new(Arc::new(orm), conn);
//! let cities = session
//!     .find(&cx, FindOptions::new("Cities").filter(Filter::eq("id", 1)))
//!     .await;
//! // [{"id": 1, "name": "Munich", "country": {"id": "DEU", "name": "Germany"}}]
//! ```

pub use sqlnest_core::{
    AssociatedField, AssociationDef, AttributeSpec, Attributes, ColumnInfo, Condition,
    Connection, Cx, Dialect, Error, Field, FieldDef, Filter, HopDef, JoinType, Model, ModelDef,
    ModelRef, Node, Operator, Orm, OrmBuilder, Outcome, Record, Result, Row, SortKey,
    SyntaxErrorKind, UsageErrorKind, Value,
};

pub use sqlnest_query::{Expr, Join, OrderBy, Select};

pub use sqlnest_engine::{Executor, FindOptions, Phase, Planner, QueryContext};

pub mod session;
pub use session::{Session, SessionBuilder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::session::{Session, SessionBuilder};
    pub use sqlnest_core::{
        AttributeSpec, Attributes, Connection, Cx, Dialect, Error, FieldDef, Filter, HopDef,
        ModelDef, Node, Operator, Orm, Outcome, Record, Result, Row, SortKey, Value,
    };
    pub use sqlnest_engine::FindOptions;
    pub use std::sync::Arc;
}
