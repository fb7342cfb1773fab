//! The baked, immutable metadata graph.
//!
//! Cross-model references are [`ModelRef`] indices into the owning
//! [`Orm`](crate::orm::Orm), never pointers, so the graph may contain cycles
//! (customers ↔ notes) without shared ownership.

use crate::attributes::Attributes;
use crate::filter::Filter;
use crate::record::Record;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a model inside its [`Orm`](crate::orm::Orm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelRef(pub(crate) usize);

impl ModelRef {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A named relation with its fields.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) name: String,
    pub(crate) schema: Option<String>,
    pub(crate) table: String,
    pub(crate) fields: Vec<Field>,
    /// lowercase name -> position in `fields`
    pub(crate) lookup: HashMap<String, usize>,
    pub(crate) key_fields: Vec<String>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `schema.name`, or just the name without a schema.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Look up a field by name, case-insensitively.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.lookup
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.fields[i])
    }

    /// Look up a data field by name, case-insensitively.
    pub fn data_field(&self, name: &str) -> Option<&DataField> {
        match self.field(name) {
            Some(Field::Data(d)) => Some(d),
            _ => None,
        }
    }

    /// All fields in definition order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Data fields in definition order; the default attribute set.
    pub fn data_fields(&self) -> impl Iterator<Item = &DataField> {
        self.fields.iter().filter_map(|f| match f {
            Field::Data(d) => Some(d),
            _ => None,
        })
    }

    /// Names of the primary-key fields.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// First key field, or `id` when the model declares none.
    pub fn primary_key(&self) -> &str {
        self.key_fields.first().map_or("id", String::as_str)
    }
}

/// A model member.
#[derive(Debug, Clone)]
pub enum Field {
    Data(DataField),
    Associated(AssociatedField),
    Calculated(CalculatedField),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Data(d) => &d.name,
            Field::Associated(a) => &a.name,
            Field::Calculated(c) => &c.name,
        }
    }
}

/// A field backed by one physical column.
#[derive(Debug, Clone)]
pub struct DataField {
    pub name: String,
    pub column_name: String,
    pub primary_key: bool,
    pub not_null: bool,
    pub default_value: Option<Value>,
}

/// A field reached through one or more joins.
#[derive(Debug, Clone)]
pub struct AssociatedField {
    pub name: String,
    pub hop: Hop,
}

impl AssociatedField {
    /// The last hop of the `towards` chain.
    pub fn leaf(&self) -> &Hop {
        self.hop.leaf()
    }

    /// Whether the association produces a collection.
    pub fn has_many(&self) -> bool {
        self.hop.has_many
    }

    /// Whether the leaf designates a single output column.
    pub fn is_single_value(&self) -> bool {
        self.leaf().field_name.is_some()
    }
}

/// Join type of a hop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Keeps owning rows without a match
    #[default]
    Left,
    Inner,
}

impl JoinType {
    /// Parse `"left"` / `"inner"`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "left outer" => Some(JoinType::Left),
            "inner" => Some(JoinType::Inner),
            _ => None,
        }
    }

    pub const fn as_sql(self) -> &'static str {
        match self {
            JoinType::Left => "LEFT JOIN",
            JoinType::Inner => "INNER JOIN",
        }
    }
}

/// One resolved step `owner.key = foreign.foreign_key`.
#[derive(Debug, Clone)]
pub struct Hop {
    /// Data field on the owning model
    pub key: String,
    pub foreign_model: ModelRef,
    /// Data field on the foreign model
    pub foreign_key: String,
    pub has_many: bool,
    pub join_type: JoinType,
    pub filter: Option<JoinFilter>,
    pub attributes: Option<Attributes>,
    /// Only ever set on the leaf
    pub field_name: Option<String>,
    pub towards: Option<Box<Hop>>,
}

impl Hop {
    pub fn leaf(&self) -> &Hop {
        let mut hop = self;
        while let Some(next) = &hop.towards {
            hop = next;
        }
        hop
    }
}

/// Extra predicate attached to a hop.
#[derive(Debug, Clone)]
pub enum JoinFilter {
    Static(Filter),
    Dynamic(FilterFn),
}

impl JoinFilter {
    /// Produce the concrete filter for one request.
    pub fn materialize(&self, context: &serde_json::Value) -> Filter {
        match self {
            JoinFilter::Static(f) => f.clone(),
            JoinFilter::Dynamic(f) => f.call(context),
        }
    }
}

/// Request-dependent join predicate.
#[derive(Clone)]
pub struct FilterFn(Arc<dyn Fn(&serde_json::Value) -> Filter + Send + Sync>);

impl FilterFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Filter + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, context: &serde_json::Value) -> Filter {
        (self.0)(context)
    }
}

impl fmt::Debug for FilterFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterFn(..)")
    }
}

/// A value derived from other data fields.
#[derive(Debug, Clone)]
pub struct CalculatedField {
    pub name: String,
    /// Data fields whose values are passed to `compute`
    pub requires: Vec<String>,
    pub compute: ComputeFn,
}

#[derive(Clone)]
pub struct ComputeFn(Arc<dyn Fn(&Record) -> Value + Send + Sync>);

impl ComputeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, inputs: &Record) -> Value {
        (self.0)(inputs)
    }
}

impl fmt::Debug for ComputeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputeFn(..)")
    }
}
