//! Authoring-time model definitions.
//!
//! Definitions are plain data: they name foreign models by string and may
//! leave association keys to be discovered. [`OrmBuilder::bake`] turns a set
//! of them into the immutable [`Orm`] graph.
//!
//! Definitions can be written with builders:
//!
//! ```rust,ignore
//! let cities = ModelDef::new("Cities")
//!     .table("cities")
//!     .field(FieldDef::data("id").primary_key())
//!     .field(FieldDef::data("name"))
//!     .field(FieldDef::data("country_id"))
//!     .field(FieldDef::associated(
//!         "country",
//!         HopDef::to("Countries").key("country_id").foreign_key("id"),
//!     ));
//! ```
//!
//! or deserialized from JSON, where fields are tagged by `kind`:
//!
//! ```json
//! { "name": "Cities", "table": "cities", "fields": [
//!     { "kind": "data", "name": "id", "primaryKey": true },
//!     { "kind": "associated", "name": "country", "foreignModel": "Countries" }
//! ]}
//! ```
//!
//! [`OrmBuilder::bake`]: crate::orm::OrmBuilder::bake
//! [`Orm`]: crate::orm::Orm

use crate::attributes::Attributes;
use crate::filter::Filter;
use crate::model::{ComputeFn, FilterFn};
use crate::record::Record;
use crate::value::Value;
use serde::Deserialize;

/// Definition of one model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDef {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name; defaults to the model name
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Declared relationships used to discover association keys
    #[serde(default)]
    pub associations: Vec<AssociationDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            table: None,
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: impl Into<FieldDef>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn association(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }
}

/// A declared `key -> foreignModel.foreignKey` relationship.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationDef {
    pub foreign_model: String,
    pub key: String,
    pub foreign_key: String,
}

impl AssociationDef {
    pub fn new(
        key: impl Into<String>,
        foreign_model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            foreign_model: foreign_model.into(),
            key: key.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Definition of one field, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldDef {
    Data(DataFieldDef),
    Associated(AssociatedFieldDef),
    /// Calculated fields carry a function and can only be built in code
    #[serde(skip)]
    Calculated(CalculatedFieldDef),
}

impl FieldDef {
    /// Start a data field definition.
    pub fn data(name: impl Into<String>) -> DataFieldDef {
        DataFieldDef {
            name: name.into(),
            column: None,
            primary_key: false,
            not_null: false,
            default_value: None,
        }
    }

    /// Start an associated field definition.
    pub fn associated(name: impl Into<String>, hop: HopDef) -> AssociatedFieldDef {
        AssociatedFieldDef {
            name: name.into(),
            hop,
        }
    }

    /// Define a field computed from other data fields of the same model.
    ///
    /// `compute` receives a record holding the required fields by name.
    pub fn calculated<F>(name: impl Into<String>, requires: &[&str], compute: F) -> CalculatedFieldDef
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        CalculatedFieldDef {
            name: name.into(),
            requires: requires.iter().map(|s| (*s).to_string()).collect(),
            compute: ComputeFn::new(compute),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldDef::Data(d) => &d.name,
            FieldDef::Associated(a) => &a.name,
            FieldDef::Calculated(c) => &c.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFieldDef {
    pub name: String,
    /// Column name; defaults to the field name
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl DataFieldDef {
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

impl From<DataFieldDef> for FieldDef {
    fn from(def: DataFieldDef) -> Self {
        FieldDef::Data(def)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedFieldDef {
    pub name: String,
    #[serde(flatten)]
    pub hop: HopDef,
}

impl From<AssociatedFieldDef> for FieldDef {
    fn from(def: AssociatedFieldDef) -> Self {
        FieldDef::Associated(def)
    }
}

/// One step of an association, optionally continued by `towards`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopDef {
    /// Model name, optionally schema-qualified (`"geo.Countries"`)
    pub foreign_model: String,
    /// Field on the owning model; discovered when omitted
    #[serde(default)]
    pub key: Option<String>,
    /// Field on the foreign model; discovered when omitted
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub has_many: bool,
    /// `"left"` (default) or `"inner"`
    #[serde(default)]
    pub join_type: Option<String>,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(skip)]
    pub filter_fn: Option<FilterFn>,
    /// Default attributes when the caller does not name any
    #[serde(default)]
    pub attributes: Option<Attributes>,
    /// Leaf column returned in place of a nested object
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub towards: Option<Box<HopDef>>,
}

impl HopDef {
    /// Start a hop to `foreign_model`.
    pub fn to(foreign_model: impl Into<String>) -> Self {
        Self {
            foreign_model: foreign_model.into(),
            key: None,
            foreign_key: None,
            has_many: false,
            join_type: None,
            filter: None,
            filter_fn: None,
            attributes: None,
            field_name: None,
            towards: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn has_many(mut self) -> Self {
        self.has_many = true;
        self
    }

    pub fn join_type(mut self, join_type: impl Into<String>) -> Self {
        self.join_type = Some(join_type.into());
        self
    }

    /// Extra predicate on the foreign model, applied in the join or child query.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Predicate computed per request from the caller's context value.
    pub fn filter_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Filter + Send + Sync + 'static,
    {
        self.filter_fn = Some(FilterFn::new(f));
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn towards(mut self, next: HopDef) -> Self {
        self.towards = Some(Box::new(next));
        self
    }
}

#[derive(Debug, Clone)]
pub struct CalculatedFieldDef {
    pub name: String,
    pub requires: Vec<String>,
    pub compute: ComputeFn,
}

impl From<CalculatedFieldDef> for FieldDef {
    fn from(def: CalculatedFieldDef) -> Self {
        FieldDef::Calculated(def)
    }
}
