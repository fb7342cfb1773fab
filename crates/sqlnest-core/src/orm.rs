//! Model registry and the bake step.

use crate::definition::{AssociationDef, FieldDef, HopDef, ModelDef};
use crate::error::{Error, Result, UsageErrorKind};
use crate::model::{
    AssociatedField, CalculatedField, DataField, Field, Hop, JoinFilter, JoinType, Model, ModelRef,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Collects model definitions before baking.
#[derive(Debug, Clone, Default)]
pub struct OrmBuilder {
    models: Vec<ModelDef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Models(Vec<ModelDef>),
    Wrapped { models: Vec<ModelDef> },
}

impl OrmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model definition.
    pub fn model(mut self, def: ModelDef) -> Self {
        self.models.push(def);
        self
    }

    /// Read definitions from a JSON array of models or `{"models": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Document = serde_json::from_str(json)?;
        let models = match doc {
            Document::Models(models) | Document::Wrapped { models } => models,
        };
        Ok(Self { models })
    }

    /// Resolve every cross-model reference and freeze the graph.
    #[tracing::instrument(level = "debug", skip(self), fields(models = self.models.len()))]
    pub fn bake(self) -> Result<Orm> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, def) in self.models.iter().enumerate() {
            let mut names = vec![def.name.to_ascii_lowercase()];
            if let Some(schema) = &def.schema {
                names.push(format!("{}.{}", schema, def.name).to_ascii_lowercase());
            }
            for name in names {
                if index.insert(name, i).is_some() {
                    return Err(Error::definition(&def.name, "model is defined twice"));
                }
            }
        }

        // Data fields first: association keys are validated against them.
        let mut models = self
            .models
            .iter()
            .map(bake_data_fields)
            .collect::<Result<Vec<_>>>()?;

        let mut extra: Vec<Vec<Field>> = Vec::with_capacity(models.len());
        for (i, def) in self.models.iter().enumerate() {
            let baker = Baker {
                defs: &self.models,
                models: &models,
                index: &index,
            };
            let mut fields = Vec::new();
            for field in &def.fields {
                match field {
                    FieldDef::Data(_) => {}
                    FieldDef::Associated(a) => {
                        let hop = baker.hop(i, &a.name, &a.hop, true)?;
                        fields.push(Field::Associated(AssociatedField {
                            name: a.name.clone(),
                            hop,
                        }));
                    }
                    FieldDef::Calculated(c) => {
                        let mut requires = Vec::with_capacity(c.requires.len());
                        for name in &c.requires {
                            let data = models[i].data_field(name).ok_or_else(|| {
                                Error::definition(
                                    &def.name,
                                    format!("calculated field '{}' requires unknown data field '{}'", c.name, name),
                                )
                            })?;
                            requires.push(data.name.clone());
                        }
                        fields.push(Field::Calculated(CalculatedField {
                            name: c.name.clone(),
                            requires,
                            compute: c.compute.clone(),
                        }));
                    }
                }
            }
            extra.push(fields);
        }

        for (model, fields) in models.iter_mut().zip(extra) {
            for field in fields {
                push_field(model, field)?;
            }
        }
        // Restore definition order now that every field is known.
        for (model, def) in models.iter_mut().zip(&self.models) {
            reorder(model, def);
        }

        tracing::debug!(models = models.len(), "baked model graph");
        Ok(Orm { models, index })
    }
}

fn bake_data_fields(def: &ModelDef) -> Result<Model> {
    let mut model = Model {
        name: def.name.clone(),
        schema: def.schema.clone(),
        table: def.table.clone().unwrap_or_else(|| def.name.clone()),
        fields: Vec::with_capacity(def.fields.len()),
        lookup: HashMap::new(),
        key_fields: Vec::new(),
    };
    for field in &def.fields {
        if let FieldDef::Data(d) = field {
            if d.primary_key {
                model.key_fields.push(d.name.clone());
            }
            push_field(
                &mut model,
                Field::Data(DataField {
                    name: d.name.clone(),
                    column_name: d.column.clone().unwrap_or_else(|| d.name.clone()),
                    primary_key: d.primary_key,
                    not_null: d.not_null,
                    default_value: d.default_value.clone(),
                }),
            )?;
        }
    }
    Ok(model)
}

fn push_field(model: &mut Model, field: Field) -> Result<()> {
    let key = field.name().to_ascii_lowercase();
    if model.lookup.contains_key(&key) {
        return Err(Error::definition(
            &model.name,
            format!("field '{}' is defined twice", field.name()),
        ));
    }
    model.lookup.insert(key, model.fields.len());
    model.fields.push(field);
    Ok(())
}

fn reorder(model: &mut Model, def: &ModelDef) {
    let position: HashMap<String, usize> = def
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name().to_ascii_lowercase(), i))
        .collect();
    model
        .fields
        .sort_by_key(|f| position.get(&f.name().to_ascii_lowercase()).copied());
    model.lookup = model
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name().to_ascii_lowercase(), i))
        .collect();
}

struct Baker<'a> {
    defs: &'a [ModelDef],
    models: &'a [Model],
    index: &'a HashMap<String, usize>,
}

impl Baker<'_> {
    fn lookup(&self, owner: usize, name: &str) -> Result<usize> {
        self.index
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| {
                Error::definition(
                    &self.models[owner].name,
                    format!("unknown foreign model '{name}'"),
                )
            })
    }

    fn hop(&self, owner: usize, field: &str, def: &HopDef, first: bool) -> Result<Hop> {
        let owner_model = &self.models[owner];
        let foreign = self.lookup(owner, &def.foreign_model)?;
        let foreign_model = &self.models[foreign];

        if !first && def.has_many {
            return Err(Error::definition(
                &owner_model.name,
                format!("'{field}' continues through a multi-value hop to '{}'", foreign_model.name),
            ));
        }
        if def.towards.is_some() && def.field_name.is_some() {
            return Err(Error::definition(
                &owner_model.name,
                format!("'{field}' names a fieldName on an intermediate hop"),
            ));
        }

        let join_type = match &def.join_type {
            None => JoinType::Left,
            Some(s) => JoinType::parse(s).ok_or_else(|| {
                Error::usage(
                    UsageErrorKind::InvalidJoinType,
                    &owner_model.name,
                    field,
                    format!("has unknown join type '{s}'"),
                )
            })?,
        };

        let (key, foreign_key) = self.keys(owner, foreign, def)?;
        let key = canonical(owner_model, &key, field)?;
        let foreign_key = canonical(foreign_model, &foreign_key, field)?;

        let towards = match &def.towards {
            Some(next) => Some(Box::new(self.hop(foreign, field, next, false)?)),
            None => None,
        };
        let field_name = match &def.field_name {
            Some(name) if towards.is_none() => Some(canonical(foreign_model, name, field)?),
            _ => None,
        };

        let filter = match (&def.filter_fn, &def.filter) {
            (Some(f), _) => Some(JoinFilter::Dynamic(f.clone())),
            (None, Some(f)) => Some(JoinFilter::Static(f.clone())),
            (None, None) => None,
        };

        Ok(Hop {
            key,
            foreign_model: ModelRef(foreign),
            foreign_key,
            has_many: def.has_many,
            join_type,
            filter,
            attributes: def.attributes.clone(),
            field_name,
            towards,
        })
    }

    /// Explicit keys win; otherwise declared associations in either direction,
    /// then the `<model>_<pk>` naming convention.
    fn keys(&self, owner: usize, foreign: usize, def: &HopDef) -> Result<(String, String)> {
        if let (Some(k), Some(fk)) = (&def.key, &def.foreign_key) {
            return Ok((k.clone(), fk.clone()));
        }
        let owner_model = &self.models[owner];
        let foreign_model = &self.models[foreign];

        let declared = self.declared(owner, foreign).or_else(|| {
            self.declared(foreign, owner)
                .map(|(key, foreign_key)| (foreign_key, key))
        });
        let (key, foreign_key) = declared.unwrap_or_else(|| {
            if def.has_many {
                (
                    owner_model.primary_key().to_string(),
                    format!("{}_{}", owner_model.name, owner_model.primary_key()),
                )
            } else {
                (
                    format!("{}_{}", foreign_model.name, foreign_model.primary_key()),
                    foreign_model.primary_key().to_string(),
                )
            }
        });
        Ok((
            def.key.clone().unwrap_or(key),
            def.foreign_key.clone().unwrap_or(foreign_key),
        ))
    }

    fn declared(&self, from: usize, to: usize) -> Option<(String, String)> {
        self.defs[from]
            .associations
            .iter()
            .find(|a: &&AssociationDef| {
                self.index.get(&a.foreign_model.to_ascii_lowercase()) == Some(&to)
            })
            .map(|a| (a.key.clone(), a.foreign_key.clone()))
    }
}

fn canonical(model: &Model, name: &str, via: &str) -> Result<String> {
    model.data_field(name).map(|d| d.name.clone()).ok_or_else(|| {
        Error::definition(
            &model.name,
            format!("association '{via}' references unknown data field '{name}'"),
        )
    })
}

/// The baked model graph.
#[derive(Debug, Clone)]
pub struct Orm {
    models: Vec<Model>,
    index: HashMap<String, usize>,
}

impl Orm {
    pub fn builder() -> OrmBuilder {
        OrmBuilder::new()
    }

    /// Get a model by reference.
    pub fn model(&self, model: ModelRef) -> &Model {
        &self.models[model.0]
    }

    /// Find a model by name or `schema.name`, case-insensitively.
    pub fn find(&self, name: &str) -> Option<ModelRef> {
        self.index.get(&name.to_ascii_lowercase()).copied().map(ModelRef)
    }

    /// Like [`Orm::find`], failing with a definition error.
    pub fn resolve(&self, name: &str) -> Result<ModelRef> {
        self.find(name)
            .ok_or_else(|| Error::definition(name, "no such model"))
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelRef, &Model)> {
        self.models.iter().enumerate().map(|(i, m)| (ModelRef(i), m))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FieldDef, HopDef};

    fn countries() -> ModelDef {
        ModelDef::new("Countries")
            .table("countries")
            .field(FieldDef::data("id").primary_key())
            .field(FieldDef::data("name"))
    }

    #[test]
    fn explicit_keys_are_kept() {
        let orm = Orm::builder()
            .model(countries())
            .model(
                ModelDef::new("Cities")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("country_id"))
                    .field(FieldDef::associated(
                        "country",
                        HopDef::to("countries").key("COUNTRY_ID").foreign_key("id"),
                    )),
            )
            .bake()
            .unwrap();

        let cities = orm.model(orm.find("cities").unwrap());
        let Some(Field::Associated(a)) = cities.field("Country") else {
            panic!("expected association");
        };
        assert_eq!(a.hop.key, "country_id");
        assert_eq!(a.hop.foreign_model, orm.find("Countries").unwrap());
        assert_eq!(a.hop.join_type, JoinType::Left);
    }

    #[test]
    fn keys_discovered_from_reverse_association() {
        let orm = Orm::builder()
            .model(
                ModelDef::new("Notes")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("sourceKey"))
                    .association(AssociationDef::new("sourceKey", "Customers", "id")),
            )
            .model(
                ModelDef::new("Customers")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::associated("notes", HopDef::to("Notes").has_many())),
            )
            .bake()
            .unwrap();

        let customers = orm.model(orm.resolve("Customers").unwrap());
        let Some(Field::Associated(a)) = customers.field("notes") else {
            panic!("expected association");
        };
        assert_eq!((a.hop.key.as_str(), a.hop.foreign_key.as_str()), ("id", "sourceKey"));
        assert!(a.has_many());
    }

    #[test]
    fn keys_fall_back_to_convention() {
        let orm = Orm::builder()
            .model(countries())
            .model(
                ModelDef::new("Cities")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("Countries_id"))
                    .field(FieldDef::associated("country", HopDef::to("Countries"))),
            )
            .bake()
            .unwrap();
        let cities = orm.model(orm.resolve("Cities").unwrap());
        let Some(Field::Associated(a)) = cities.field("country") else {
            panic!("expected association");
        };
        assert_eq!(a.hop.key, "Countries_id");
        assert_eq!(a.hop.foreign_key, "id");
    }

    #[test]
    fn unknown_join_type_is_a_usage_error() {
        let err = Orm::builder()
            .model(countries())
            .model(
                ModelDef::new("Cities")
                    .field(FieldDef::data("country_id"))
                    .field(FieldDef::associated(
                        "country",
                        HopDef::to("Countries").key("country_id").foreign_key("id").join_type("sideways"),
                    )),
            )
            .bake()
            .unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::InvalidJoinType));
    }

    #[test]
    fn intermediate_field_name_is_rejected() {
        let err = Orm::builder()
            .model(countries())
            .model(
                ModelDef::new("States")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("country_id")),
            )
            .model(
                ModelDef::new("Cities")
                    .field(FieldDef::data("state_id"))
                    .field(FieldDef::associated(
                        "countryName",
                        HopDef::to("States")
                            .key("state_id")
                            .foreign_key("id")
                            .field_name("id")
                            .towards(HopDef::to("Countries").key("country_id").foreign_key("id")),
                    )),
            )
            .bake()
            .unwrap_err();
        assert!(matches!(err, Error::Definition(_)));
    }

    #[test]
    fn multi_value_towards_is_rejected() {
        let err = Orm::builder()
            .model(countries())
            .model(
                ModelDef::new("Cities")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("country_id"))
                    .field(FieldDef::associated(
                        "x",
                        HopDef::to("Countries")
                            .key("country_id")
                            .foreign_key("id")
                            .towards(HopDef::to("Cities").key("id").foreign_key("country_id").has_many()),
                    )),
            )
            .bake()
            .unwrap_err();
        assert!(matches!(err, Error::Definition(_)));
    }

    #[test]
    fn duplicate_fields_and_unknown_models_fail() {
        let dup = Orm::builder()
            .model(
                ModelDef::new("A")
                    .field(FieldDef::data("id"))
                    .field(FieldDef::data("ID")),
            )
            .bake();
        assert!(matches!(dup, Err(Error::Definition(_))));

        let missing = Orm::builder()
            .model(ModelDef::new("A").field(FieldDef::associated("b", HopDef::to("B"))))
            .bake();
        assert!(matches!(missing, Err(Error::Definition(_))));
    }

    #[test]
    fn fields_keep_definition_order_and_schema_lookup() {
        let orm = OrmBuilder::from_json(
            r#"{"models": [
                {"name": "Countries", "schema": "geo", "fields": [
                    {"kind": "data", "name": "id", "primaryKey": true}
                ]},
                {"name": "Cities", "schema": "geo", "table": "cities", "fields": [
                    {"kind": "data", "name": "id", "primaryKey": true},
                    {"kind": "associated", "name": "country", "foreignModel": "geo.Countries",
                     "key": "country_id", "foreignKey": "id"},
                    {"kind": "data", "name": "country_id"}
                ]}
            ]}"#,
        )
        .unwrap()
        .bake()
        .unwrap();

        let cities = orm.model(orm.resolve("GEO.cities").unwrap());
        let names: Vec<_> = cities.fields().iter().map(Field::name).collect();
        assert_eq!(names, vec!["id", "country", "country_id"]);
        assert_eq!(cities.qualified_name(), "geo.Cities");
        assert_eq!(cities.primary_key(), "id");
    }

    #[test]
    fn calculated_requires_are_checked() {
        let err = Orm::builder()
            .model(
                ModelDef::new("A")
                    .field(FieldDef::data("id"))
                    .field(FieldDef::calculated("label", &["nope"], |_| crate::Value::Null)),
            )
            .bake();
        assert!(matches!(err, Err(Error::Definition(_))));
    }
}
