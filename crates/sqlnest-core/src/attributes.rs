//! Attribute requests: which fields to fetch and under which output aliases.
//!
//! Requests come in three shapes that all normalize to a list of
//! [`AttributeSpec`]s:
//!
//! - shorthand strings: `"name"`, `"name cityName"`, `"country.name"`,
//!   `"country.name countryName"`
//! - an object mapping alias to a field name (`{"cityName": "name"}`), to a
//!   nested request for an association (`{"notes": ["id", "text"]}`), or to an
//!   explicit spec (`{"n": {"field": "notes", "attributes": ["id"]}}`)
//! - an array mixing both

use crate::error::{Error, Result, SyntaxErrorKind};
use crate::patterns;
use serde::{Deserialize, Deserializer};

/// One requested output member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Key in the output record
    pub alias: String,
    /// Field name on the model being resolved
    pub field: String,
    /// Leaf field requested through a single-value association
    pub sub_field: Option<String>,
    /// Nested request for an association; `None` means its defaults
    pub attributes: Option<Attributes>,
}

impl AttributeSpec {
    /// Request `field` under its own name.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            field: name,
            sub_field: None,
            attributes: None,
        }
    }

    /// Set the output alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Request a single leaf field through the association.
    pub fn sub_field(mut self, sub: impl Into<String>) -> Self {
        self.sub_field = Some(sub.into());
        self
    }

    /// Request specific attributes of the associated model.
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Parse the `"field[.sub][ alias]"` shorthand.
    ///
    /// Without an alias the output key is the first path segment.
    pub fn parse(input: &str) -> Result<Self> {
        let (field, sub, alias) = split_shorthand(input)?;
        let mut spec = Self::field(field);
        if let Some(sub) = sub {
            spec = spec.sub_field(sub);
        }
        if let Some(alias) = alias {
            spec = spec.alias(alias);
        }
        Ok(spec)
    }
}

fn split_shorthand(input: &str) -> Result<(&str, Option<&str>, Option<&str>)> {
    let re = patterns::attribute()?;
    let caps = re.captures(input).ok_or_else(|| {
        Error::syntax(
            SyntaxErrorKind::Attribute,
            input,
            "expected 'field', 'field alias', 'field.sub' or 'field.sub alias'",
        )
    })?;
    let field = caps.get(1).map_or("", |m| m.as_str());
    Ok((
        field,
        caps.get(2).map(|m| m.as_str()),
        caps.get(3).map(|m| m.as_str()),
    ))
}

/// An ordered attribute request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    specs: Vec<AttributeSpec>,
}

impl Attributes {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member.
    pub fn with(mut self, spec: AttributeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Parse a list of shorthand strings.
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let specs = items
            .iter()
            .map(|s| AttributeSpec::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { specs })
    }

    /// Parse the JSON request form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let mut specs = Vec::new();
        collect_json(json, &mut specs)?;
        Ok(Self { specs })
    }

    /// Members in request order.
    pub fn iter(&self) -> std::slice::Iter<'_, AttributeSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a AttributeSpec;
    type IntoIter = std::slice::Iter<'a, AttributeSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

impl FromIterator<AttributeSpec> for Attributes {
    fn from_iter<I: IntoIterator<Item = AttributeSpec>>(iter: I) -> Self {
        Self {
            specs: iter.into_iter().collect(),
        }
    }
}

fn collect_json(json: &serde_json::Value, out: &mut Vec<AttributeSpec>) -> Result<()> {
    match json {
        serde_json::Value::String(s) => out.push(AttributeSpec::parse(s)?),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_json(item, out)?;
            }
        }
        serde_json::Value::Object(map) => {
            for (alias, target) in map {
                out.push(aliased(alias, target)?);
            }
        }
        other => {
            return Err(Error::syntax(
                SyntaxErrorKind::Attribute,
                other.to_string(),
                "attributes must be strings, arrays or objects",
            ));
        }
    }
    Ok(())
}

fn aliased(alias: &str, target: &serde_json::Value) -> Result<AttributeSpec> {
    match target {
        serde_json::Value::String(path) => field_path(alias, path),
        serde_json::Value::Array(_) => {
            Ok(AttributeSpec::field(alias).attributes(Attributes::from_json(target)?))
        }
        serde_json::Value::Object(map) if is_explicit_spec(map) => {
            let mut spec = match map.get("field") {
                Some(serde_json::Value::String(path)) => field_path(alias, path)?,
                Some(other) => {
                    return Err(Error::syntax(
                        SyntaxErrorKind::Attribute,
                        other.to_string(),
                        "'field' must be a string",
                    ));
                }
                None => AttributeSpec::field(alias),
            };
            if let Some(nested) = map.get("attributes") {
                spec = spec.attributes(Attributes::from_json(nested)?);
            }
            Ok(spec)
        }
        serde_json::Value::Object(_) => {
            Ok(AttributeSpec::field(alias).attributes(Attributes::from_json(target)?))
        }
        other => Err(Error::syntax(
            SyntaxErrorKind::Attribute,
            format!("{alias}: {other}"),
            "an alias must map to a field name, a list or an object",
        )),
    }
}

fn is_explicit_spec(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k == "field" || k == "attributes")
}

fn field_path(alias: &str, path: &str) -> Result<AttributeSpec> {
    let (field, sub, extra_alias) = split_shorthand(path)?;
    if extra_alias.is_some() {
        return Err(Error::syntax(
            SyntaxErrorKind::Attribute,
            path,
            "an aliased target cannot carry a second alias",
        ));
    }
    let mut spec = AttributeSpec::field(field).alias(alias);
    if let Some(sub) = sub {
        spec = spec.sub_field(sub);
    }
    Ok(spec)
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Attributes::from_json(&json).map_err(serde::de::Error::custom)
    }
}
