//! Filter expressions over logical field paths.
//!
//! A filter is written against field names of a model, not columns. Keys may
//! reach through single-value associations (`country.name`) and carry an
//! operator suffix (`id>=`). The planner rewrites every path into a joined
//! column reference before rendering.
//!
//! The JSON form mirrors the request documents callers send:
//!
//! ```json
//! { "id>": 3, "or": [{ "name~": "M%" }, { "country.name": "Germany" }] }
//! ```
//!
//! An object is the conjunction of its entries, an array is the conjunction
//! of its elements, and `and` / `or` keys introduce explicit combinators.

use crate::error::{Error, Result, SyntaxErrorKind};
use crate::patterns;
use crate::value::Value;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Comparison operator attached to a filter key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=` (the default when a key has no suffix)
    #[default]
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `~` (LIKE)
    Like,
    /// `!~` (NOT LIKE)
    NotLike,
}

impl Operator {
    /// Parse an operator suffix. An empty suffix means equality.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" | "=" => Some(Operator::Eq),
            "!=" | "<>" => Some(Operator::Ne),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            "~" => Some(Operator::Like),
            "!~" => Some(Operator::NotLike),
            _ => None,
        }
    }

    /// The suffix as written in filter keys.
    pub const fn suffix(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Like => "~",
            Operator::NotLike => "!~",
        }
    }
}

/// A single `path op value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Dotted logical path, e.g. `country.name`
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    /// Path segments of the field reference.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.field.split('.')
    }
}

/// A boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::And(Vec::new())
    }
}

impl Filter {
    /// Build a comparison.
    pub fn cmp(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Filter::Condition(Condition {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    /// Build an equality comparison.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Eq, value)
    }

    /// Parse a key such as `"country.name!="` and pair it with `value`.
    pub fn from_key(key: &str, value: impl Into<Value>) -> Result<Self> {
        let re = patterns::filter_key()?;
        let caps = re.captures(key).ok_or_else(|| {
            Error::syntax(
                SyntaxErrorKind::Filter,
                key,
                "expected a field path with an optional operator suffix",
            )
        })?;
        let field = caps.get(1).map_or("", |m| m.as_str());
        let suffix = caps.get(2).map_or("", |m| m.as_str());
        let op = Operator::from_suffix(suffix).ok_or_else(|| {
            Error::syntax(SyntaxErrorKind::Filter, key, "unknown operator")
        })?;
        Ok(Self::cmp(field, op, value))
    }

    /// Conjunction, flattening a single member.
    pub fn all(mut filters: Vec<Filter>) -> Self {
        if filters.len() == 1 {
            filters.remove(0)
        } else {
            Filter::And(filters)
        }
    }

    /// Disjunction, flattening a single member.
    pub fn any(mut filters: Vec<Filter>) -> Self {
        if filters.len() == 1 {
            filters.remove(0)
        } else {
            Filter::Or(filters)
        }
    }

    /// Combine with another filter under AND.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (a, b) if a.is_empty() => b,
            (a, b) if b.is_empty() => a,
            (Filter::And(mut items), Filter::And(more)) => {
                items.extend(more);
                Filter::And(items)
            }
            (Filter::And(mut items), b) => {
                items.push(b);
                Filter::And(items)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// A filter with no conditions matches every row.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Condition(_) => false,
            Filter::And(items) => items.iter().all(Filter::is_empty),
            // An empty disjunction matches nothing.
            Filter::Or(items) => items.iter().any(Filter::is_empty),
        }
    }

    /// Parse the JSON request form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Filter::default()),
            serde_json::Value::Array(items) => {
                let parts = items.iter().map(Self::from_json).collect::<Result<Vec<_>>>()?;
                Ok(Self::all(parts))
            }
            serde_json::Value::Object(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let combinator = key.trim().to_ascii_lowercase();
                    match combinator.as_str() {
                        "and" => parts.push(Self::all(Self::members(key, value)?)),
                        "or" => parts.push(Self::any(Self::members(key, value)?)),
                        _ => parts.push(Self::from_key(key, operand(key, value)?)?),
                    }
                }
                Ok(Self::all(parts))
            }
            other => Err(Error::syntax(
                SyntaxErrorKind::Filter,
                other.to_string(),
                "a filter must be an object or an array of objects",
            )),
        }
    }

    fn members(key: &str, value: &serde_json::Value) -> Result<Vec<Filter>> {
        match value {
            serde_json::Value::Array(items) => items.iter().map(Self::from_json).collect(),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let single = serde_json::Value::Object(
                        std::iter::once((k.clone(), v.clone())).collect(),
                    );
                    Self::from_json(&single)
                })
                .collect(),
            other => Err(Error::syntax(
                SyntaxErrorKind::Filter,
                format!("{key}: {other}"),
                "combinator operands must be an array or an object",
            )),
        }
    }
}

fn operand(key: &str, value: &serde_json::Value) -> Result<Value> {
    if value.is_object() {
        return Err(Error::syntax(
            SyntaxErrorKind::Filter,
            format!("{key}: {value}"),
            "a comparison operand must be a scalar or a list",
        ));
    }
    Ok(Value::from(value.clone()))
}

impl fmt::Display for Filter {
    /// Canonical text, stable for equal filters; used in join signatures.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Condition(c) => write!(f, "{}{}{}", c.field, c.op.suffix(), c.value),
            Filter::And(items) | Filter::Or(items) => {
                let sep = if matches!(self, Filter::And(_)) { " AND " } else { " OR " };
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{sep}")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Filter::from_json(&json).map_err(serde::de::Error::custom)
    }
}
