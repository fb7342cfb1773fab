//! Nested result objects.

use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One member of a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A single column value (NULL for absent left-joined rows)
    Value(Value),
    /// A nested one-to-one object
    Object(Record),
    /// A one-to-many collection, possibly empty
    List(Vec<Node>),
}

impl Node {
    /// Get the scalar value, if this node is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Get the nested object, if this node is one.
    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Node::Object(r) => Some(r),
            _ => None,
        }
    }

    /// Get the collection, if this node is one.
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }
}

/// A nested result object whose keys follow the requested aliases, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Node)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `n` entries.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    /// Set `key`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = node;
        } else {
            self.entries.push((key, node));
        }
    }

    /// Get a member by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    /// Get a scalar member by key.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(Node::as_value)
    }

    /// Get a nested object by key.
    pub fn object(&self, key: &str) -> Option<&Record> {
        self.get(key).and_then(Node::as_object)
    }

    /// Get a collection by key.
    pub fn list(&self, key: &str) -> Option<&[Node]> {
        self.get(key).and_then(Node::as_list)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate over (key, node) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the record has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Value(v) => v.serialize(serializer),
            Node::Object(r) => r.serialize(serializer),
            Node::List(items) => items.serialize(serializer),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, n) in &self.entries {
            map.serialize_entry(k, n)?;
        }
        map.end()
    }
}
