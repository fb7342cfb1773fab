//! Find request options.

use serde::Deserialize;
use sqlnest_core::{Attributes, Filter, Result, SortKey};

/// Everything one `find` / `get` call needs besides the connection.
///
/// Deserializes from request JSON:
///
/// ```json
/// { "model": "Cities", "attributes": ["id", "name", "country"],
///   "filter": {"id": 1}, "sort": ["-country.name"], "limit": 10 }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindOptions {
    /// Model name, optionally `schema.name`
    pub model: String,
    /// `None` selects the model's data fields
    pub attributes: Option<Attributes>,
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Drop unknown or misused attributes instead of failing
    pub silent: bool,
    /// Log generated SQL and attach it to execution errors
    pub show_sql: bool,
    /// Caller value handed to dynamic association filters
    pub context: serde_json::Value,
}

impl FindOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON request document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Add a filter, ANDed onto any existing one.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlnest_core::AttributeSpec;

    #[test]
    fn parses_request_document() {
        let opts = FindOptions::from_json(
            r#"{"model": "Cities", "attributes": ["id", "country.name land"],
                "filter": {"id>": 1}, "sort": ["-name"], "limit": 5, "showSql": true}"#,
        )
        .unwrap();
        assert_eq!(opts.model, "Cities");
        assert_eq!(opts.attributes.as_ref().map(Attributes::len), Some(2));
        assert_eq!(
            opts.attributes.unwrap().iter().nth(1),
            Some(&AttributeSpec::field("country").sub_field("name").alias("land"))
        );
        assert_eq!(opts.sort, vec![SortKey::desc("name")]);
        assert!(opts.show_sql);
        assert!(!opts.silent);
        assert_eq!(opts.limit, Some(5));
    }

    #[test]
    fn invalid_documents_fail() {
        assert!(FindOptions::from_json(r#"{"model": "Cities", "sort": ["--x"]}"#).is_err());
    }

    #[test]
    fn builder_merges_filters() {
        let opts = FindOptions::new("Cities")
            .filter(Filter::eq("id", 1))
            .filter(Filter::eq("name", "Munich"));
        assert!(matches!(opts.filter, Some(Filter::And(ref items)) if items.len() == 2));
    }
}
