//! Sort keys over logical field paths.

use crate::error::{Error, Result, SyntaxErrorKind};
use crate::patterns;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// One `[+|-]field[.subField]` sort entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Dotted logical path
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Ascending sort on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse `"-country.name"`, `"+id"` or `"id"`.
    pub fn parse(input: &str) -> Result<Self> {
        let re = patterns::sort_key()?;
        let caps = re.captures(input).ok_or_else(|| {
            Error::syntax(
                SyntaxErrorKind::Sort,
                input,
                "expected an optional +/- followed by a field path",
            )
        })?;
        let descending = caps.get(1).is_some_and(|m| m.as_str() == "-");
        let field = caps.get(2).map_or("", |m| m.as_str());
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }

    /// Parse an ordered list of sort strings.
    pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Self>> {
        inputs.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    /// Path segments of the field reference.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.field.split('.')
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-")?;
        }
        write!(f, "{}", self.field)
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SortKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direction_and_path() {
        assert_eq!(SortKey::parse("-country.name").unwrap(), SortKey::desc("country.name"));
        assert_eq!(SortKey::parse("+id").unwrap(), SortKey::asc("id"));
        assert_eq!(SortKey::parse("name").unwrap(), SortKey::asc("name"));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["--id", "", "a..b", "-", "id desc"] {
            let err = SortKey::parse(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidSyntax(ref s) if s.kind == SyntaxErrorKind::Sort));
        }
    }

    #[test]
    fn deserializes_from_strings() {
        let keys: Vec<SortKey> = serde_json::from_str(r#"["-name", "id"]"#).unwrap();
        assert_eq!(keys, vec![SortKey::desc("name"), SortKey::asc("id")]);
        assert_eq!(keys[0].to_string(), "-name");
    }
}
