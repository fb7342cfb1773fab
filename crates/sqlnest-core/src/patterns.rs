//! Compiled shorthand patterns.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

type Slot = OnceLock<std::result::Result<Regex, regex::Error>>;

fn compiled(slot: &'static Slot, pattern: &str) -> Result<&'static Regex> {
    slot.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| Error::Custom(format!("built-in pattern failed to compile: {e}")))
}

/// `field`, `field alias`, `assoc.field`, `assoc.field alias`
pub(crate) fn attribute() -> Result<&'static Regex> {
    static SLOT: Slot = OnceLock::new();
    compiled(
        &SLOT,
        r"^\s*([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z_][A-Za-z0-9_]*))?(?:\s+([A-Za-z_][A-Za-z0-9_]*))?\s*$",
    )
}

/// Dotted field path followed by an optional operator suffix, e.g. `country.name!=`
pub(crate) fn filter_key() -> Result<&'static Regex> {
    static SLOT: Slot = OnceLock::new();
    compiled(
        &SLOT,
        r"^\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(=|!=|<>|>=|<=|>|<|!~|~)?\s*$",
    )
}

/// Optional direction sign followed by a dotted field path, e.g. `-country.name`
pub(crate) fn sort_key() -> Result<&'static Regex> {
    static SLOT: Slot = OnceLock::new();
    compiled(
        &SLOT,
        r"^\s*([+-])?([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*$",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_patterns_compile() {
        assert!(attribute().is_ok());
        assert!(filter_key().is_ok());
        assert!(sort_key().is_ok());
    }
}
