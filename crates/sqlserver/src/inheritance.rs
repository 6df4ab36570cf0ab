//! Single-table inheritance discriminators

use std::collections::BTreeMap;

use crate::error::{DialectError, DialectResult};
use crate::value::SqlValue;

/// Maps values of a type column to variant names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubclassRegistry {
    base: String,
    column: String,
    variants: BTreeMap<String, String>,
}

impl SubclassRegistry {
    /// Registry for `base` discriminated by the `type` column
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            column: "type".to_string(),
            variants: BTreeMap::new(),
        }
    }

    pub fn discriminator(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    /// Register a variant stored under `value`
    pub fn variant(mut self, value: &str, name: &str) -> Self {
        self.variants.insert(value.to_string(), name.to_string());
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Resolve a discriminator value to a variant name
    ///
    /// NULL and empty values resolve to the base; unregistered values fail
    /// with `SubclassNotFound`.
    pub fn resolve(&self, value: &SqlValue) -> DialectResult<&str> {
        let value = match value {
            SqlValue::Null => return Ok(&self.base),
            SqlValue::String(s) => s.as_str(),
            other => {
                return Err(DialectError::SubclassNotFound {
                    base: self.base.clone(),
                    value: other.to_json().to_string(),
                })
            }
        };

        if value.is_empty() || value == self.base {
            return Ok(&self.base);
        }

        self.variants
            .get(value)
            .map(String::as_str)
            .ok_or_else(|| DialectError::SubclassNotFound {
                base: self.base.clone(),
                value: value.to_string(),
            })
    }
}
