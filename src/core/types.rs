use super::TypedValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column map of a row, keyed by column name.
pub type Properties = BTreeMap<String, TypedValue>;

/// Opaque revision token (ETag) of a row or object.
///
/// Callers may only compare tags for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque cursor returned by a segmented query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Physical unit of storage, identified by `(partition_key, row_key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub partition_key: String,
    pub row_key: String,
    pub version: Option<VersionTag>,
    pub properties: Properties,
}

impl Row {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            version: None,
            properties: Properties::new(),
        }
    }

    pub fn with_property(
        mut self,
        column: impl Into<String>,
        value: impl Into<TypedValue>,
    ) -> Self {
        self.properties.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&TypedValue> {
        self.properties.get(column)
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.partition_key, &self.row_key)
    }
}
