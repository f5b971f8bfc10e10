use crate::core::{Result, StoreError, VersionTag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type MetadataMap = HashMap<String, String>;

/// Address of a stored object: container plus object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub container: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
        }
    }

    /// Parses `container/name`; the name may itself contain `/`.
    pub fn parse(path: &str) -> Result<Self> {
        match path.split_once('/') {
            Some((container, name)) if !container.is_empty() && !name.is_empty() => {
                Ok(Self::new(container, name))
            }
            _ => Err(StoreError::Validation(format!(
                "object path '{}' must look like 'container/name'",
                path
            ))),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

/// Metadata snapshot paired with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedMetadata {
    pub metadata: MetadataMap,
    pub version: VersionTag,
}

/// Capability to read and conditionally replace one object's metadata.
#[async_trait]
pub trait MetadataHandle: Send + Sync {
    async fn fetch_metadata(&self) -> Result<VersionedMetadata>;

    /// Replaces the whole metadata map. With a `condition`, a changed object answers 412.
    async fn set_metadata(
        &self,
        metadata: MetadataMap,
        condition: Option<&VersionTag>,
    ) -> Result<VersionTag>;
}

/// Container-level capability of an object service.
#[async_trait]
pub trait ObjectService: Send + Sync {
    type Handle: MetadataHandle;

    /// Creates the container when absent. A container still being deleted answers 409.
    async fn ensure_container(&self, container: &str) -> Result<bool>;

    fn handle(&self, key: &ObjectKey) -> Self::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_key() {
        let key = ObjectKey::parse("runs/2024/out.bin").unwrap();
        assert_eq!(key.container, "runs");
        assert_eq!(key.name, "2024/out.bin");
        assert_eq!(key.to_string(), "runs/2024/out.bin");

        assert!(ObjectKey::parse("no-slash").is_err());
        assert!(ObjectKey::parse("/name").is_err());
    }
}
