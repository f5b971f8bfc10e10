use super::table::next_version;
use crate::core::{Result, StoreError, VersionTag};
use crate::service::{MetadataHandle, MetadataMap, ObjectKey, ObjectService, VersionedMetadata};
use async_trait::async_trait;
use http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    metadata: MetadataMap,
    version: VersionTag,
}

type Containers = HashMap<String, HashMap<String, StoredObject>>;

/// In-process object service holding only per-object metadata and versions.
///
/// Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct MemoryObjectService {
    containers: Arc<RwLock<Containers>>,
}

impl MemoryObjectService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or overwrites an object with the given metadata, creating its container if needed.
    pub async fn put_object(&self, key: &ObjectKey, metadata: MetadataMap) -> VersionTag {
        let version = next_version();
        let mut containers = self.containers.write().await;
        containers.entry(key.container.clone()).or_default().insert(
            key.name.clone(),
            StoredObject {
                metadata,
                version: version.clone(),
            },
        );
        version
    }

    pub async fn container_exists(&self, container: &str) -> bool {
        self.containers.read().await.contains_key(container)
    }
}

fn object_not_found(key: &ObjectKey) -> StoreError {
    StoreError::service(StatusCode::NOT_FOUND, format!("object '{}' not found", key))
}

#[async_trait]
impl ObjectService for MemoryObjectService {
    type Handle = MemoryObjectHandle;

    async fn ensure_container(&self, container: &str) -> Result<bool> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(container.to_string(), HashMap::new());
        Ok(true)
    }

    fn handle(&self, key: &ObjectKey) -> MemoryObjectHandle {
        MemoryObjectHandle {
            containers: Arc::clone(&self.containers),
            key: key.clone(),
        }
    }
}

/// Metadata capability for one object of a [`MemoryObjectService`].
#[derive(Clone)]
pub struct MemoryObjectHandle {
    containers: Arc<RwLock<Containers>>,
    key: ObjectKey,
}

impl MemoryObjectHandle {
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }
}

#[async_trait]
impl MetadataHandle for MemoryObjectHandle {
    async fn fetch_metadata(&self) -> Result<VersionedMetadata> {
        let containers = self.containers.read().await;
        let stored = containers
            .get(&self.key.container)
            .and_then(|objects| objects.get(&self.key.name))
            .ok_or_else(|| object_not_found(&self.key))?;
        Ok(VersionedMetadata {
            metadata: stored.metadata.clone(),
            version: stored.version.clone(),
        })
    }

    async fn set_metadata(
        &self,
        metadata: MetadataMap,
        condition: Option<&VersionTag>,
    ) -> Result<VersionTag> {
        let mut containers = self.containers.write().await;
        let stored = containers
            .get_mut(&self.key.container)
            .and_then(|objects| objects.get_mut(&self.key.name))
            .ok_or_else(|| object_not_found(&self.key))?;

        if let Some(expected) = condition {
            if *expected != stored.version {
                return Err(StoreError::service(
                    StatusCode::PRECONDITION_FAILED,
                    format!("object '{}' changed since version {}", self.key, expected),
                ));
            }
        }

        stored.metadata = metadata;
        stored.version = next_version();
        Ok(stored.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conditional_set_rejects_stale_version() {
        let service = MemoryObjectService::new();
        let key = ObjectKey::new("c", "o");
        let v1 = service.put_object(&key, MetadataMap::new()).await;
        let handle = service.handle(&key);

        let mut metadata = MetadataMap::new();
        metadata.insert("a".into(), "1".into());
        let v2 = handle.set_metadata(metadata.clone(), Some(&v1)).await.unwrap();
        assert_ne!(v1, v2);

        let err = handle.set_metadata(metadata, Some(&v1)).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::PRECONDITION_FAILED));

        let current = handle.fetch_metadata().await.unwrap();
        assert_eq!(current.version, v2);
        assert_eq!(current.metadata.get("a").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let service = MemoryObjectService::new();
        service.ensure_container("c").await.unwrap();
        let err = service
            .handle(&ObjectKey::new("c", "missing"))
            .fetch_metadata()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
