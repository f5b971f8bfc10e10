use crate::config::ClientConfig;
use crate::core::{Result, StoreError};
use crate::retry::{bounded, wait_for_lifecycle};
use crate::service::ObjectService;
use tracing::{Level, event};

/// Creates `container` if needed, waiting out a previous deletion of the same name.
///
/// A container being deleted answers 409 until it is gone; creation is retried on
/// the lifecycle schedule and only on that status. Returns `true` if this call
/// created the container.
pub async fn ensure_container_ready<S>(
    service: &S,
    container: &str,
    config: &ClientConfig,
) -> Result<bool>
where
    S: ObjectService + ?Sized,
{
    if container.trim().is_empty() {
        return Err(StoreError::Validation("container name cannot be empty".to_string()));
    }

    let target = format!("container '{}'", container);
    let created = wait_for_lifecycle(&config.lifecycle_wait, || {
        bounded(
            config.request_timeout,
            &target,
            service.ensure_container(container),
        )
    })
    .await?;

    event!(Level::DEBUG, container, created, "container ready");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::memory::MemoryObjectService;

    #[tokio::test]
    async fn test_second_call_reports_existing_container() {
        let service = MemoryObjectService::new();
        let config = ClientConfig::default();
        assert!(ensure_container_ready(&service, "logs", &config).await.unwrap());
        assert!(!ensure_container_ready(&service, "logs", &config).await.unwrap());
        assert!(service.container_exists("logs").await);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let service = MemoryObjectService::new();
        let err = ensure_container_ready(&service, "", &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
