use crate::core::{Result, StoreError};
use crate::retry::Backoff;
use std::time::Duration;

/// Default upper bound for a single collaborator call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Attempt budget and delay for an optimistic retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for RetryPolicy {
    /// Three attempts one second apart, used by metadata patching.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Polling schedule while a table or container is being provisioned or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleWaitPolicy {
    pub poll_interval: Duration,
    pub ceiling: Duration,
}

impl Default for LifecycleWaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            ceiling: Duration::from_secs(15 * 60),
        }
    }
}

/// Client options
///
/// The policy fields tune timeouts and retries of the table client and metadata
/// patcher. The account and endpoint fields are carried for network
/// [`TableService`](crate::TableService) / [`ObjectService`](crate::ObjectService)
/// implementations: the client and patcher never read them, and the in-memory
/// backends need none. An adapter typically takes them from
/// [`TableClient::config`](crate::TableClient::config) or from the parsed
/// connection string directly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Storage account, passed through to service adapters
    pub account_name: Option<String>,

    /// Shared key, passed through to service adapters
    pub account_key: Option<String>,

    /// `https` unless the connection string says otherwise
    pub protocol: String,

    /// Explicit table endpoint; see [`ClientConfig::resolved_table_endpoint`]
    pub table_endpoint: Option<String>,

    /// Explicit blob endpoint for object service adapters
    pub blob_endpoint: Option<String>,

    /// Upper bound for each collaborator call
    pub request_timeout: Duration,

    pub metadata_patch: RetryPolicy,

    pub lifecycle_wait: LifecycleWaitPolicy,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            account_name: None,
            account_key: None,
            protocol: "https".to_string(),
            table_endpoint: None,
            blob_endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            metadata_patch: RetryPolicy::default(),
            lifecycle_wait: LifecycleWaitPolicy::default(),
        }
    }

    pub fn account(mut self, name: &str, key: &str) -> Self {
        self.account_name = Some(name.to_string());
        self.account_key = Some(key.to_string());
        self
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.protocol = protocol.to_string();
        self
    }

    pub fn table_endpoint(mut self, endpoint: &str) -> Self {
        self.table_endpoint = Some(endpoint.to_string());
        self
    }

    pub fn blob_endpoint(mut self, endpoint: &str) -> Self {
        self.blob_endpoint = Some(endpoint.to_string());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn metadata_patch(mut self, policy: RetryPolicy) -> Self {
        self.metadata_patch = policy;
        self
    }

    pub fn lifecycle_wait(mut self, policy: LifecycleWaitPolicy) -> Self {
        self.lifecycle_wait = policy;
        self
    }

    /// Parse a storage connection string
    ///
    /// Format: `Key=Value` pairs separated by `;`. Unknown keys are ignored,
    /// values may themselves contain `=` (account keys usually end in padding).
    ///
    /// # Examples
    ///
    /// ```
    /// use tablestore::ClientConfig;
    ///
    /// let config = ClientConfig::from_connection_string(
    ///     "DefaultEndpointsProtocol=http;AccountName=dev;AccountKey=a2V5==",
    /// ).unwrap();
    /// assert_eq!(config.account_name.as_deref(), Some("dev"));
    /// assert_eq!(config.account_key.as_deref(), Some("a2V5=="));
    /// ```
    pub fn from_connection_string(connection: &str) -> Result<Self> {
        let mut config = Self::new();

        for pair in connection.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StoreError::Validation(format!("malformed connection string segment '{}'", pair))
            })?;

            match key.trim() {
                "AccountName" => config.account_name = Some(value.to_string()),
                "AccountKey" => config.account_key = Some(value.to_string()),
                "DefaultEndpointsProtocol" => config.protocol = value.to_string(),
                "TableEndpoint" => config.table_endpoint = Some(value.to_string()),
                "BlobEndpoint" => config.blob_endpoint = Some(value.to_string()),
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to connection string
    pub fn to_connection_string(&self) -> String {
        let mut parts = vec![format!("DefaultEndpointsProtocol={}", self.protocol)];
        if let Some(name) = &self.account_name {
            parts.push(format!("AccountName={}", name));
        }
        if self.account_key.is_some() {
            parts.push("AccountKey=***".to_string()); // never expose the key
        }
        if let Some(endpoint) = &self.table_endpoint {
            parts.push(format!("TableEndpoint={}", endpoint));
        }
        if let Some(endpoint) = &self.blob_endpoint {
            parts.push(format!("BlobEndpoint={}", endpoint));
        }
        parts.join(";")
    }

    /// Table endpoint, derived from the account name when not given explicitly.
    pub fn resolved_table_endpoint(&self) -> Option<String> {
        self.table_endpoint.clone().or_else(|| {
            self.account_name
                .as_ref()
                .map(|name| format!("{}://{}.table.core.windows.net", self.protocol, name))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(StoreError::Validation(format!(
                "unsupported protocol '{}'",
                self.protocol
            )));
        }

        if self.account_name.is_some() != self.account_key.is_some() {
            return Err(StoreError::Validation(
                "AccountName and AccountKey must be given together".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(StoreError::Validation("request_timeout must be > 0".to_string()));
        }

        if self.metadata_patch.max_attempts == 0 {
            return Err(StoreError::Validation(
                "metadata_patch.max_attempts must be > 0".to_string(),
            ));
        }

        if self.lifecycle_wait.poll_interval > self.lifecycle_wait.ceiling {
            return Err(StoreError::Validation(
                "lifecycle poll interval cannot exceed its ceiling".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.metadata_patch.max_attempts, 3);
        assert_eq!(config.metadata_patch.base_delay, Duration::from_secs(1));
        assert_eq!(config.lifecycle_wait.poll_interval, Duration::from_millis(500));
        assert_eq!(config.lifecycle_wait.ceiling, Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::new()
            .account("dev", "c2VjcmV0")
            .protocol("http")
            .table_endpoint("http://127.0.0.1:10002/dev")
            .request_timeout(Duration::from_secs(2));

        assert_eq!(config.protocol, "http");
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(
            config.resolved_table_endpoint().as_deref(),
            Some("http://127.0.0.1:10002/dev")
        );
    }

    #[test]
    fn test_from_connection_string() {
        let config = ClientConfig::from_connection_string(
            concat!(
                "DefaultEndpointsProtocol=https;AccountName=prod;",
                "AccountKey=abc/def==;BlobEndpoint=https://b.example",
            ),
        )
        .unwrap();

        assert_eq!(config.account_name.as_deref(), Some("prod"));
        assert_eq!(config.account_key.as_deref(), Some("abc/def=="));
        assert_eq!(config.blob_endpoint.as_deref(), Some("https://b.example"));
        assert_eq!(
            config.resolved_table_endpoint().as_deref(),
            Some("https://prod.table.core.windows.net")
        );
    }

    #[test]
    fn test_invalid_connection_string() {
        assert!(ClientConfig::from_connection_string("AccountName").is_err());
        assert!(ClientConfig::from_connection_string("AccountName=only").is_err());
        assert!(ClientConfig::from_connection_string("DefaultEndpointsProtocol=ftp").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(
            ClientConfig::new()
                .request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ClientConfig::new()
                .metadata_patch(RetryPolicy::new(0, Duration::from_secs(1)))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_to_connection_string_hides_key() {
        let config = ClientConfig::new().account("alice", "secret123");
        let rendered = config.to_connection_string();
        assert!(!rendered.contains("secret123"));
        assert!(rendered.contains("AccountKey=***"));
        assert!(rendered.contains("AccountName=alice"));
    }
}
