use crate::core::{ContinuationToken, Properties, Result, Row, VersionTag};
use async_trait::async_trait;
use http::StatusCode;

/// A single row-level request understood by a [`TableService`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowOperation {
    /// Create the row; an existing row answers 409.
    Insert(Row),
    /// Replace the whole row. Unconditional writes create it when absent.
    Upsert(Row),
    /// Overwrite only the given columns of an existing row.
    Merge(Row),
    Delete {
        partition_key: String,
        row_key: String,
    },
    Retrieve {
        partition_key: String,
        row_key: String,
    },
}

impl RowOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Upsert(_) => "upsert",
            Self::Merge(_) => "merge",
            Self::Delete { .. } => "delete",
            Self::Retrieve { .. } => "retrieve",
        }
    }

    pub fn key(&self) -> (&str, &str) {
        match self {
            Self::Insert(row) | Self::Upsert(row) | Self::Merge(row) => row.key(),
            Self::Delete {
                partition_key,
                row_key,
            }
            | Self::Retrieve {
                partition_key,
                row_key,
            } => (partition_key, row_key),
        }
    }

    pub fn merge(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        properties: Properties,
    ) -> Self {
        let mut row = Row::new(partition_key, row_key);
        row.properties = properties;
        Self::Merge(row)
    }
}

/// Successful answer to a [`RowOperation`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowResponse {
    pub status: StatusCode,
    /// Version of the row after a write, or of the row that was retrieved.
    pub version: Option<VersionTag>,
    pub row: Option<Row>,
}

impl RowResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: None,
            row: None,
        }
    }
}

/// One page of a segmented query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySegment {
    pub rows: Vec<Row>,
    pub continuation: Option<ContinuationToken>,
}

/// Capability contract of a partitioned wide-column table service.
///
/// Rejections are reported as `StoreError::Service` carrying the status code the
/// service answered with; the caller decides which statuses have a policy.
#[async_trait]
pub trait TableService: Send + Sync {
    /// Creates the table when absent. Returns `true` if it was created.
    async fn ensure_table_exists(&self, table: &str) -> Result<bool>;

    /// Executes one operation. `condition` is the version the row must still carry;
    /// `None` writes unconditionally.
    async fn execute(
        &self,
        table: &str,
        operation: RowOperation,
        condition: Option<&VersionTag>,
    ) -> Result<RowResponse>;

    /// Executes operations sharing one partition atomically: all commit or none do.
    async fn execute_batch(&self, table: &str, operations: Vec<RowOperation>) -> Result<StatusCode>;

    /// Returns one page of rows matching `filter`, resuming from `continuation`.
    async fn query_segment(
        &self,
        table: &str,
        filter: Option<&str>,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QuerySegment>;
}
