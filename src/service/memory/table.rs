use super::filter::Filter;
use crate::core::{
    ContinuationToken, Properties, Result, Row, StoreError, TypedValue, VersionTag,
};
use crate::service::{QuerySegment, RowOperation, RowResponse, TableService};
use async_trait::async_trait;
use chrono::SubsecRound;
use http::StatusCode;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Rows of one table ordered by `(partition_key, row_key)`.
type TableData = BTreeMap<(String, String), StoredRow>;

/// Largest page the real service hands out per segment.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Batches hold fewer than this many operations.
pub const MAX_BATCH_OPERATIONS: usize = 100;

#[derive(Debug, Clone)]
struct StoredRow {
    version: VersionTag,
    properties: Properties,
}

/// Fractional-second digits the store keeps: one tick is 100ns.
const TICK_DIGITS: u16 = 7;

/// Truncates timestamps to whole ticks, as the service does on write.
fn at_stored_precision(mut properties: Properties) -> Properties {
    for value in properties.values_mut() {
        if let TypedValue::Timestamp(ts) = value {
            *ts = ts.trunc_subsecs(TICK_DIGITS);
        }
    }
    properties
}

pub(crate) fn next_version() -> VersionTag {
    VersionTag::new(format!("W/\"{}\"", Uuid::new_v4()))
}

/// In-process [`TableService`] with the real service's conditional-write semantics.
pub struct MemoryTableService {
    /// Each table has its own lock; the outer lock only guards the name map.
    tables: RwLock<HashMap<String, Arc<RwLock<TableData>>>>,
    page_size: usize,
}

impl MemoryTableService {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Splits query results into segments of at most `page_size` rows.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        self.tables.read().await.contains_key(table)
    }

    pub async fn drop_table(&self, table: &str) -> Result<()> {
        self.tables
            .write()
            .await
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| table_not_found(table))
    }

    pub async fn row_count(&self, table: &str) -> Result<usize> {
        let handle = self.get_table(table).await?;
        let data = handle.read().await;
        Ok(data.len())
    }

    async fn get_table(&self, table: &str) -> Result<Arc<RwLock<TableData>>> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .ok_or_else(|| table_not_found(table))
    }
}

impl Default for MemoryTableService {
    fn default() -> Self {
        Self::new()
    }
}

fn table_not_found(table: &str) -> StoreError {
    StoreError::service(StatusCode::NOT_FOUND, format!("table '{}' not found", table))
}

fn row_not_found(key: &(String, String)) -> StoreError {
    StoreError::service(
        StatusCode::NOT_FOUND,
        format!("row ('{}', '{}') not found", key.0, key.1),
    )
}

fn check_condition(stored: &StoredRow, condition: Option<&VersionTag>) -> Result<()> {
    match condition {
        Some(expected) if *expected != stored.version => Err(StoreError::service(
            StatusCode::PRECONDITION_FAILED,
            format!(
                "version mismatch: expected {}, found {}",
                expected, stored.version
            ),
        )),
        _ => Ok(()),
    }
}

fn owned_key(partition_key: &str, row_key: &str) -> (String, String) {
    (partition_key.to_string(), row_key.to_string())
}

/// Applies one operation to `data`; shared by single and batch execution.
fn apply(
    data: &mut TableData,
    operation: RowOperation,
    condition: Option<&VersionTag>,
) -> Result<RowResponse> {
    let key = {
        let (partition_key, row_key) = operation.key();
        owned_key(partition_key, row_key)
    };

    match operation {
        RowOperation::Insert(row) => {
            if data.contains_key(&key) {
                return Err(StoreError::service(
                    StatusCode::CONFLICT,
                    format!("row ('{}', '{}') already exists", key.0, key.1),
                ));
            }
            let version = next_version();
            data.insert(
                key,
                StoredRow {
                    version: version.clone(),
                    properties: at_stored_precision(row.properties),
                },
            );
            Ok(RowResponse {
                status: StatusCode::CREATED,
                version: Some(version),
                row: None,
            })
        }
        RowOperation::Upsert(row) => {
            match (data.get(&key), condition) {
                (Some(stored), _) => check_condition(stored, condition)?,
                (None, Some(_)) => return Err(row_not_found(&key)),
                (None, None) => {}
            }
            let version = next_version();
            data.insert(
                key,
                StoredRow {
                    version: version.clone(),
                    properties: at_stored_precision(row.properties),
                },
            );
            Ok(RowResponse {
                status: StatusCode::NO_CONTENT,
                version: Some(version),
                row: None,
            })
        }
        RowOperation::Merge(row) => {
            let stored = data.get_mut(&key).ok_or_else(|| row_not_found(&key))?;
            check_condition(stored, condition)?;
            stored.properties.extend(at_stored_precision(row.properties));
            stored.version = next_version();
            Ok(RowResponse {
                status: StatusCode::NO_CONTENT,
                version: Some(stored.version.clone()),
                row: None,
            })
        }
        RowOperation::Delete { .. } => {
            let stored = data.get(&key).ok_or_else(|| row_not_found(&key))?;
            check_condition(stored, condition)?;
            data.remove(&key);
            Ok(RowResponse::new(StatusCode::NO_CONTENT))
        }
        RowOperation::Retrieve { .. } => {
            let stored = data.get(&key).ok_or_else(|| row_not_found(&key))?;
            let row = Row {
                partition_key: key.0.clone(),
                row_key: key.1.clone(),
                version: Some(stored.version.clone()),
                properties: stored.properties.clone(),
            };
            Ok(RowResponse {
                status: StatusCode::OK,
                version: Some(stored.version.clone()),
                row: Some(row),
            })
        }
    }
}

fn validate_batch(operations: &[RowOperation]) -> Result<()> {
    if operations.is_empty() || operations.len() >= MAX_BATCH_OPERATIONS {
        return Err(StoreError::service(
            StatusCode::BAD_REQUEST,
            format!(
                "batch must hold between 1 and {} operations, got {}",
                MAX_BATCH_OPERATIONS - 1,
                operations.len()
            ),
        ));
    }

    let partition = operations[0].key().0;
    let mut row_keys = HashSet::new();
    for operation in operations {
        let (partition_key, row_key) = operation.key();
        if partition_key != partition {
            return Err(StoreError::service(
                StatusCode::BAD_REQUEST,
                "all operations in a batch must share one partition key",
            ));
        }
        if !row_keys.insert(row_key) {
            return Err(StoreError::service(
                StatusCode::BAD_REQUEST,
                format!("row key '{}' appears more than once in the batch", row_key),
            ));
        }
    }
    Ok(())
}

fn encode_token(key: &(String, String)) -> Result<ContinuationToken> {
    Ok(ContinuationToken::new(serde_json::to_string(key)?))
}

fn decode_token(token: &ContinuationToken) -> Result<(String, String)> {
    serde_json::from_str(token.as_str()).map_err(|err| {
        StoreError::service(
            StatusCode::BAD_REQUEST,
            format!("invalid continuation token: {}", err),
        )
    })
}

#[async_trait]
impl TableService for MemoryTableService {
    async fn ensure_table_exists(&self, table: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_string(), Arc::new(RwLock::new(TableData::new())));
        Ok(true)
    }

    async fn execute(
        &self,
        table: &str,
        operation: RowOperation,
        condition: Option<&VersionTag>,
    ) -> Result<RowResponse> {
        let handle = self.get_table(table).await?;
        let mut data = handle.write().await;
        apply(&mut data, operation, condition)
    }

    async fn execute_batch(
        &self,
        table: &str,
        operations: Vec<RowOperation>,
    ) -> Result<StatusCode> {
        validate_batch(&operations)?;
        let handle = self.get_table(table).await?;
        let mut data = handle.write().await;

        let mut staged = data.clone();
        for operation in operations {
            apply(&mut staged, operation, None)?;
        }
        *data = staged;
        Ok(StatusCode::ACCEPTED)
    }

    async fn query_segment(
        &self,
        table: &str,
        filter: Option<&str>,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QuerySegment> {
        let filter = match filter.map(str::trim) {
            Some(text) if !text.is_empty() => Some(Filter::parse(text)?),
            _ => None,
        };
        let start = match continuation {
            Some(token) => Bound::Included(decode_token(token)?),
            None => Bound::Unbounded,
        };

        let handle = self.get_table(table).await?;
        let data = handle.read().await;

        let mut segment = QuerySegment::default();
        for (key, stored) in data.range((start, Bound::Unbounded)) {
            let row = Row {
                partition_key: key.0.clone(),
                row_key: key.1.clone(),
                version: Some(stored.version.clone()),
                properties: stored.properties.clone(),
            };
            if filter.as_ref().is_some_and(|filter| !filter.matches(&row)) {
                continue;
            }
            if segment.rows.len() == self.page_size {
                segment.continuation = Some(encode_token(key)?);
                break;
            }
            segment.rows.push(row);
        }
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service_with_table() -> MemoryTableService {
        let service = MemoryTableService::with_page_size(2);
        service.ensure_table_exists("t").await.unwrap();
        service
    }

    fn row(pk: &str, rk: &str) -> Row {
        Row::new(pk, rk).with_property("Value", 1)
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let service = MemoryTableService::new();
        assert!(service.ensure_table_exists("t").await.unwrap());
        assert!(!service.ensure_table_exists("t").await.unwrap());
        assert!(service.table_exists("t").await);
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_existing_row() {
        let service = service_with_table().await;
        service
            .execute("t", RowOperation::Insert(row("p", "a")), None)
            .await
            .unwrap();
        let err = service
            .execute("t", RowOperation::Insert(row("p", "a")), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn test_conditional_upsert_checks_version() {
        let service = service_with_table().await;
        let first = service
            .execute("t", RowOperation::Upsert(row("p", "a")), None)
            .await
            .unwrap();
        let v1 = first.version.unwrap();

        let second = service
            .execute("t", RowOperation::Upsert(row("p", "a")), Some(&v1))
            .await
            .unwrap();
        assert_ne!(second.version.as_ref(), Some(&v1));

        let err = service
            .execute("t", RowOperation::Upsert(row("p", "a")), Some(&v1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::PRECONDITION_FAILED));
    }

    #[tokio::test]
    async fn test_merge_keeps_untouched_columns() {
        let service = service_with_table().await;
        service
            .execute(
                "t",
                RowOperation::Upsert(row("p", "a").with_property("Name", "x")),
                None,
            )
            .await
            .unwrap();

        let mut fields = Properties::new();
        fields.insert("Value".to_string(), 7.into());
        service
            .execute("t", RowOperation::merge("p", "a", fields), None)
            .await
            .unwrap();

        let fetched = service
            .execute(
                "t",
                RowOperation::Retrieve {
                    partition_key: "p".into(),
                    row_key: "a".into(),
                },
                None,
            )
            .await
            .unwrap()
            .row
            .unwrap();
        assert_eq!(fetched.get("Value"), Some(&7.into()));
        assert_eq!(fetched.get("Name"), Some(&"x".into()));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let service = service_with_table().await;
        service
            .execute("t", RowOperation::Insert(row("p", "b")), None)
            .await
            .unwrap();

        let err = service
            .execute_batch(
                "t",
                vec![
                    RowOperation::Insert(row("p", "a")),
                    RowOperation::Insert(row("p", "b")),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(service.row_count("t").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_rejects_mixed_partitions() {
        let service = service_with_table().await;
        let err = service
            .execute_batch(
                "t",
                vec![
                    RowOperation::Upsert(row("p", "a")),
                    RowOperation::Upsert(row("q", "b")),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_segments_follow_key_order() {
        let service = service_with_table().await;
        for rk in ["c", "a", "e", "b", "d"] {
            service
                .execute("t", RowOperation::Upsert(row("p", rk)), None)
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut token = None;
        let mut pages = 0;
        loop {
            let segment = service
                .query_segment("t", Some("PartitionKey eq 'p'"), token.as_ref())
                .await
                .unwrap();
            pages += 1;
            seen.extend(segment.rows.into_iter().map(|row| row.row_key));
            token = segment.continuation;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let service = MemoryTableService::new();
        let err = service.query_segment("nope", None, None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_timestamps_are_stored_in_whole_ticks() {
        use chrono::{Duration, TimeZone, Utc};

        let service = service_with_table().await;
        let at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap().fixed_offset()
            + Duration::nanoseconds(246_913_579);
        service
            .execute(
                "t",
                RowOperation::Upsert(row("p", "a").with_property("At", TypedValue::Timestamp(at))),
                None,
            )
            .await
            .unwrap();

        let stored = service
            .query_segment("t", Some("At eq datetime'2020-01-01T00:00:00.2469135Z'"), None)
            .await
            .unwrap();
        assert_eq!(stored.rows.len(), 1);
        assert_eq!(
            stored.rows[0].get("At"),
            Some(&TypedValue::Timestamp(at - Duration::nanoseconds(79)))
        );

        let later = service
            .query_segment("t", Some("At gt datetime'2020-01-01T00:00:00.2469135Z'"), None)
            .await
            .unwrap();
        assert!(later.rows.is_empty());
    }
}
