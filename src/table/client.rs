use crate::config::ClientConfig;
use crate::core::{ContinuationToken, Outcome, Properties, Result, StoreError, VersionTag};
use crate::mapping::{EntityMapping, TableEntity, TableRecord};
use crate::query::QueryBuilder;
use crate::retry::{bounded, wait_for_lifecycle};
use crate::service::{RowOperation, RowResponse, TableService};
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Largest batch the table service accepts is one below this.
pub const MAX_BATCH_SIZE: usize = 100;

/// Typed CRUD and query access to one named table.
///
/// The client keeps no per-call state, so a single instance can be shared across
/// tasks. Optimistic-concurrency rejections come back as [`Outcome`] statuses and
/// are never retried here; the caller decides what to do with them.
pub struct TableClient<T> {
    service: Arc<dyn TableService>,
    table: String,
    mapping: Arc<EntityMapping<T>>,
    config: ClientConfig,
}

impl<T> Clone for TableClient<T> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            table: self.table.clone(),
            mapping: Arc::clone(&self.mapping),
            config: self.config.clone(),
        }
    }
}

impl<T: TableEntity> TableClient<T> {
    /// Opens `table` with the type's registered mapping, creating the table if absent.
    pub async fn open(
        service: Arc<dyn TableService>,
        table: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        Self::open_with_mapping(service, table, T::entity_mapping(), config).await
    }
}

impl<T: TableRecord + Default + Send + Sync + 'static> TableClient<T> {
    /// Opens `table` with an explicitly built mapping.
    ///
    /// A table that is still being deleted answers 409; creation is polled until it
    /// goes through or the lifecycle ceiling passes.
    pub async fn open_with_mapping(
        service: Arc<dyn TableService>,
        table: impl Into<String>,
        mapping: Arc<EntityMapping<T>>,
        config: ClientConfig,
    ) -> Result<Self> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(StoreError::Validation("table name cannot be empty".to_string()));
        }
        config.validate()?;

        let client = Self {
            service,
            table,
            mapping,
            config,
        };

        let created = wait_for_lifecycle(&client.config.lifecycle_wait, || {
            client.call(client.service.ensure_table_exists(&client.table))
        })
        .await?;
        event!(Level::DEBUG, table = %client.table, created, "table ready");

        Ok(client)
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn mapping(&self) -> &EntityMapping<T> {
        &self.mapping
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn call<R>(&self, request: impl Future<Output = Result<R>>) -> Result<R> {
        bounded(
            self.config.request_timeout,
            &format!("table '{}'", self.table),
            request,
        )
        .await
    }

    async fn execute_write(
        &self,
        operation: RowOperation,
        condition: Option<&VersionTag>,
    ) -> Result<Outcome<()>> {
        let span = info_span!(
            "table.write",
            table = %self.table,
            op = operation.name(),
            partition_key = %operation.key().0,
            row_key = %operation.key().1,
            conditional = condition.is_some()
        );
        let response = self
            .call(self.service.execute(&self.table, operation, condition))
            .instrument(span)
            .await;
        write_outcome(response)
    }

    /// Creates the row; an existing row yields a 409 outcome.
    pub async fn insert(&self, record: &T) -> Result<Outcome<()>> {
        let row = self.mapping.write(record)?;
        self.execute_write(RowOperation::Insert(row), None).await
    }

    /// Inserts or replaces the row unconditionally.
    pub async fn upsert(&self, record: &T) -> Result<Outcome<()>> {
        self.upsert_if(record, None).await
    }

    /// Replaces the row only while it still carries `version`; `None` writes unconditionally.
    pub async fn upsert_if(&self, record: &T, version: Option<VersionTag>) -> Result<Outcome<()>> {
        let row = self.mapping.write(record)?;
        self.execute_write(RowOperation::Upsert(row), version.as_ref())
            .await
    }

    /// Writes only `fields`, leaving every other column of the row untouched.
    pub async fn merge_fields(
        &self,
        partition_key: &str,
        row_key: &str,
        fields: Properties,
        version: Option<VersionTag>,
    ) -> Result<Outcome<()>> {
        self.execute_write(
            RowOperation::merge(partition_key, row_key, fields),
            version.as_ref(),
        )
        .await
    }

    /// Inserts or replaces all `records` atomically.
    ///
    /// The records must share one partition key and number fewer than
    /// [`MAX_BATCH_SIZE`]; both are checked before anything is sent.
    pub async fn batch_upsert(&self, records: &[T]) -> Result<Outcome<()>> {
        let Some(first) = records.first() else {
            return Ok(Outcome::success());
        };

        if records.len() >= MAX_BATCH_SIZE {
            return Err(StoreError::Validation(format!(
                "batch holds {} records, limit is {}",
                records.len(),
                MAX_BATCH_SIZE - 1
            )));
        }

        let partition_key = first.partition_key();
        if let Some(stray) = records
            .iter()
            .map(TableRecord::partition_key)
            .find(|key| *key != partition_key)
        {
            return Err(StoreError::Validation(format!(
                "batch mixes partition keys '{}' and '{}'",
                partition_key, stray
            )));
        }

        let operations = records
            .iter()
            .map(|record| self.mapping.write(record).map(RowOperation::Upsert))
            .collect::<Result<Vec<_>>>()?;

        let span = info_span!(
            "table.batch",
            table = %self.table,
            partition_key = %partition_key,
            size = operations.len()
        );
        let committed = self
            .call(self.service.execute_batch(&self.table, operations))
            .instrument(span)
            .await;

        match committed {
            Ok(status) => Ok(Outcome {
                status,
                data: Some(()),
                version: None,
            }),
            Err(err) => Outcome::from_error(err),
        }
    }

    /// Point lookup; absence is a 404 outcome.
    pub async fn retrieve_one(&self, partition_key: &str, row_key: &str) -> Result<Outcome<T>> {
        let operation = RowOperation::Retrieve {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        };
        let span = info_span!(
            "table.retrieve",
            table = %self.table,
            partition_key = %partition_key,
            row_key = %row_key
        );
        let response = self
            .call(self.service.execute(&self.table, operation, None))
            .instrument(span)
            .await;

        match response {
            Ok(RowResponse {
                status,
                version,
                row: Some(row),
            }) => {
                let record = self.mapping.read(row)?;
                Ok(Outcome {
                    status,
                    data: Some(record),
                    version,
                })
            }
            Ok(response) => Err(StoreError::Transport(format!(
                "retrieve answered {} without a row",
                response.status
            ))),
            Err(err) => Outcome::from_error(err),
        }
    }

    /// The record with the version tag it currently carries, or `None` when absent.
    pub async fn retrieve_versioned(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<(T, VersionTag)>> {
        let outcome = self.retrieve_one(partition_key, row_key).await?;
        if !outcome.is_ok() {
            return Ok(None);
        }
        match (outcome.data, outcome.version) {
            (Some(record), Some(version)) => Ok(Some((record, version))),
            (Some(_), None) => Err(StoreError::Transport(format!(
                "row ('{}', '{}') came back without a version tag",
                partition_key, row_key
            ))),
            _ => Ok(None),
        }
    }

    /// Every row of one partition, in row-key order.
    pub async fn retrieve_by_partition(&self, partition_key: &str) -> Result<Outcome<Vec<T>>> {
        let filter = QueryBuilder::new().partition_key(partition_key).build();
        self.retrieve_by_query(&filter).await
    }

    /// Every row matching `filter`; an empty filter scans the whole table.
    ///
    /// Segments are followed until the service stops returning a continuation
    /// token, so the result is always complete.
    pub async fn retrieve_by_query(&self, filter: &str) -> Result<Outcome<Vec<T>>> {
        let filter = Some(filter).filter(|f| !f.trim().is_empty());
        let span = info_span!("table.query", table = %self.table, filter = filter.unwrap_or(""));

        let collected = async {
            let mut records = Vec::new();
            let mut continuation: Option<ContinuationToken> = None;
            let mut pages = 0usize;
            loop {
                let segment = self
                    .call(
                        self.service
                            .query_segment(&self.table, filter, continuation.as_ref()),
                    )
                    .await?;
                pages += 1;
                for row in segment.rows {
                    records.push(self.mapping.read(row)?);
                }
                match segment.continuation {
                    Some(token) => continuation = Some(token),
                    None => break,
                }
            }
            event!(Level::DEBUG, pages, rows = records.len(), "query complete");
            Ok::<_, StoreError>(records)
        }
        .instrument(span)
        .await;

        match collected {
            Ok(records) => Ok(Outcome::ok(records)),
            Err(err) => Outcome::from_error(err),
        }
    }

    /// Removes one row; `version` makes the delete conditional.
    pub async fn delete(
        &self,
        partition_key: &str,
        row_key: &str,
        version: Option<VersionTag>,
    ) -> Result<Outcome<()>> {
        let operation = RowOperation::Delete {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        };
        self.execute_write(operation, version.as_ref()).await
    }

    /// Removes the row identified by `record`'s key pair, unconditionally.
    pub async fn delete_record(&self, record: &T) -> Result<Outcome<()>> {
        self.delete(&record.partition_key(), &record.row_key(), None)
            .await
    }
}

fn write_outcome(response: Result<RowResponse>) -> Result<Outcome<()>> {
    match response {
        Ok(response) => Ok(Outcome {
            status: response.status,
            data: Some(()),
            version: response.version,
        }),
        Err(err) => Outcome::from_error(err),
    }
}
