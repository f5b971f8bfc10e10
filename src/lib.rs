// ============================================================================
// tablestore Library
// ============================================================================

//! Typed records over a partitioned wide-column table store.
//!
//! Records are mapped onto rows identified by `(partition key, row key)` through a
//! static per-type registry, and concurrent writers are coordinated with the
//! store's version tags. Conflicts on entity writes are reported as [`Outcome`]
//! statuses; incremental metadata patches retry on their own.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tablestore::{ClientConfig, TableClient, TableEntity, TableEnum, TableRecord};
//! use tablestore::service::memory::MemoryTableService;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Default, TableEnum)]
//! enum Tier {
//!     #[default]
//!     Free,
//!     Paid,
//! }
//!
//! #[derive(Debug, Default, TableEntity)]
//! struct Account {
//!     tenant: String,
//!     id: String,
//!     #[column("DisplayName")]
//!     name: String,
//!     #[column(name = "Tier")]
//!     tier: Tier,
//! }
//!
//! impl TableRecord for Account {
//!     fn partition_key(&self) -> String {
//!         self.tenant.clone()
//!     }
//!
//!     fn row_key(&self) -> String {
//!         self.id.clone()
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let accounts: TableClient<Account> =
//!     TableClient::open(Arc::new(MemoryTableService::new()), "accounts", ClientConfig::default())
//!         .await?;
//!
//! let account = Account {
//!     tenant: "acme".into(),
//!     id: "42".into(),
//!     name: "Ada".into(),
//!     tier: Tier::Paid,
//! };
//! assert!(accounts.upsert(&account).await?.is_ok());
//!
//! let stored = accounts.retrieve_one("acme", "42").await?.into_data().unwrap();
//! assert_eq!(stored.tier, Tier::Paid);
//! assert!(accounts.retrieve_one("acme", "7").await?.is_not_found());
//! # Ok::<(), tablestore::StoreError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod core;
pub mod mapping;
pub mod metadata;
pub mod query;
pub mod retry;
pub mod service;
pub mod table;

pub use config::{ClientConfig, LifecycleWaitPolicy, RetryPolicy};
pub use core::{
    ContinuationToken, Outcome, Properties, Result, Row, StoreError, TypedValue, ValueKind,
    VersionTag,
};
pub use mapping::{ColumnValue, EntityMapping, Enumerant, TableEntity, TableRecord};
pub use metadata::{MetadataPatcher, ensure_container_ready};
pub use query::{FilterLiteral, QueryBuilder};
pub use retry::{Backoff, retry, retry_with, wait_for_lifecycle};
pub use service::{MetadataHandle, ObjectKey, ObjectService, TableService};
pub use table::TableClient;

pub use tablestore_derive::{TableEntity, TableEnum};
