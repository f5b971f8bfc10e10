//! Capability contracts of the external collaborators and in-memory implementations.

pub mod memory;
pub mod object;
pub mod table;

pub use object::{MetadataHandle, MetadataMap, ObjectKey, ObjectService, VersionedMetadata};
pub use table::{QuerySegment, RowOperation, RowResponse, TableService};
