//! In-process reference backends for the service capabilities.

pub mod filter;
pub mod object;
pub mod table;

pub use filter::Filter;
pub use object::{MemoryObjectHandle, MemoryObjectService};
pub use table::{DEFAULT_PAGE_SIZE, MAX_BATCH_OPERATIONS, MemoryTableService};
