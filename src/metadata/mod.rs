//! Object metadata maintenance: conflict-retrying patches and container lifecycle.

pub mod container;
pub mod patch;

pub use container::ensure_container_ready;
pub use patch::MetadataPatcher;
