//! Generic table store client.

pub mod client;

pub use client::{MAX_BATCH_SIZE, TableClient};
