pub mod error;
pub mod outcome;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use outcome::Outcome;
pub use types::{ContinuationToken, Properties, Row, VersionTag};
pub use value::{TypedValue, ValueKind};
