pub mod builder;
pub mod literal;

pub use builder::QueryBuilder;
pub use literal::{FilterLiteral, render_timestamp};
