//! Record ⇄ row translation.
//!
//! A mapping is a static registry of `(column, getter, setter, kind)` entries built
//! once per record type, either by hand through [`EntityMapping::builder`] or by
//! `#[derive(TableEntity)]`.

pub mod column;
pub mod entity;

pub use column::{ColumnValue, Enumerant, enumerant_from_typed, enumerant_to_typed};
pub use entity::{
    EntityMapping, EntityMappingBuilder, FieldBinding, RESERVED_COLUMNS, TableEntity, TableRecord,
};
