use super::ColumnValue;
use crate::core::{Result, Row, StoreError, TypedValue, ValueKind};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Columns the table service owns; a mapped field may not claim them.
pub const RESERVED_COLUMNS: [&str; 3] = ["PartitionKey", "RowKey", "Timestamp"];

/// Identity capability every stored record type exposes.
pub trait TableRecord {
    fn partition_key(&self) -> String;
    fn row_key(&self) -> String;
}

/// A record type with a registered [`EntityMapping`].
///
/// `#[derive(TableEntity)]` implements this with a mapping built once per type.
pub trait TableEntity: TableRecord + Default + Send + Sync + Sized + 'static {
    fn entity_mapping() -> Arc<EntityMapping<Self>>;
}

type Getter<T> = Box<dyn Fn(&T) -> Result<Option<TypedValue>> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, TypedValue) -> Result<()> + Send + Sync>;

/// One `(column, getter, setter, kind)` entry of a mapping.
pub struct FieldBinding<T> {
    column: String,
    kind: ValueKind,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> FieldBinding<T> {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("column", &self.column)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Translates between a native record and a row's column map.
///
/// Immutable once built, so one instance can be shared by any number of callers.
pub struct EntityMapping<T> {
    fields: Vec<FieldBinding<T>>,
}

impl<T> fmt::Debug for EntityMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapping")
            .field("fields", &self.fields)
            .finish()
    }
}

impl<T: TableRecord + Default> EntityMapping<T> {
    pub fn builder() -> EntityMappingBuilder<T> {
        EntityMappingBuilder { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[FieldBinding<T>] {
        &self.fields
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.column.as_str())
    }

    /// Converts a record into a row keyed by the record's own identity.
    pub fn write(&self, record: &T) -> Result<Row> {
        let mut row = Row::new(record.partition_key(), record.row_key());
        for field in &self.fields {
            let Some(value) = (field.get)(record).map_err(|err| annotate(field, err))? else {
                continue;
            };
            if value.kind() != field.kind {
                return Err(StoreError::Mapping(format!(
                    "column '{}' is declared {} but produced {}",
                    field.column,
                    field.kind,
                    value.type_name()
                )));
            }
            row.properties.insert(field.column.clone(), value);
        }
        Ok(row)
    }

    /// Restores a record from a row.
    ///
    /// Mapped columns missing from the row leave the field at its default value.
    /// Columns the mapping does not know are ignored.
    pub fn read(&self, row: Row) -> Result<T> {
        let mut properties = row.properties;
        let mut record = T::default();
        for field in &self.fields {
            if let Some(value) = properties.remove(&field.column) {
                (field.set)(&mut record, value).map_err(|err| annotate(field, err))?;
            }
        }
        Ok(record)
    }
}

fn annotate<T>(field: &FieldBinding<T>, err: StoreError) -> StoreError {
    match err {
        StoreError::Mapping(message) => {
            StoreError::Mapping(format!("column '{}': {}", field.column, message))
        }
        other => other,
    }
}

/// Collects field bindings and validates them into an [`EntityMapping`].
pub struct EntityMappingBuilder<T> {
    fields: Vec<FieldBinding<T>>,
}

impl<T: TableRecord + Default> EntityMappingBuilder<T> {
    /// Binds a typed field through accessors to its storage.
    pub fn column<V, G, M>(mut self, name: impl Into<String>, get: G, get_mut: M) -> Self
    where
        T: 'static,
        V: ColumnValue + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        self.fields.push(FieldBinding {
            column: name.into(),
            kind: V::KIND,
            get: Box::new(move |record: &T| get(record).to_typed()),
            set: Box::new(move |record: &mut T, value: TypedValue| {
                *get_mut(record) = V::from_typed(value)?;
                Ok(())
            }),
        });
        self
    }

    /// Binds a column through raw conversion closures.
    pub fn field<G, S>(mut self, name: impl Into<String>, kind: ValueKind, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Result<Option<TypedValue>> + Send + Sync + 'static,
        S: Fn(&mut T, TypedValue) -> Result<()> + Send + Sync + 'static,
    {
        self.fields.push(FieldBinding {
            column: name.into(),
            kind,
            get: Box::new(get),
            set: Box::new(set),
        });
        self
    }

    /// Validates column names: non-empty, unique, and not reserved.
    pub fn build(self) -> Result<EntityMapping<T>> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.column.trim().is_empty() {
                return Err(StoreError::Mapping("column name must not be empty".to_string()));
            }
            if RESERVED_COLUMNS.contains(&field.column.as_str()) {
                return Err(StoreError::Mapping(format!(
                    "column name '{}' is reserved by the table service",
                    field.column
                )));
            }
            if !seen.insert(field.column.as_str()) {
                return Err(StoreError::Mapping(format!(
                    "column name '{}' is mapped more than once",
                    field.column
                )));
            }
        }
        Ok(EntityMapping {
            fields: self.fields,
        })
    }

    /// Skips validation; the derive macro checks names at expansion time.
    #[doc(hidden)]
    pub fn build_checked_at_compile_time(self) -> EntityMapping<T> {
        EntityMapping {
            fields: self.fields,
        }
    }
}
