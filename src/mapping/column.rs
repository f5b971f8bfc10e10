use crate::core::{Result, StoreError, TypedValue, ValueKind};
use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

/// Coercion between a native field type and a stored [`TypedValue`].
///
/// `to_typed` returning `Ok(None)` means the field is not persisted for this record
/// (an absent `Option`).
pub trait ColumnValue: Sized {
    const KIND: ValueKind;

    fn to_typed(&self) -> Result<Option<TypedValue>>;

    fn from_typed(value: TypedValue) -> Result<Self>;
}

/// Fieldless enums persisted as their `Int32` ordinal.
///
/// Usually implemented through `#[derive(TableEnum)]`.
pub trait Enumerant: Sized {
    /// Declared `(name, ordinal)` pairs in declaration order.
    const VARIANTS: &'static [(&'static str, i32)];

    fn ordinal(&self) -> i32;

    fn from_ordinal(ordinal: i32) -> Option<Self>;

    fn name(&self) -> &'static str {
        let ordinal = self.ordinal();
        Self::VARIANTS
            .iter()
            .find(|(_, candidate)| *candidate == ordinal)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

pub fn enumerant_to_typed<E: Enumerant>(value: &E) -> TypedValue {
    TypedValue::Int32(value.ordinal())
}

/// Restores an enumerant from its stored ordinal or from its name.
///
/// The ordinal is first resolved to its declared name, then the name is parsed
/// case-insensitively. An ordinal or name with no declared counterpart fails.
pub fn enumerant_from_typed<E: Enumerant>(value: TypedValue) -> Result<E> {
    let name = match &value {
        TypedValue::Int32(_) | TypedValue::Int64(_) => {
            let ordinal = value.as_i64().unwrap_or_default();
            name_of_ordinal::<E>(ordinal)?
        }
        TypedValue::Str(text) => match text.trim().parse::<i64>() {
            Ok(ordinal) => name_of_ordinal::<E>(ordinal)?,
            Err(_) => text.trim(),
        },
        other => {
            return Err(StoreError::Mapping(format!(
                "cannot restore enumerant from {} value",
                other.type_name()
            )));
        }
    };

    let ordinal = E::VARIANTS
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, ordinal)| *ordinal)
        .ok_or_else(|| {
            StoreError::Mapping(format!("'{}' is not a declared enumerant name", name))
        })?;

    E::from_ordinal(ordinal).ok_or_else(|| unknown_ordinal(i64::from(ordinal)))
}

fn name_of_ordinal<E: Enumerant>(ordinal: i64) -> Result<&'static str> {
    E::VARIANTS
        .iter()
        .find(|(_, candidate)| i64::from(*candidate) == ordinal)
        .map(|(name, _)| *name)
        .ok_or_else(|| unknown_ordinal(ordinal))
}

fn unknown_ordinal(ordinal: i64) -> StoreError {
    StoreError::Mapping(format!("ordinal {} has no declared enumerant", ordinal))
}

fn kind_mismatch(expected: ValueKind, value: &TypedValue) -> StoreError {
    StoreError::Mapping(format!(
        "expected {} value, found {}",
        expected,
        value.type_name()
    ))
}

impl ColumnValue for String {
    const KIND: ValueKind = ValueKind::Str;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Str(self.clone())))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        match value {
            TypedValue::Str(s) => Ok(s),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl ColumnValue for i32 {
    const KIND: ValueKind = ValueKind::Int32;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Int32(*self)))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        match value {
            TypedValue::Int32(i) => Ok(i),
            TypedValue::Int64(i) => i32::try_from(i)
                .map_err(|_| StoreError::Mapping(format!("{} does not fit in Int32", i))),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl ColumnValue for i64 {
    const KIND: ValueKind = ValueKind::Int64;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Int64(*self)))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        match value {
            TypedValue::Int64(i) => Ok(i),
            TypedValue::Int32(i) => Ok(i64::from(i)),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl ColumnValue for u32 {
    const KIND: ValueKind = ValueKind::Int64;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Int64(i64::from(*self))))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        let raw = i64::from_typed(value)?;
        u32::try_from(raw).map_err(|_| StoreError::Mapping(format!("{} does not fit in u32", raw)))
    }
}

impl ColumnValue for u64 {
    const KIND: ValueKind = ValueKind::Int64;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        let stored = i64::try_from(*self).map_err(|_| {
            StoreError::Mapping(format!("{} exceeds the Int64 column range", self))
        })?;
        Ok(Some(TypedValue::Int64(stored)))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        let raw = i64::from_typed(value)?;
        u64::try_from(raw).map_err(|_| StoreError::Mapping(format!("{} does not fit in u64", raw)))
    }
}

impl ColumnValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Bool(*self)))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        match value {
            TypedValue::Bool(b) => Ok(b),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl ColumnValue for DateTime<FixedOffset> {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Timestamp(*self)))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        value
            .as_timestamp()
            .ok_or_else(|| kind_mismatch(Self::KIND, &value))
    }
}

impl ColumnValue for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Timestamp(self.fixed_offset())))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        value
            .as_timestamp()
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| kind_mismatch(Self::KIND, &value))
    }
}

impl ColumnValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Binary;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Binary(self.clone())))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        match value {
            TypedValue::Binary(bytes) => Ok(bytes),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl ColumnValue for Uuid {
    const KIND: ValueKind = ValueKind::Str;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        Ok(Some(TypedValue::Str(self.to_string())))
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        match value {
            TypedValue::Str(s) => Uuid::parse_str(&s)
                .map_err(|err| StoreError::Mapping(format!("invalid uuid '{}': {}", s, err))),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_typed(&self) -> Result<Option<TypedValue>> {
        match self {
            Some(value) => value.to_typed(),
            None => Ok(None),
        }
    }

    fn from_typed(value: TypedValue) -> Result<Self> {
        T::from_typed(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, PartialEq)]
    enum Priority {
        Low = 1,
        High = 5,
    }

    impl Enumerant for Priority {
        const VARIANTS: &'static [(&'static str, i32)] = &[("Low", 1), ("High", 5)];

        fn ordinal(&self) -> i32 {
            match self {
                Self::Low => Self::Low as i32,
                Self::High => Self::High as i32,
            }
        }

        fn from_ordinal(ordinal: i32) -> Option<Self> {
            match ordinal {
                1 => Some(Self::Low),
                5 => Some(Self::High),
                _ => None,
            }
        }
    }

    #[test]
    fn test_enumerant_restores_from_ordinal_and_name() {
        assert_eq!(enumerant_to_typed(&Priority::High), TypedValue::Int32(5));
        assert_eq!(
            enumerant_from_typed::<Priority>(TypedValue::Int32(5)).unwrap(),
            Priority::High
        );
        assert_eq!(
            enumerant_from_typed::<Priority>(TypedValue::Str("low".into())).unwrap(),
            Priority::Low
        );
        assert_eq!(
            enumerant_from_typed::<Priority>(TypedValue::Str("5".into())).unwrap(),
            Priority::High
        );
        assert_eq!(Priority::Low.name(), "Low");
    }

    #[test]
    fn test_enumerant_unknown_ordinal_is_mapping_error() {
        let err = enumerant_from_typed::<Priority>(TypedValue::Int32(3)).unwrap_err();
        assert!(matches!(err, StoreError::Mapping(_)));

        let err = enumerant_from_typed::<Priority>(TypedValue::Str("urgent".into())).unwrap_err();
        assert!(matches!(err, StoreError::Mapping(_)));

        let err = enumerant_from_typed::<Priority>(TypedValue::Bool(true)).unwrap_err();
        assert!(matches!(err, StoreError::Mapping(_)));
    }

    #[test]
    fn test_unsigned_range_checks() {
        assert!(matches!(u64::MAX.to_typed(), Err(StoreError::Mapping(_))));
        assert!(matches!(
            u32::from_typed(TypedValue::Int64(-1)),
            Err(StoreError::Mapping(_))
        ));
        assert_eq!(u32::from_typed(TypedValue::Int64(7)).unwrap(), 7);
    }

    #[test]
    fn test_timestamp_keeps_offset() {
        let offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let ts = offset
            .with_ymd_and_hms(2023, 6, 1, 12, 30, 0)
            .unwrap()
            + chrono::Duration::nanoseconds(123_456_700);
        let stored = ts.to_typed().unwrap().unwrap();
        let restored = DateTime::<FixedOffset>::from_typed(stored).unwrap();
        assert_eq!(restored, ts);
        assert_eq!(restored.offset(), ts.offset());
    }

    #[test]
    fn test_option_none_is_not_persisted() {
        let missing: Option<String> = None;
        assert_eq!(missing.to_typed().unwrap(), None);
        assert_eq!(
            Option::<i64>::from_typed(TypedValue::Int32(4)).unwrap(),
            Some(4)
        );
    }

    #[test]
    fn test_kind_mismatch_is_mapping_error() {
        assert!(matches!(
            String::from_typed(TypedValue::Int32(1)),
            Err(StoreError::Mapping(_))
        ));
        assert!(matches!(
            bool::from_typed(TypedValue::Str("true".into())),
            Err(StoreError::Mapping(_))
        ));
    }
}
