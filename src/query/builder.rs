use super::FilterLiteral;
use crate::core::{Result, StoreError};
use std::fmt;

/// Fluent assembler of a filter expression string.
///
/// Pieces are appended in call order; joiners (`and`/`or`) are the caller's
/// responsibility. Interpolated values are not escaped.
///
/// ```
/// use tablestore::QueryBuilder;
///
/// let filter = QueryBuilder::new()
///     .partition_key("42")
///     .and()
///     .row_key_in_range(Some("a"), Some("z"))
///     .unwrap()
///     .build();
/// assert_eq!(filter, "PartitionKey eq '42' and RowKey gt 'a' and RowKey lt 'z'");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    query: String,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_key(self, partition_key: &str) -> Self {
        self.equals("PartitionKey", partition_key)
    }

    pub fn row_key_equals(self, row_key: &str) -> Self {
        self.equals("RowKey", row_key)
    }

    /// Restricts the row key to the open interval `(lower, upper)`.
    ///
    /// Either bound may be omitted, not both.
    pub fn row_key_in_range(self, lower: Option<&str>, upper: Option<&str>) -> Result<Self> {
        match (lower, upper) {
            (None, None) => Err(StoreError::Validation(
                "row key range needs at least one bound".to_string(),
            )),
            (None, Some(upper)) => Ok(self.less_than("RowKey", upper)),
            (Some(lower), None) => Ok(self.greater_than("RowKey", lower)),
            (Some(lower), Some(upper)) => Ok(self
                .greater_than("RowKey", lower)
                .and()
                .less_than("RowKey", upper)),
        }
    }

    pub fn and(mut self) -> Self {
        self.query.push_str(" and ");
        self
    }

    pub fn or(mut self) -> Self {
        self.query.push_str(" or ");
        self
    }

    pub fn equals(self, property: &str, value: impl FilterLiteral) -> Self {
        self.compare(property, "eq", value)
    }

    pub fn not_equals(self, property: &str, value: impl FilterLiteral) -> Self {
        self.compare(property, "ne", value)
    }

    pub fn greater_than(self, property: &str, value: impl FilterLiteral) -> Self {
        self.compare(property, "gt", value)
    }

    pub fn less_than(self, property: &str, value: impl FilterLiteral) -> Self {
        self.compare(property, "lt", value)
    }

    /// Tests a boolean column for `true`.
    pub fn is_true(mut self, property: &str) -> Self {
        self.query.push_str(property);
        self
    }

    /// Negates a single operand, typically a boolean column.
    pub fn not(mut self, operand: &str) -> Self {
        self.query.push_str("not ");
        self.query.push_str(operand);
        self
    }

    /// Negates a fully built sub-expression.
    pub fn not_group(self, sub: &QueryBuilder) -> Self {
        self.not("").paren(sub)
    }

    /// Appends a fully built sub-expression in parentheses.
    pub fn paren(mut self, sub: &QueryBuilder) -> Self {
        self.query.push_str("( ");
        self.query.push_str(sub.as_str());
        self.query.push_str(" )");
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.query
    }

    pub fn build(self) -> String {
        self.query
    }

    fn compare(mut self, property: &str, op: &str, value: impl FilterLiteral) -> Self {
        self.query.push_str(property);
        self.query.push(' ');
        self.query.push_str(op);
        self.query.push(' ');
        self.query.push_str(&value.render());
        self
    }
}

impl fmt::Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_partition_and_range() {
        let filter = QueryBuilder::new()
            .partition_key("42")
            .and()
            .row_key_in_range(Some("a"), Some("z"))
            .unwrap()
            .build();
        assert_eq!(
            filter,
            "PartitionKey eq '42' and RowKey gt 'a' and RowKey lt 'z'"
        );
    }

    #[test]
    fn test_half_open_ranges() {
        let upper_only = QueryBuilder::new()
            .row_key_in_range(None, Some("m"))
            .unwrap();
        assert_eq!(upper_only.as_str(), "RowKey lt 'm'");

        let lower_only = QueryBuilder::new()
            .row_key_in_range(Some("m"), None)
            .unwrap();
        assert_eq!(lower_only.as_str(), "RowKey gt 'm'");
    }

    #[test]
    fn test_unbounded_range_is_validation_error() {
        let err = QueryBuilder::new().row_key_in_range(None, None).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_typed_comparisons() {
        let when = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let filter = QueryBuilder::new()
            .greater_than("Count", 3)
            .and()
            .less_than("Size", 9_000_000_000i64)
            .or()
            .greater_than("When", when)
            .build();
        assert_eq!(
            filter,
            "Count gt 3 and Size lt 9000000000L or When gt datetime'2020-01-02T03:04:05.0000000Z'"
        );
    }

    #[test]
    fn test_grouping_and_negation() {
        let sub = QueryBuilder::new()
            .row_key_equals("a")
            .or()
            .row_key_equals("b");
        let filter = QueryBuilder::new()
            .partition_key("p")
            .and()
            .paren(&sub)
            .and()
            .not("Archived")
            .and()
            .not_group(&QueryBuilder::new().is_true("Hidden"))
            .build();
        assert_eq!(
            filter,
            concat!(
                "PartitionKey eq 'p' and ( RowKey eq 'a' or RowKey eq 'b' )",
                " and not Archived and not ( Hidden )",
            )
        );
    }
}
