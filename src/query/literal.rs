use chrono::{DateTime, TimeZone, Timelike, Utc};

/// A value that can appear on the right-hand side of a filter comparison.
///
/// Strings are quoted verbatim: an embedded `'` is not escaped and will corrupt the
/// surrounding filter. Filters are expected to come from trusted callers.
pub trait FilterLiteral {
    fn render(&self) -> String;
}

impl FilterLiteral for i32 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl FilterLiteral for i64 {
    fn render(&self) -> String {
        format!("{}L", self)
    }
}

impl FilterLiteral for bool {
    fn render(&self) -> String {
        if *self { "true" } else { "false" }.to_string()
    }
}

impl FilterLiteral for &str {
    fn render(&self) -> String {
        format!("'{}'", self)
    }
}

impl FilterLiteral for String {
    fn render(&self) -> String {
        self.as_str().render()
    }
}

impl<Tz: TimeZone> FilterLiteral for DateTime<Tz> {
    fn render(&self) -> String {
        format!("datetime'{}'", render_timestamp(&self.with_timezone(&Utc)))
    }
}

/// Round-trip UTC timestamp with seven fractional digits.
pub fn render_timestamp(ts: &DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        ts.format("%Y-%m-%dT%H:%M:%S"),
        ts.nanosecond() % 1_000_000_000 / 100
    )
}
