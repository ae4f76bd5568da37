//! Scalar values, rows and batches moved through the pipeline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Textual form the target accepts for timestamps.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed value read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean (bit) value.
    Bool(bool),

    /// Any integer width.
    I64(i64),

    /// Floating point (real/float/double).
    F64(f64),

    /// Exact numeric (decimal/numeric/money).
    Decimal(Decimal),

    /// Text data.
    Text(String),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl SqlValue {
    /// Returns true if the value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render the value as the text bound to a `?` placeholder.
    ///
    /// Returns `None` for NULL so the parameter is bound as SQL NULL.
    pub fn to_param_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(true) => Some("1".to_string()),
            SqlValue::Bool(false) => Some("0".to_string()),
            SqlValue::I64(v) => Some(v.to_string()),
            SqlValue::F64(v) => Some(v.to_string()),
            SqlValue::Decimal(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v.clone()),
            SqlValue::DateTime(v) => Some(v.format(DATETIME_FORMAT).to_string()),
            SqlValue::Date(v) => Some(v.format("%Y-%m-%d").to_string()),
            SqlValue::Time(v) => Some(v.format("%H:%M:%S").to_string()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::I64(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::DateTime(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One source row, positionally aligned to the table's column list.
pub type RowRecord = Vec<SqlValue>;

/// Rows returned by one fetch, never more than the fetch size.
pub type RowBatch = Vec<RowRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_text_null() {
        assert_eq!(SqlValue::Null.to_param_text(), None);
    }

    #[test]
    fn test_param_text_bool() {
        assert_eq!(SqlValue::Bool(true).to_param_text().as_deref(), Some("1"));
        assert_eq!(SqlValue::Bool(false).to_param_text().as_deref(), Some("0"));
    }

    #[test]
    fn test_param_text_numbers() {
        assert_eq!(SqlValue::I64(-42).to_param_text().as_deref(), Some("-42"));
        assert_eq!(SqlValue::F64(1.5).to_param_text().as_deref(), Some("1.5"));
        let dec: Decimal = "1234.5600".parse().unwrap();
        assert_eq!(
            SqlValue::Decimal(dec).to_param_text().as_deref(),
            Some("1234.5600")
        );
    }

    #[test]
    fn test_param_text_temporal() {
        let dt = NaiveDate::from_ymd_opt(2020, 2, 28)
            .unwrap()
            .and_hms_milli_opt(7, 5, 3, 250)
            .unwrap();
        assert_eq!(
            SqlValue::DateTime(dt).to_param_text().as_deref(),
            Some("2020-02-28 07:05:03")
        );
        let d = NaiveDate::from_ymd_opt(2019, 12, 12).unwrap();
        assert_eq!(SqlValue::Date(d).to_param_text().as_deref(), Some("2019-12-12"));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(SqlValue::from(None::<&str>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    }
}
