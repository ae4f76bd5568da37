//! Decoding of ODBC text buffers into typed values.

use crate::core::value::SqlValue;
use odbc_api::DataType;
use rust_decimal::Decimal;

/// Decoding strategy for a result-set column, derived from its SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Integer,
    Decimal,
    Float,
    DateTime,
    Date,
    Time,
    Text,
}

impl From<DataType> for ColumnKind {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Bit => ColumnKind::Bool,
            DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
                ColumnKind::Integer
            }
            DataType::Numeric { .. } | DataType::Decimal { .. } => ColumnKind::Decimal,
            DataType::Float { .. } | DataType::Real | DataType::Double => ColumnKind::Float,
            DataType::Timestamp { .. } => ColumnKind::DateTime,
            DataType::Date => ColumnKind::Date,
            DataType::Time { .. } => ColumnKind::Time,
            _ => ColumnKind::Text,
        }
    }
}

/// Decode one cell. `None` is SQL NULL.
///
/// Text that does not parse as the column's kind is kept as `Text`, so a row
/// never loses a position.
pub fn decode_cell(bytes: Option<&[u8]>, kind: ColumnKind) -> SqlValue {
    let Some(bytes) = bytes else {
        return SqlValue::Null;
    };
    let s = String::from_utf8_lossy(bytes).into_owned();

    match kind {
        ColumnKind::Bool => match s.as_str() {
            "1" | "true" | "True" | "TRUE" => SqlValue::Bool(true),
            "0" | "false" | "False" | "FALSE" => SqlValue::Bool(false),
            _ => SqlValue::Text(s),
        },
        ColumnKind::Integer => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Text(s)),
        ColumnKind::Decimal => {
            // Money columns may carry currency symbols and separators
            let cleaned = s.trim().replace(['$', ','], "");
            Decimal::from_str_exact(&cleaned)
                .or_else(|_| cleaned.parse::<Decimal>())
                .map(SqlValue::Decimal)
                .unwrap_or(SqlValue::Text(s))
        }
        ColumnKind::Float => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Text(s)),
        ColumnKind::DateTime => parse_datetime(&s)
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Text(s)),
        ColumnKind::Date => chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Text(s)),
        ColumnKind::Time => chrono::NaiveTime::parse_from_str(&s, "%H:%M:%S%.f")
            .or_else(|_| chrono::NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Text(s)),
        ColumnKind::Text => SqlValue::Text(s),
    }
}

fn parse_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    // ODBC typically returns "2023-01-15 10:30:45.123"
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Timelike};

    #[test]
    fn test_null() {
        assert_eq!(decode_cell(None, ColumnKind::Integer), SqlValue::Null);
        assert_eq!(decode_cell(None, ColumnKind::Text), SqlValue::Null);
    }

    #[test]
    fn test_bool() {
        assert_eq!(decode_cell(Some(b"1"), ColumnKind::Bool), SqlValue::Bool(true));
        assert_eq!(decode_cell(Some(b"0"), ColumnKind::Bool), SqlValue::Bool(false));
    }

    #[test]
    fn test_integer_and_float() {
        assert_eq!(decode_cell(Some(b"-17"), ColumnKind::Integer), SqlValue::I64(-17));
        assert_eq!(decode_cell(Some(b"2.5"), ColumnKind::Float), SqlValue::F64(2.5));
    }

    #[test]
    fn test_decimal_money() {
        let value = decode_cell(Some(b"$1,234.50"), ColumnKind::Decimal);
        assert_eq!(value, SqlValue::Decimal("1234.50".parse().unwrap()));
    }

    #[test]
    fn test_datetime_with_fraction() {
        let value = decode_cell(Some(b"2023-01-15 10:30:45.123"), ColumnKind::DateTime);
        let SqlValue::DateTime(dt) = value else {
            panic!("expected DateTime, got {:?}", value);
        };
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.second(), 45);
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(
            decode_cell(Some(b"2019-12-12"), ColumnKind::Date),
            SqlValue::Date(NaiveDate::from_ymd_opt(2019, 12, 12).unwrap())
        );
        assert!(matches!(
            decode_cell(Some(b"08:15:00"), ColumnKind::Time),
            SqlValue::Time(_)
        ));
    }

    #[test]
    fn test_unparseable_kept_as_text() {
        assert_eq!(
            decode_cell(Some(b"n/a"), ColumnKind::Integer),
            SqlValue::Text("n/a".to_string())
        );
        assert_eq!(
            decode_cell(Some(b"yesterday"), ColumnKind::DateTime),
            SqlValue::Text("yesterday".to_string())
        );
    }

    #[test]
    fn test_kind_from_data_type() {
        assert_eq!(ColumnKind::from(DataType::Bit), ColumnKind::Bool);
        assert_eq!(ColumnKind::from(DataType::BigInt), ColumnKind::Integer);
        assert_eq!(ColumnKind::from(DataType::Date), ColumnKind::Date);
        assert_eq!(
            ColumnKind::from(DataType::Timestamp { precision: 3 }),
            ColumnKind::DateTime
        );
        assert_eq!(
            ColumnKind::from(DataType::Decimal { precision: 10, scale: 2 }),
            ColumnKind::Decimal
        );
        assert_eq!(ColumnKind::from(DataType::Unknown), ColumnKind::Text);
    }
}
