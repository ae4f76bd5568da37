//! Per-row value coercion for the target.

use crate::core::value::{RowBatch, RowRecord, SqlValue, DATETIME_FORMAT};
use crate::error::{ExtractError, Result};

/// Render a value in the form the target stores.
///
/// Timestamps become `YYYY-MM-DD HH:MM:SS` text; every other value, dates
/// and times included, passes through unchanged.
pub fn transform_value(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        other => other,
    }
}

/// Pure row mapping that preserves arity and order.
#[derive(Debug, Clone)]
pub struct RowTransformer {
    table: String,
    arity: usize,
}

impl RowTransformer {
    /// Create a transformer for rows that must bind to `arity` placeholders.
    pub fn new(table: impl Into<String>, arity: usize) -> Self {
        Self {
            table: table.into(),
            arity,
        }
    }

    /// Transform one row.
    ///
    /// A row whose width differs from the placeholder count can never bind,
    /// so it is a configuration error.
    pub fn transform_row(&self, row: RowRecord) -> Result<RowRecord> {
        if row.len() != self.arity {
            return Err(ExtractError::Config(format!(
                "Table {}: source row has {} values but INSERT has {} placeholders",
                self.table,
                row.len(),
                self.arity
            )));
        }
        Ok(row.into_iter().map(transform_value).collect())
    }

    /// Transform every row of a batch.
    pub fn transform_batch(&self, batch: RowBatch) -> Result<RowBatch> {
        batch
            .into_iter()
            .map(|row| self.transform_row(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    fn datetime(h: u32, m: u32, s: u32, ms: u32) -> SqlValue {
        SqlValue::DateTime(
            NaiveDate::from_ymd_opt(2020, 1, 7)
                .unwrap()
                .and_hms_milli_opt(h, m, s, ms)
                .unwrap(),
        )
    }

    #[test]
    fn test_datetime_rendered_without_fraction() {
        assert_eq!(
            transform_value(datetime(9, 5, 7, 999)),
            SqlValue::Text("2020-01-07 09:05:07".to_string())
        );
        assert_eq!(
            transform_value(datetime(23, 59, 59, 0)),
            SqlValue::Text("2020-01-07 23:59:59".to_string())
        );
    }

    #[test]
    fn test_other_values_unchanged() {
        let values = vec![
            SqlValue::Null,
            SqlValue::Bool(false),
            SqlValue::I64(7),
            SqlValue::F64(0.25),
            SqlValue::Decimal(Decimal::new(12345, 2)),
            SqlValue::Text("2020-01-07 09:05:07.123".to_string()),
            SqlValue::Date(NaiveDate::from_ymd_opt(2020, 1, 7).unwrap()),
            SqlValue::Time(NaiveTime::from_hms_opt(9, 5, 7).unwrap()),
        ];
        for v in values {
            assert_eq!(transform_value(v.clone()), v);
        }
    }

    #[test]
    fn test_row_arity_preserved() {
        let t = RowTransformer::new("T", 3);
        let row = vec![SqlValue::I64(1), datetime(0, 0, 0, 0), SqlValue::Null];
        let out = t.transform_row(row).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], SqlValue::I64(1));
        assert_eq!(out[1], SqlValue::Text("2020-01-07 00:00:00".to_string()));
        assert_eq!(out[2], SqlValue::Null);
    }

    #[test]
    fn test_arity_mismatch_is_config_error() {
        let t = RowTransformer::new("EmployeeEarning", 3);
        let err = t.transform_row(vec![SqlValue::I64(1)]).unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
        assert!(err.to_string().contains("EmployeeEarning"));
    }

    #[test]
    fn test_batch_order_preserved() {
        let t = RowTransformer::new("T", 1);
        let batch = (0..5).map(|i| vec![SqlValue::I64(i)]).collect();
        let out = t.transform_batch(batch).unwrap();
        let ids: Vec<_> = out.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, (0..5).map(SqlValue::I64).collect::<Vec<_>>());
    }
}
