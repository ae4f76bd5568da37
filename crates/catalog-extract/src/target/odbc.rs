//! ODBC-backed target connection.
//!
//! Rows are bound as text parameters to the generated `?` placeholders; the
//! target converts them to the column types.

use super::TargetConnection;
use crate::config::ConnectionConfig;
use crate::core::value::RowRecord;
use crate::error::Result;
use crate::odbc::{OdbcSession, ParamRows};
use async_trait::async_trait;
use tracing::{debug, info};

/// Target database reached over ODBC.
pub struct OdbcTarget {
    session: OdbcSession,
}

impl OdbcTarget {
    /// Connect to the target database.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let session = OdbcSession::connect("target", config.connection_string()).await?;
        info!("Connected to target via ODBC: {}", config.describe());
        Ok(Self { session })
    }
}

fn to_params<'a>(rows: impl IntoIterator<Item = &'a RowRecord>) -> ParamRows {
    rows.into_iter()
        .map(|row| row.iter().map(|v| v.to_param_text()).collect())
        .collect()
}

#[async_trait]
impl TargetConnection for OdbcTarget {
    async fn truncate(&self, table_ref: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", table_ref);
        debug!("{}", sql);
        self.session.execute(&sql).await
    }

    async fn insert_many(&self, insert: &str, rows: &[RowRecord]) -> Result<u64> {
        self.session.insert_rows(insert, to_params(rows)).await
    }

    async fn insert_one(&self, insert: &str, row: &RowRecord) -> Result<u64> {
        self.session
            .insert_rows(insert, to_params(std::iter::once(row)))
            .await
    }

    async fn exec_statement(&self, sql: &str) -> Result<()> {
        debug!("Executing: {}", sql);
        self.session.execute(sql).await
    }

    async fn close(&self) {
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;

    #[test]
    fn test_to_params_binds_null_as_none() {
        let rows = vec![vec![
            SqlValue::Text("Widget".into()),
            SqlValue::Null,
            SqlValue::Bool(true),
        ]];
        assert_eq!(
            to_params(&rows),
            vec![vec![Some("Widget".to_string()), None, Some("1".to_string())]]
        );
    }
}
