//! Catalog stored in the control database, read over ODBC.

use super::{catalog_query, CatalogStore};
use crate::config::ConnectionConfig;
use crate::core::catalog::TableExtractSpec;
use crate::error::{ExtractError, Result};
use crate::odbc::{OdbcSession, TextRows};
use async_trait::async_trait;
use tracing::{debug, info};

/// Catalog table in the control database.
pub struct OdbcCatalog {
    session: OdbcSession,
    catalog_table: String,
}

impl OdbcCatalog {
    /// Connect to the control database.
    pub async fn connect(config: &ConnectionConfig, catalog_table: &str) -> Result<Self> {
        let session = OdbcSession::connect("control", config.connection_string()).await?;
        info!("Connected to control database via ODBC: {}", config.describe());
        Ok(Self {
            session,
            catalog_table: catalog_table.to_string(),
        })
    }
}

/// Turn `(table, columns)` rows into catalog entries.
///
/// A row with a NULL or blank table name or column list fails the whole load.
fn parse_catalog_rows(rows: TextRows, source_db_tag: &str) -> Result<Vec<TableExtractSpec>> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut cells = row.into_iter();
            match (cells.next().flatten(), cells.next().flatten()) {
                (Some(table), Some(columns))
                    if !table.trim().is_empty() && !columns.trim().is_empty() =>
                {
                    Ok(TableExtractSpec::new(table.trim(), columns, source_db_tag))
                }
                (table, columns) => Err(ExtractError::Catalog(format!(
                    "row {} has a missing table name or column list (table: {:?}, columns: {:?})",
                    idx + 1,
                    table,
                    columns
                ))),
            }
        })
        .collect()
}

#[async_trait]
impl CatalogStore for OdbcCatalog {
    async fn load_catalog(&self, source_db_tag: &str) -> Result<Vec<TableExtractSpec>> {
        let sql = catalog_query(&self.catalog_table, source_db_tag);
        debug!("Catalog query: {}", sql);
        let rows = self
            .session
            .query(&sql)
            .await
            .map_err(|e| ExtractError::Catalog(e.to_string()))?;
        let specs = parse_catalog_rows(rows, source_db_tag)?;
        debug!("Catalog returned {} tables", specs.len());
        Ok(specs)
    }

    async fn close(&self) {
        self.session.close().await;
    }
}
