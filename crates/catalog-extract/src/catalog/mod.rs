//! Extract catalog access.

pub mod odbc;

pub use odbc::OdbcCatalog;

use crate::core::catalog::TableExtractSpec;
use crate::core::identifier::escape_sql_string;
use crate::error::Result;
use async_trait::async_trait;

/// Read-only store of catalog entries.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Load active entries for a source tag, in processing order.
    async fn load_catalog(&self, source_db_tag: &str) -> Result<Vec<TableExtractSpec>>;

    /// Close the underlying connection.
    async fn close(&self);
}

/// Query selecting active catalog rows for a source tag.
pub fn catalog_query(catalog_table: &str, source_db_tag: &str) -> String {
    format!(
        "SELECT Source_Table_Nm, Source_Column_Names FROM {} \
         WHERE Extract_Process_Active_Ind = 'Y' AND Source_Db_Nm = '{}'",
        catalog_table,
        escape_sql_string(source_db_tag)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_query() {
        assert_eq!(
            catalog_query("dbo.[Third_Party_Source_Etl_Execution]", "QB_CEDW"),
            "SELECT Source_Table_Nm, Source_Column_Names FROM dbo.[Third_Party_Source_Etl_Execution] \
             WHERE Extract_Process_Active_Ind = 'Y' AND Source_Db_Nm = 'QB_CEDW'"
        );
    }

    #[test]
    fn test_catalog_query_escapes_tag() {
        let sql = catalog_query("dbo.[X]", "QB'; DROP TABLE x; --");
        assert!(sql.ends_with("Source_Db_Nm = 'QB''; DROP TABLE x; --'"));
    }
}
