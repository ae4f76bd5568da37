//! Target database operations.

pub mod odbc;

pub use odbc::OdbcTarget;

use crate::config::InsertMode;
use crate::core::value::RowRecord;
use crate::error::{ExtractError, Result};
use crate::sql::TableStatements;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Trait for target database operations.
#[async_trait]
pub trait TargetConnection: Send + Sync {
    /// Remove every row of a qualified table.
    async fn truncate(&self, table_ref: &str) -> Result<()>;

    /// Execute the INSERT once for all rows.
    async fn insert_many(&self, insert: &str, rows: &[RowRecord]) -> Result<u64>;

    /// Execute the INSERT for a single row.
    async fn insert_one(&self, insert: &str, row: &RowRecord) -> Result<u64>;

    /// Execute a statement or stored-procedure call, ignoring any result.
    async fn exec_statement(&self, sql: &str) -> Result<()>;

    /// Close the connection.
    async fn close(&self);
}

/// Counters for rows written to one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Rows inserted.
    pub rows_written: u64,
    /// INSERT executions issued.
    pub inserts: u64,
}

/// Destructive reload of one target table.
///
/// Truncate is not transactional with the inserts that follow: a failure
/// after it leaves the table partially loaded.
pub struct TargetWriter<'a> {
    target: &'a dyn TargetConnection,
    table: &'a str,
    statements: &'a TableStatements,
    insert_mode: InsertMode,
    truncated: bool,
    stats: WriteStats,
}

impl<'a> TargetWriter<'a> {
    /// Create a writer for one table.
    pub fn new(
        target: &'a dyn TargetConnection,
        table: &'a str,
        statements: &'a TableStatements,
        insert_mode: InsertMode,
    ) -> Self {
        Self {
            target,
            table,
            statements,
            insert_mode,
            truncated: false,
            stats: WriteStats::default(),
        }
    }

    /// Truncate the target table. Must precede every insert.
    pub async fn truncate(&mut self) -> Result<()> {
        self.target
            .truncate(&self.statements.target_table)
            .await
            .map_err(|e| ExtractError::load(self.table, format!("truncate: {}", e)))?;
        self.truncated = true;
        info!(
            "Table truncated -> {} (not transactional with the load that follows)",
            self.statements.target_table
        );
        Ok(())
    }

    /// Write one transformed batch using the table's insert mode.
    pub async fn write_batch(&mut self, rows: &[RowRecord]) -> Result<()> {
        if !self.truncated {
            return Err(ExtractError::load(
                self.table,
                "insert attempted before truncate",
            ));
        }
        if rows.is_empty() {
            return Ok(());
        }

        match self.insert_mode {
            InsertMode::Bulk => {
                let written = self
                    .target
                    .insert_many(&self.statements.insert, rows)
                    .await
                    .map_err(|e| self.load_error(e))?;
                self.stats.rows_written += written;
                self.stats.inserts += 1;
                info!("Multiple insert executed for -> {} ({} rows)", self.table, written);
            }
            InsertMode::SingleRow => {
                for row in rows {
                    let written = self
                        .target
                        .insert_one(&self.statements.insert, row)
                        .await
                        .map_err(|e| self.load_error(e))?;
                    self.stats.rows_written += written;
                    self.stats.inserts += 1;
                }
                debug!("Single-row inserts executed for -> {} ({} rows)", self.table, rows.len());
            }
        }
        Ok(())
    }

    /// Run the table's post-load procedure.
    pub async fn run_post_load(&self, procedure: &str) -> Result<()> {
        self.target
            .exec_statement(procedure)
            .await
            .map_err(|e| ExtractError::post_load(self.table, e.to_string()))?;
        info!("Post-load procedure executed for -> {}: {}", self.table, procedure);
        Ok(())
    }

    /// Rows and executions so far.
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    fn load_error(&self, err: ExtractError) -> ExtractError {
        warn!(
            "Load of {} failed after truncate; the table is left partially loaded ({} rows written)",
            self.statements.target_table, self.stats.rows_written
        );
        ExtractError::load(self.table, err.to_string())
    }
}

/// Execute the cross-table procedure run once after every table has loaded.
pub async fn run_final_procedure(target: &dyn TargetConnection, procedure: &str) -> Result<()> {
    target
        .exec_statement(procedure)
        .await
        .map_err(|e| ExtractError::FinalProcedure(e.to_string()))?;
    info!("Final procedure executed: {}", procedure);
    Ok(())
}
