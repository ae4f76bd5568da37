//! SELECT and INSERT statement generation from catalog metadata.

use super::columns::ColumnFormatter;
use crate::config::{Config, TablePolicy};
use crate::core::catalog::{column_count, ColumnList, TableExtractSpec};
use crate::core::identifier::{qualify_target_table, quote_bracket, validate_identifier};
use crate::error::{ExtractError, Result};

/// Statements generated for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatements {
    /// `SELECT <cols> FROM <table>` against the source.
    pub select: String,

    /// `INSERT INTO <db>.<owner>.[<table>] (<cols>) VALUES (?,...)` against the target.
    pub insert: String,

    /// Qualified target table, as truncated before loading.
    pub target_table: String,

    /// Number of columns in the SELECT list.
    pub select_columns: usize,

    /// Number of `?` placeholders in the INSERT.
    pub placeholders: usize,
}

/// Builds per-table statements from catalog entries and table policies.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    formatter: ColumnFormatter,
    target_database: String,
    target_owner: String,
}

impl StatementBuilder {
    /// Create a builder qualifying target tables as `database.owner.[table]`.
    pub fn new(
        formatter: ColumnFormatter,
        target_database: impl Into<String>,
        target_owner: impl Into<String>,
    ) -> Self {
        Self {
            formatter,
            target_database: target_database.into(),
            target_owner: target_owner.into(),
        }
    }

    /// Create a builder from the extract configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ColumnFormatter::new(config.extract.reserved_columns.iter().cloned()),
            config.target_database(),
            config.extract.target_owner.clone(),
        )
    }

    /// Build the SELECT and INSERT statements for a table.
    ///
    /// The extra source/target columns of the table's policy are appended
    /// last, so they bind positionally to each other. A SELECT/INSERT arity
    /// mismatch is a configuration error.
    pub fn build(&self, spec: &TableExtractSpec, policy: &TablePolicy) -> Result<TableStatements> {
        let table = spec.table_name.as_str();
        validate_identifier(table)?;

        let columns = ColumnList::parse(&spec.source_columns.replace('"', ""));
        if let Some(pos) = columns.find_empty() {
            return Err(ExtractError::Config(format!(
                "Table {}: column {} in catalog column list is empty",
                table,
                pos + 1
            )));
        }

        let mut select_cols = self.formatter.format(&spec.source_columns);
        if let Some(extra) = &policy.extra_source_column {
            select_cols.push(',');
            select_cols.push_str(&self.formatter.format(extra));
        }

        let mut target_cols = columns;
        if let Some(extra) = &policy.extra_target_column {
            target_cols.push(extra.trim());
        }
        let target_list = target_cols
            .names()
            .iter()
            .map(|c| quote_bracket(c))
            .collect::<Result<Vec<_>>>()?
            .join(",");

        let select_columns = column_count(&select_cols);
        let placeholders = column_count(&target_list);
        if select_columns != placeholders {
            return Err(ExtractError::Config(format!(
                "Table {}: SELECT returns {} columns but INSERT has {} placeholders",
                table, select_columns, placeholders
            )));
        }

        let target_table =
            qualify_target_table(&self.target_database, &self.target_owner, table)?;
        let select = format!("SELECT {} FROM {}", select_cols, table);
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target_table,
            target_list,
            vec!["?"; placeholders].join(",")
        );

        Ok(TableStatements {
            select,
            insert,
            target_table,
            select_columns,
            placeholders,
        })
    }
}
