//! Catalog entries and the column lists derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the extract catalog.
///
/// Immutable for the duration of a table's processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableExtractSpec {
    /// Source table name, also the target table name.
    pub table_name: String,

    /// Raw comma-joined column list; its order is the target column order.
    pub source_columns: String,

    /// Whether the entry is eligible for extraction.
    pub active: bool,

    /// Source database tag the entry belongs to.
    pub source_db_tag: String,
}

impl TableExtractSpec {
    /// Create an active catalog entry.
    pub fn new(
        table_name: impl Into<String>,
        source_columns: impl Into<String>,
        source_db_tag: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_columns: source_columns.into(),
            active: true,
            source_db_tag: source_db_tag.into(),
        }
    }

    /// Lifecycle step name: `<prefix>-<table>`.
    pub fn step_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.table_name)
    }
}

/// Ordered column names parsed from a comma-joined list.
///
/// Order fixes positional binding between SELECT output and INSERT placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnList {
    names: Vec<String>,
}

impl ColumnList {
    /// Parse a comma-joined list, trimming whitespace around each name.
    ///
    /// Empty names are kept so that the count always equals commas + 1.
    pub fn parse(raw: &str) -> Self {
        Self {
            names: raw.split(',').map(|s| s.trim().to_string()).collect(),
        }
    }

    /// Append a column at the end of the list.
    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if the list holds no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// First empty name, if any.
    pub fn find_empty(&self) -> Option<usize> {
        self.names.iter().position(|n| n.is_empty())
    }
}

impl fmt::Display for ColumnList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(","))
    }
}

/// Count of comma-separated entries in a raw list (commas + 1).
pub fn column_count(raw: &str) -> usize {
    raw.matches(',').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_name() {
        let spec = TableExtractSpec::new("Customer", "ListID,Name", "QB_CEDW");
        assert_eq!(spec.step_name("QB_CEDW"), "QB_CEDW-Customer");
    }

    #[test]
    fn test_parse_preserves_order() {
        let cols = ColumnList::parse("ListID, Name ,TimeCreated");
        assert_eq!(cols.names(), &["ListID", "Name", "TimeCreated"]);
        assert_eq!(cols.to_string(), "ListID,Name,TimeCreated");
    }

    #[test]
    fn test_parse_keeps_empty_entries() {
        let cols = ColumnList::parse("A,,B,");
        assert_eq!(cols.len(), 4);
        assert_eq!(cols.find_empty(), Some(1));
    }

    #[test]
    fn test_column_count_matches_parse() {
        for raw in ["A", "A,B", "A,B,C,D,E,F,G", "A,,B"] {
            assert_eq!(column_count(raw), ColumnList::parse(raw).len());
        }
    }
}
