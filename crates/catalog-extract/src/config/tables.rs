//! Declarative per-table overrides.
//!
//! Tables whose load deviates from the generic truncate-then-bulk-insert shape
//! are described here instead of being special-cased by name in the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How rows are written to the target for a table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// One statement execution per fetched batch.
    #[default]
    Bulk,
    /// One statement execution per row.
    SingleRow,
}

impl std::fmt::Display for InsertMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertMode::Bulk => f.write_str("bulk"),
            InsertMode::SingleRow => f.write_str("single_row"),
        }
    }
}

/// Override record for one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TablePolicy {
    /// Extra column appended to the INSERT column list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_target_column: Option<String>,

    /// Extra column appended to the SELECT list, feeding `extra_target_column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_source_column: Option<String>,

    /// Insert strategy (default: bulk).
    #[serde(default)]
    pub insert_mode: InsertMode,

    /// Statement executed once after the table has loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_load_procedure: Option<String>,
}

impl TablePolicy {
    /// True when the table carries an extra source/target column pair.
    pub fn has_extra_column(&self) -> bool {
        self.extra_source_column.is_some() && self.extra_target_column.is_some()
    }
}

/// Override records keyed by table name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TablePolicies(BTreeMap<String, TablePolicy>);

impl TablePolicies {
    /// Register an override for a table.
    pub fn insert(&mut self, table: impl Into<String>, policy: TablePolicy) {
        self.0.insert(table.into(), policy);
    }

    /// Policy for a table, falling back to the generic shape.
    pub fn policy_for(&self, table: &str) -> TablePolicy {
        self.0.get(table).cloned().unwrap_or_default()
    }

    /// Iterate configured overrides.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TablePolicy)> {
        self.0.iter()
    }

    /// Number of configured overrides.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no override is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_table_gets_generic_policy() {
        let policies = TablePolicies::default();
        let policy = policies.policy_for("Customer");
        assert_eq!(policy.insert_mode, InsertMode::Bulk);
        assert!(!policy.has_extra_column());
        assert!(policy.post_load_procedure.is_none());
    }

    #[test]
    fn test_parse_policies_from_yaml() {
        let yaml = r#"
EmployeeEarning:
  extra_target_column: temp_rate
  extra_source_column: PayrollInfoEarningsRate
  insert_mode: single_row
  post_load_procedure: exec [PXLTD_CEDW].[dbo].SP_ENCRYPT_QB_SAL
"#;
        let policies: TablePolicies = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policies.len(), 1);

        let policy = policies.policy_for("EmployeeEarning");
        assert!(policy.has_extra_column());
        assert_eq!(policy.insert_mode, InsertMode::SingleRow);
        assert_eq!(
            policy.post_load_procedure.as_deref(),
            Some("exec [PXLTD_CEDW].[dbo].SP_ENCRYPT_QB_SAL")
        );
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut policies = TablePolicies::default();
        policies.insert(
            "EmployeeEarning",
            TablePolicy {
                insert_mode: InsertMode::SingleRow,
                ..Default::default()
            },
        );
        assert_eq!(
            policies.policy_for("employeeearning").insert_mode,
            InsertMode::Bulk
        );
    }
}
