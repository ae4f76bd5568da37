//! Configuration loading and validation.

mod tables;
mod types;
mod validation;

pub use tables::{InsertMode, TablePolicies, TablePolicy};
pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// SHA256 of the normalized configuration, identifying what a run used.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
control:
  server: ctlhost
  database: ETL_CONTROL
  user: etl
  password: secret
source:
  dsn: QuickBooks Data
target:
  server: dwhost
  database: PXLTD_CEDW
  user: etl
  password: secret
notification:
  success: [ops@example.com]
  failure: [oncall@example.com]
extract:
  source_db_tag: QB_CEDW
  final_procedure: exec [PXLTD_CEDW].[dbo].SP_QBAppend
tables:
  EmployeeEarning:
    extra_target_column: temp_rate
    extra_source_column: PayrollInfoEarningsRate
    insert_mode: single_row
    post_load_procedure: exec [PXLTD_CEDW].[dbo].SP_ENCRYPT_QB_SAL
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.extract.fetch_size, 3000);
        assert_eq!(
            config.extract.catalog_table,
            "dbo.[Third_Party_Source_Etl_Execution]"
        );
        assert_eq!(config.extract.target_owner, "dbo");
        assert_eq!(config.extract.reserved_columns, vec!["Desc".to_string()]);
        assert_eq!(config.extract.on_table_error, ErrorPolicy::Abort);
        assert_eq!(config.extract.on_post_load_error, ErrorPolicy::Continue);
        assert_eq!(config.target_database(), "PXLTD_CEDW");
        assert_eq!(config.step_prefix(), "QB_CEDW");
        assert!(config.control_api.is_none());
        assert_eq!(
            config.tables.policy_for("EmployeeEarning").insert_mode,
            InsertMode::SingleRow
        );
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = YAML.replace("source_db_tag: QB_CEDW", "source_db_tag: ''");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/config.yaml").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_IO_ERROR);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.dsn.as_deref(), Some("QuickBooks Data"));
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = Config::from_yaml(YAML).unwrap();
        let b = Config::from_yaml(YAML).unwrap();
        assert_eq!(a.hash(), b.hash());

        let mut c = Config::from_yaml(YAML).unwrap();
        c.extract.fetch_size = 500;
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_connection_string_with_server() {
        let config = Config::from_yaml(YAML).unwrap();
        let conn_str = config.target.connection_string();
        assert!(conn_str.starts_with("Driver={ODBC Driver 18 for SQL Server};Server=dwhost,1433;"));
        assert!(conn_str.contains("Database=PXLTD_CEDW;"));
        assert!(conn_str.contains("UID=etl;PWD=secret;"));
        assert!(conn_str.contains("Encrypt=yes;TrustServerCertificate=no;"));
        assert_eq!(config.target.describe(), "dwhost,1433/PXLTD_CEDW");
    }

    #[test]
    fn test_connection_string_with_dsn() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.connection_string(), "DSN=QuickBooks Data;");
    }
}
