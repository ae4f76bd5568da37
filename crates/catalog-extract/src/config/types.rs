//! Configuration type definitions.

use super::tables::TablePolicies;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Control database holding the extract catalog.
    pub control: ConnectionConfig,

    /// Source database the tables are extracted from.
    pub source: ConnectionConfig,

    /// Target database the tables are reloaded into.
    pub target: ConnectionConfig,

    /// Lifecycle control service. When absent, lifecycle events are only logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_api: Option<ControlApiConfig>,

    /// Recipient lists for the end-of-run notification.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Extract behavior.
    pub extract: ExtractConfig,

    /// Per-table overrides keyed by table name.
    #[serde(default)]
    pub tables: TablePolicies,
}

impl Config {
    /// Fully qualified database the target tables live in.
    pub fn target_database(&self) -> &str {
        self.extract
            .target_database
            .as_deref()
            .unwrap_or(&self.target.database)
    }

    /// Prefix for lifecycle step names.
    pub fn step_prefix(&self) -> &str {
        self.extract
            .step_prefix
            .as_deref()
            .unwrap_or(&self.extract.source_db_tag)
    }
}

/// ODBC connection settings, shared by the control, source and target roles.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Data source name. Takes precedence over driver/server when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,

    /// ODBC driver name (default: "ODBC Driver 18 for SQL Server").
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Server host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (default: 1433).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Extra `key=value;` pairs appended verbatim to the connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dsn", &self.dsn)
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("options", &self.options)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build the ODBC connection string.
    pub fn connection_string(&self) -> String {
        let mut conn_str = match &self.dsn {
            Some(dsn) => format!("DSN={};", dsn),
            None => format!(
                "Driver={{{}}};Server={},{};",
                self.driver,
                self.server.as_deref().unwrap_or_default(),
                self.port
            ),
        };

        if !self.database.is_empty() {
            conn_str.push_str(&format!("Database={};", self.database));
        }
        if !self.user.is_empty() {
            conn_str.push_str(&format!("UID={};PWD={};", self.user, self.password));
        }
        if self.dsn.is_none() {
            conn_str.push_str(&format!(
                "Encrypt={};TrustServerCertificate={};",
                if self.encrypt { "yes" } else { "no" },
                if self.trust_server_cert { "yes" } else { "no" },
            ));
        }
        if let Some(options) = &self.options {
            conn_str.push_str(options);
        }

        conn_str
    }

    /// Connection string description safe for logs.
    pub fn describe(&self) -> String {
        match &self.dsn {
            Some(dsn) => format!("DSN={}", dsn),
            None => format!(
                "{},{}/{}",
                self.server.as_deref().unwrap_or_default(),
                self.port,
                self.database
            ),
        }
    }
}

/// Lifecycle control service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ControlApiConfig {
    /// Base URL; events are posted to `{base_url}/start` and `{base_url}/end`.
    pub base_url: String,

    /// API key sent as the `apikey` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,
}

impl fmt::Debug for ControlApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Notification recipient lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Recipients of the success message.
    #[serde(default)]
    pub success: Vec<String>,

    /// Recipients of the failure message.
    #[serde(default)]
    pub failure: Vec<String>,
}

/// How an error of a given kind affects the rest of the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the run.
    Abort,
    /// Log the error and keep going.
    Continue,
}

/// Extract behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Source database tag selecting catalog entries.
    pub source_db_tag: String,

    /// Rows per fetch (default: 3000).
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// Catalog table in the control database.
    #[serde(default = "default_catalog_table")]
    pub catalog_table: String,

    /// Target database name used to qualify target tables (default: target.database).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_database: Option<String>,

    /// Target owner/schema (default: "dbo").
    #[serde(default = "default_owner")]
    pub target_owner: String,

    /// Prefix for lifecycle step names (default: source_db_tag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_prefix: Option<String>,

    /// Column names that must be quoted in source queries (default: ["Desc"]).
    #[serde(default = "default_reserved_columns")]
    pub reserved_columns: Vec<String>,

    /// Statement executed once after every table has loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_procedure: Option<String>,

    /// Policy for extract/load failures on a table (default: abort).
    #[serde(default = "default_abort")]
    pub on_table_error: ErrorPolicy,

    /// Policy for per-table post-load procedure failures (default: continue).
    #[serde(default = "default_continue")]
    pub on_post_load_error: ErrorPolicy,

    /// Policy for lifecycle report failures (default: continue).
    #[serde(default = "default_continue")]
    pub on_lifecycle_error: ErrorPolicy,
}

fn default_driver() -> String {
    "ODBC Driver 18 for SQL Server".to_string()
}

fn default_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

fn default_api_timeout() -> u64 {
    30
}

fn default_fetch_size() -> usize {
    3000
}

fn default_catalog_table() -> String {
    "dbo.[Third_Party_Source_Etl_Execution]".to_string()
}

fn default_owner() -> String {
    "dbo".to_string()
}

fn default_reserved_columns() -> Vec<String> {
    vec!["Desc".to_string()]
}

fn default_abort() -> ErrorPolicy {
    ErrorPolicy::Abort
}

fn default_continue() -> ErrorPolicy {
    ErrorPolicy::Continue
}
