//! Error types for the extract-load engine.

use thiserror::Error;

/// Process exit codes, one per error family.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_CONNECTION_ERROR: u8 = 2;
pub const EXIT_CATALOG_ERROR: u8 = 3;
pub const EXIT_EXTRACT_ERROR: u8 = 4;
pub const EXIT_LOAD_ERROR: u8 = 5;
pub const EXIT_PROCEDURE_ERROR: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;
pub const EXIT_TABLES_FAILED: u8 = 8;
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for extract-load operations.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Configuration error (invalid YAML, missing fields, statement/column mismatch).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open or talk to one of the three connections.
    #[error("Connection error ({role}): {message}")]
    Connection { role: String, message: String },

    /// The catalog query failed.
    #[error("Catalog query failed: {0}")]
    Catalog(String),

    /// Reading from the source failed for a table.
    #[error("Extract failed for table {table}: {message}")]
    Extract { table: String, message: String },

    /// Truncating or inserting into the target failed for a table.
    #[error("Load failed for table {table}: {message}")]
    Load { table: String, message: String },

    /// The per-table post-load procedure failed.
    #[error("Post-load procedure failed for table {table}: {message}")]
    PostLoad { table: String, message: String },

    /// The cross-table procedure run after the catalog failed.
    #[error("Final procedure failed: {0}")]
    FinalProcedure(String),

    /// The control service rejected or did not receive a lifecycle event.
    #[error("Lifecycle report failed for step {step}: {message}")]
    Lifecycle { step: String, message: String },

    /// One or more tables failed while the run was configured to continue.
    #[error("{count} table(s) failed: {tables}")]
    TablesFailed { count: usize, tables: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, SIGTERM)
    #[error("Extract run cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Create a Connection error for the given role (control, source, target).
    pub fn connection(role: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ExtractError::Connection {
            role: role.into(),
            message: message.to_string(),
        }
    }

    /// Create an Extract error.
    pub fn extract(table: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Extract {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Load error.
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a PostLoad error.
    pub fn post_load(table: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::PostLoad {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Lifecycle error.
    pub fn lifecycle(step: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Lifecycle {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Returns true for extract/load failures confined to a single table.
    ///
    /// These are the only errors the table error policy may let the run
    /// survive.
    pub fn is_table_scoped(&self) -> bool {
        matches!(self, ExtractError::Extract { .. } | ExtractError::Load { .. })
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExtractError::Config(_) | ExtractError::Yaml(_) | ExtractError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            ExtractError::Connection { .. } => EXIT_CONNECTION_ERROR,
            ExtractError::Catalog(_) => EXIT_CATALOG_ERROR,
            ExtractError::Extract { .. } => EXIT_EXTRACT_ERROR,
            ExtractError::Load { .. } => EXIT_LOAD_ERROR,
            ExtractError::PostLoad { .. }
            | ExtractError::FinalProcedure(_)
            | ExtractError::Lifecycle { .. } => EXIT_PROCEDURE_ERROR,
            ExtractError::Io(_) => EXIT_IO_ERROR,
            ExtractError::TablesFailed { .. } => EXIT_TABLES_FAILED,
            ExtractError::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for extract-load operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
