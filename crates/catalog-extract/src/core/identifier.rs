//! Identifier validation, quoting and literal escaping for generated SQL.
//!
//! Table and column names come from the catalog and cannot be bound as
//! parameters, so every name embedded in statement text goes through here.

use crate::error::{ExtractError, Result};

/// Maximum identifier length accepted by SQL Server.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty names, names with null bytes and names over the length limit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ExtractError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(ExtractError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ExtractError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier with brackets, doubling any `]`.
pub fn quote_bracket(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a target table as `db.owner.[table]`.
///
/// Database and owner come from configuration and are embedded as written,
/// so already-bracketed values like `[PXLTD_CEDW]` are accepted.
pub fn qualify_target_table(database: &str, owner: &str, table: &str) -> Result<String> {
    validate_identifier(database)?;
    validate_identifier(owner)?;
    Ok(format!("{}.{}.{}", database, owner, quote_bracket(table)?))
}

/// Escape a string for use inside a single-quoted SQL literal.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let err = validate_identifier("Cust\0omer").unwrap_err();
        assert!(err.to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_accepts_max_length() {
        assert!(validate_identifier(&"a".repeat(128)).is_ok());
        assert!(validate_identifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_quote_bracket_escapes_bracket() {
        assert_eq!(quote_bracket("Customer").unwrap(), "[Customer]");
        assert_eq!(quote_bracket("odd]name").unwrap(), "[odd]]name]");
    }

    #[test]
    fn test_quote_bracket_injection_safely_quoted() {
        let quoted = quote_bracket("x]; DROP TABLE t; --").unwrap();
        assert_eq!(quoted, "[x]]; DROP TABLE t; --]");
    }

    #[test]
    fn test_qualify_target_table() {
        assert_eq!(
            qualify_target_table("PXLTD_CEDW", "dbo", "EmployeeEarning").unwrap(),
            "PXLTD_CEDW.dbo.[EmployeeEarning]"
        );
        assert!(qualify_target_table("", "dbo", "T").is_err());
    }

    #[test]
    fn test_escape_sql_string() {
        assert_eq!(escape_sql_string("QB_CEDW"), "QB_CEDW");
        assert_eq!(escape_sql_string("O'Brien"), "O''Brien");
    }
}
