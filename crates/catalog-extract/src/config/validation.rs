//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::error::{ExtractError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("control", &config.control)?;
    validate_connection("source", &config.source)?;
    validate_connection("target", &config.target)?;

    let extract = &config.extract;
    if extract.source_db_tag.trim().is_empty() {
        return Err(ExtractError::Config(
            "extract.source_db_tag is required".into(),
        ));
    }
    if extract.fetch_size == 0 {
        return Err(ExtractError::Config(
            "extract.fetch_size must be at least 1".into(),
        ));
    }
    if extract.catalog_table.trim().is_empty() {
        return Err(ExtractError::Config(
            "extract.catalog_table is required".into(),
        ));
    }
    if extract.target_owner.trim().is_empty() {
        return Err(ExtractError::Config(
            "extract.target_owner is required".into(),
        ));
    }
    if config.target_database().trim().is_empty() {
        return Err(ExtractError::Config(
            "extract.target_database or target.database is required".into(),
        ));
    }
    if extract.reserved_columns.iter().any(|c| c.trim().is_empty()) {
        return Err(ExtractError::Config(
            "extract.reserved_columns cannot contain empty names".into(),
        ));
    }

    if let Some(api) = &config.control_api {
        if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
            return Err(ExtractError::Config(format!(
                "control_api.base_url must be an http(s) URL, got '{}'",
                api.base_url
            )));
        }
        if api.timeout_seconds == 0 {
            return Err(ExtractError::Config(
                "control_api.timeout_seconds must be at least 1".into(),
            ));
        }
    }

    for (table, policy) in config.tables.iter() {
        if policy.extra_source_column.is_some() != policy.extra_target_column.is_some() {
            return Err(ExtractError::Config(format!(
                "tables.{}: extra_source_column and extra_target_column must be set together",
                table
            )));
        }
        let columns = [&policy.extra_source_column, &policy.extra_target_column];
        if columns
            .iter()
            .any(|c| c.as_deref().is_some_and(|c| c.trim().is_empty()))
        {
            return Err(ExtractError::Config(format!(
                "tables.{}: extra columns cannot be empty",
                table
            )));
        }
        if policy
            .post_load_procedure
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(ExtractError::Config(format!(
                "tables.{}: post_load_procedure cannot be empty",
                table
            )));
        }
    }

    Ok(())
}

fn validate_connection(role: &str, conn: &ConnectionConfig) -> Result<()> {
    let has_dsn = conn.dsn.as_deref().is_some_and(|d| !d.is_empty());
    let has_server = conn.server.as_deref().is_some_and(|s| !s.is_empty());
    if !has_dsn && !has_server {
        return Err(ExtractError::Config(format!(
            "{}.dsn or {}.server is required",
            role, role
        )));
    }
    if has_server && conn.database.is_empty() {
        return Err(ExtractError::Config(format!(
            "{}.database is required",
            role
        )));
    }
    Ok(())
}
