//! Core types shared by every stage of the extract-load pipeline.
//!
//! - [`catalog`]: catalog entries and ordered column lists
//! - [`value`]: typed scalar values, rows and batches
//! - [`identifier`]: identifier quoting and literal escaping for generated SQL

pub mod catalog;
pub mod identifier;
pub mod value;

pub use catalog::{column_count, ColumnList, TableExtractSpec};
pub use value::{RowBatch, RowRecord, SqlValue, DATETIME_FORMAT};
