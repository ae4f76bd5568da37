//! # catalog-extract
//!
//! Metadata-driven, batched extract-load engine.
//!
//! A catalog in a control database lists the tables to copy and their column
//! lists. For each entry the engine generates the SELECT and parameterized
//! INSERT text, streams source rows through a bounded fetch cursor, coerces
//! values for the target, truncates and reloads the target table, and reports
//! start/end lifecycle events with row counts to a control service.
//!
//! - **Bounded memory**: rows are read in fetch-size batches, never a whole table
//! - **Declarative overrides**: extra columns, single-row inserts and post-load
//!   procedures are configured per table
//! - **Explicit error policy**: per-table, post-load and lifecycle failures can
//!   abort the run or be logged and skipped
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalog_extract::{Config, ExtractOrchestrator, RunContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let ctx = RunContext::connect(&config).await?;
//!     let summary = ExtractOrchestrator::new(config).run(ctx).await?;
//!     println!("Extracted {} tables", summary.tables_processed);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod odbc;
pub mod orchestrator;
pub mod source;
pub mod sql;
pub mod target;
pub mod transform;

// Re-exports for convenient access
pub use catalog::CatalogStore;
pub use config::{Config, ErrorPolicy, InsertMode, TablePolicies, TablePolicy};
pub use core::{ColumnList, RowBatch, RowRecord, SqlValue, TableExtractSpec};
pub use error::{ExtractError, Result};
pub use lifecycle::{LifecycleAck, LifecycleClient, ResultCode, RowCounts};
pub use notify::{LogNotifier, NotificationKind, Notifier, RunNotification};
pub use orchestrator::{ExtractOrchestrator, RunContext, RunPhase, RunSummary, TablePlan};
pub use source::{BatchCursor, RowFetcher, SourceConnection};
pub use sql::{ColumnFormatter, StatementBuilder};
pub use target::{TargetConnection, TargetWriter};
pub use transform::RowTransformer;
