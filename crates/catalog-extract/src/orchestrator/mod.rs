//! Extract orchestrator - main workflow coordinator.
//!
//! Reads the catalog once, then drives each table through format, build,
//! cursor read, transform, write and report, strictly one table at a time in
//! catalog order. A cross-table procedure runs once after the loop.

mod context;
mod summary;

pub use context::{health_check, lifecycle_client, HealthStatus, RunContext};
pub use summary::{PhaseTracker, RunPhase, RunSummary, TableOutcome};

use crate::catalog::CatalogStore;
use crate::config::{Config, ErrorPolicy, InsertMode, TablePolicy};
use crate::core::catalog::TableExtractSpec;
use crate::error::{ExtractError, Result};
use crate::lifecycle::{LifecycleEvent, LifecycleReporter, ResultCode};
use crate::notify::{Notifier, RunNotification};
use crate::source::BatchCursor;
use crate::sql::{StatementBuilder, TableStatements};
use crate::target::{run_final_procedure, TargetWriter};
use crate::transform::RowTransformer;
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Statements and policy a table would be loaded with.
#[derive(Debug, Clone, Serialize)]
pub struct TablePlan {
    pub table: String,
    pub step_name: String,
    pub select: String,
    pub insert: String,
    pub target_table: String,
    pub insert_mode: InsertMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_load_procedure: Option<String>,
}

/// Mutable state of one run.
#[derive(Debug, Default)]
struct RunState {
    phase: PhaseTracker,
    tables_total: usize,
    outcomes: Vec<TableOutcome>,
}

impl RunState {
    fn failed_tables(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ResultCode::Fail)
            .map(|o| o.table.clone())
            .collect()
    }
}

/// Counters for the table being processed, kept up to date so a failing
/// table can still report what it read and wrote.
#[derive(Debug, Default, Clone, Copy)]
struct TableProgress {
    rows_read: u64,
    rows_written: u64,
    fetches: u64,
    inserts: u64,
}

/// Extract orchestrator.
pub struct ExtractOrchestrator {
    config: Config,
    log_ref: String,
    cancel: CancellationToken,
}

impl ExtractOrchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            log_ref: "stderr".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the log reference quoted in failure notifications.
    pub fn with_log_ref(mut self, log_ref: impl Into<String>) -> Self {
        self.log_ref = log_ref.into();
        self
    }

    /// Use an externally controlled cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the extract.
    ///
    /// The context is closed and exactly one notification is sent whatever
    /// the outcome.
    pub async fn run(&self, ctx: RunContext) -> Result<RunSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting extract run: {}", run_id);

        let mut state = RunState::default();
        let result = self.run_tables(&ctx, &mut state).await;

        ctx.close().await;

        let elapsed = clock.elapsed();
        let status = match &result {
            Ok(()) => {
                state.phase.enter(RunPhase::Done);
                "completed"
            }
            Err(ExtractError::Cancelled) => {
                state.phase.enter(RunPhase::Failed);
                "cancelled"
            }
            Err(_) => {
                state.phase.enter(RunPhase::Failed);
                "failed"
            }
        };

        let failed_tables = state.failed_tables();
        let summary = RunSummary {
            run_id,
            status: status.to_string(),
            config_hash: self.config.hash(),
            phase: state.phase.current(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds: elapsed.as_secs_f64(),
            tables_total: state.tables_total,
            tables_processed: state.outcomes.len() - failed_tables.len(),
            tables_failed: failed_tables.len(),
            failed_tables,
            rows_read: state.outcomes.iter().map(|o| o.rows_read).sum(),
            rows_written: state.outcomes.iter().map(|o| o.rows_written).sum(),
            tables: state.outcomes,
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        info!(
            "Extract run {} {}: {} of {} tables processed, {} rows read, {} rows written in {:.4} minutes",
            summary.run_id,
            summary.status,
            summary.tables_processed,
            summary.tables_total,
            summary.rows_read,
            summary.rows_written,
            elapsed.as_secs_f64() / 60.0
        );

        match result {
            Ok(()) => {
                self.notify_success(ctx.notifier.as_ref(), summary.tables_processed, elapsed)
                    .await;
                Ok(summary)
            }
            Err(e) => {
                error!("Extract run failed: {}", e);
                self.notify_failure(ctx.notifier.as_ref(), &e).await;
                Err(e)
            }
        }
    }

    /// Load the catalog and generate each table's statements without
    /// touching the source or target.
    pub async fn plan(&self, catalog: &dyn CatalogStore) -> Result<Vec<TablePlan>> {
        let specs = self.load_catalog(catalog).await?;
        let builder = StatementBuilder::from_config(&self.config);

        specs
            .iter()
            .map(|spec| {
                let policy = self.config.tables.policy_for(&spec.table_name);
                let stmts = builder.build(spec, &policy)?;
                Ok(TablePlan {
                    table: spec.table_name.clone(),
                    step_name: spec.step_name(self.config.step_prefix()),
                    select: stmts.select,
                    insert: stmts.insert,
                    target_table: stmts.target_table,
                    insert_mode: policy.insert_mode,
                    post_load_procedure: policy.post_load_procedure,
                })
            })
            .collect()
    }

    /// Send the success notification. Delivery errors are logged.
    pub async fn notify_success(&self, notifier: &dyn Notifier, tables: usize, elapsed: Duration) {
        let notification = RunNotification::success(
            &self.config.extract.source_db_tag,
            self.config.notification.success.clone(),
            tables,
            elapsed,
        );
        if let Err(e) = notifier.notify(&notification).await {
            warn!("Failed to send success notification: {}", e);
        }
    }

    /// Send the failure notification. Delivery errors are logged.
    pub async fn notify_failure(&self, notifier: &dyn Notifier, err: &ExtractError) {
        let notification = RunNotification::failure(
            &self.config.extract.source_db_tag,
            self.config.notification.failure.clone(),
            &err.to_string(),
            &self.log_ref,
        );
        if let Err(e) = notifier.notify(&notification).await {
            warn!("Failed to send failure notification: {}", e);
        }
    }

    async fn load_catalog(&self, catalog: &dyn CatalogStore) -> Result<Vec<TableExtractSpec>> {
        let tag = &self.config.extract.source_db_tag;
        let specs = catalog.load_catalog(tag).await.map_err(|e| match e {
            ExtractError::Catalog(_) => e,
            other => ExtractError::Catalog(other.to_string()),
        })?;
        info!("Number of tables to process -> {}", specs.len());
        Ok(specs)
    }

    async fn run_tables(&self, ctx: &RunContext, state: &mut RunState) -> Result<()> {
        let specs = self.load_catalog(ctx.catalog.as_ref()).await?;
        state.tables_total = specs.len();
        state.phase.enter(RunPhase::CatalogLoaded);

        let builder = StatementBuilder::from_config(&self.config);
        let reporter =
            LifecycleReporter::new(ctx.lifecycle.clone(), self.config.extract.on_lifecycle_error);

        for spec in &specs {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping before {}", spec.table_name);
                return Err(ExtractError::Cancelled);
            }

            match self.process_table(ctx, &builder, &reporter, spec, state).await {
                Ok(()) => {}
                Err(e)
                    if e.is_table_scoped()
                        && self.config.extract.on_table_error == ErrorPolicy::Continue =>
                {
                    error!("{}; continuing with the next table", e);
                }
                Err(e) => return Err(e),
            }
        }

        let failed = state.failed_tables();
        if !failed.is_empty() {
            if self.config.extract.final_procedure.is_some() {
                warn!(
                    "Skipping final procedure because {} table(s) failed",
                    failed.len()
                );
            }
            return Err(ExtractError::TablesFailed {
                count: failed.len(),
                tables: failed.join(", "),
            });
        }

        if let Some(procedure) = &self.config.extract.final_procedure {
            state.phase.enter(RunPhase::FinalProcedure);
            run_final_procedure(ctx.target.as_ref(), procedure).await?;
        }

        Ok(())
    }

    /// Process one table, bracketed by lifecycle start and end events.
    ///
    /// The outcome is recorded whether or not the table succeeds.
    async fn process_table(
        &self,
        ctx: &RunContext,
        builder: &StatementBuilder,
        reporter: &LifecycleReporter,
        spec: &TableExtractSpec,
        state: &mut RunState,
    ) -> Result<()> {
        let clock = Instant::now();
        let step_name = spec.step_name(self.config.step_prefix());
        let policy = self.config.tables.policy_for(&spec.table_name);

        reporter.report_start(&step_name).await?;
        info!("Processing table -> {}", spec.table_name);

        let mut progress = TableProgress::default();
        let result = self
            .load_table(ctx, builder, spec, &policy, state, &mut progress)
            .await;

        let status = if result.is_ok() {
            ResultCode::Ok
        } else {
            ResultCode::Fail
        };
        let event = LifecycleEvent {
            step_name: step_name.clone(),
            status,
            rows_read: progress.rows_read,
            rows_processed: progress.rows_written,
        };
        let reported = reporter.report_end(&event).await;
        state.phase.enter(RunPhase::Reported);

        let elapsed = clock.elapsed();
        info!(
            "{}: {} ({} rows read, {} rows written) in {:.4} minutes",
            spec.table_name,
            status,
            progress.rows_read,
            progress.rows_written,
            elapsed.as_secs_f64() / 60.0
        );

        state.outcomes.push(TableOutcome {
            table: spec.table_name.clone(),
            step_name,
            status,
            rows_read: progress.rows_read,
            rows_written: progress.rows_written,
            fetches: progress.fetches,
            inserts: progress.inserts,
            elapsed_seconds: elapsed.as_secs_f64(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        match (result, reported) {
            (Err(e), Err(report_err)) => {
                warn!("Could not report failure of {}: {}", spec.table_name, report_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), reported) => reported,
        }
    }

    async fn load_table(
        &self,
        ctx: &RunContext,
        builder: &StatementBuilder,
        spec: &TableExtractSpec,
        policy: &TablePolicy,
        state: &mut RunState,
        progress: &mut TableProgress,
    ) -> Result<()> {
        state.phase.enter(RunPhase::Formatting);
        let stmts = builder.build(spec, policy)?;
        debug!("{}: {}", spec.table_name, stmts.select);
        debug!("{}: {}", spec.table_name, stmts.insert);

        let mut writer = TargetWriter::new(
            ctx.target.as_ref(),
            &spec.table_name,
            &stmts,
            policy.insert_mode,
        );
        writer.truncate().await?;

        state.phase.enter(RunPhase::Extracting);
        let mut cursor = BatchCursor::open(
            ctx.source.as_ref(),
            &spec.table_name,
            &stmts.select,
            self.config.extract.fetch_size,
        )
        .await?;

        let pumped = self
            .pump(&stmts, &spec.table_name, &mut cursor, &mut writer, state, progress)
            .await;
        cursor.close().await;
        progress.rows_read = cursor.rows_read();
        progress.fetches = cursor.fetches();
        pumped?;

        if let Some(procedure) = &policy.post_load_procedure {
            state.phase.enter(RunPhase::PostLoad);
            if let Err(e) = writer.run_post_load(procedure).await {
                match self.config.extract.on_post_load_error {
                    ErrorPolicy::Abort => return Err(e),
                    ErrorPolicy::Continue => warn!("{}; continuing", e),
                }
            }
        }

        Ok(())
    }

    /// Move batches from the cursor through the transformer into the writer.
    async fn pump(
        &self,
        stmts: &TableStatements,
        table: &str,
        cursor: &mut BatchCursor,
        writer: &mut TargetWriter<'_>,
        state: &mut RunState,
        progress: &mut TableProgress,
    ) -> Result<()> {
        let transformer = RowTransformer::new(table, stmts.placeholders);

        loop {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested while loading {}", table);
                return Err(ExtractError::Cancelled);
            }

            let batch = cursor.next_batch().await;
            progress.rows_read = cursor.rows_read();
            progress.fetches = cursor.fetches();
            let Some(batch) = batch? else {
                break;
            };
            info!("Number of rows selected -> {}", batch.len());

            let rows = transformer.transform_batch(batch)?;

            state.phase.enter(RunPhase::Loading);
            let written = writer.write_batch(&rows).await;
            progress.rows_written = writer.stats().rows_written;
            progress.inserts = writer.stats().inserts;
            written?;
            state.phase.enter(RunPhase::Extracting);
        }

        Ok(())
    }
}
