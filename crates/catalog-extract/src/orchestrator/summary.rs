//! Run phases, per-table outcomes and the run summary.

use crate::error::Result;
use crate::lifecycle::ResultCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Position of a run in its state machine.
///
/// `Init → CatalogLoaded → {Formatting → Extracting → Loading → PostLoad →
/// Reported}* → FinalProcedure → Done`, with `Failed` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    CatalogLoaded,
    Formatting,
    Extracting,
    Loading,
    PostLoad,
    Reported,
    FinalProcedure,
    Done,
    Failed,
}

impl RunPhase {
    /// Whether `next` may follow this phase.
    pub fn can_enter(self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (Failed, _) | (Done, _) => false,
            (_, Failed) => true,
            (Init, CatalogLoaded) => true,
            (CatalogLoaded | Reported, Formatting) => true,
            (Formatting, Extracting) => true,
            (Formatting, Reported) => true,
            (Extracting, Loading) => true,
            (Loading, Extracting) => true,
            (Extracting | Loading, PostLoad | Reported) => true,
            (PostLoad, Reported) => true,
            (CatalogLoaded | Reported, FinalProcedure | Done) => true,
            (FinalProcedure, Done) => true,
            _ => false,
        }
    }
}

/// Tracks the current phase and logs transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    phase: RunPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            phase: RunPhase::Init,
        }
    }
}

impl PhaseTracker {
    /// Move to `next`. Invalid transitions are logged and still applied so
    /// the summary reflects where the run actually stopped.
    pub fn enter(&mut self, next: RunPhase) {
        if self.phase == next {
            return;
        }
        if self.phase.can_enter(next) {
            debug!("Run phase {:?} -> {:?}", self.phase, next);
        } else {
            debug!("Unexpected run phase transition {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
    }

    pub fn current(&self) -> RunPhase {
        self.phase
    }
}

/// Result of processing one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    pub step_name: String,
    pub status: ResultCode,
    pub rows_read: u64,
    pub rows_written: u64,
    pub fetches: u64,
    pub inserts: u64,
    pub elapsed_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of an extract run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: completed, failed or cancelled.
    pub status: String,

    /// Hash of the configuration the run used.
    pub config_hash: String,

    /// Phase the run ended in.
    pub phase: RunPhase,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Catalog entries selected for the run.
    pub tables_total: usize,

    /// Tables loaded successfully.
    pub tables_processed: usize,

    /// Tables that failed.
    pub tables_failed: usize,

    /// Names of failed tables.
    pub failed_tables: Vec<String>,

    /// Rows read from the source across all tables.
    pub rows_read: u64,

    /// Rows written to the target across all tables.
    pub rows_written: u64,

    /// Per-table outcomes in processing order.
    pub tables: Vec<TableOutcome>,

    /// Error that ended the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
