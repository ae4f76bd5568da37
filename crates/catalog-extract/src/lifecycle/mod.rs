//! Start/end lifecycle events sent to the ETL control service.
//!
//! Every processed table is bracketed by exactly one start and one end event.
//! Whether a failed report stops the run is governed by the configured
//! [`ErrorPolicy`]; by default it is logged and the run continues.

pub mod http;

pub use http::HttpLifecycleClient;

use crate::config::ErrorPolicy;
use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome reported in an end event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultCode::Ok => f.write_str("OK"),
            ResultCode::Fail => f.write_str("FAIL"),
        }
    }
}

/// Row counts carried by an end event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    #[serde(rename = "Num_Rows_Read")]
    pub num_rows_read: u64,
    #[serde(rename = "Num_Rows_Processed")]
    pub num_rows_processed: u64,
    #[serde(rename = "Total_Rows_From_Source")]
    pub total_rows_from_source: u64,
    #[serde(rename = "Total_Rows_To_Target")]
    pub total_rows_to_target: u64,
}

impl RowCounts {
    /// Counts for a table that read `read` rows and wrote `written`.
    pub fn new(read: u64, written: u64) -> Self {
        Self {
            num_rows_read: read,
            num_rows_processed: written,
            total_rows_from_source: read,
            total_rows_to_target: written,
        }
    }
}

/// End-of-table event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub step_name: String,
    pub status: ResultCode,
    pub rows_read: u64,
    pub rows_processed: u64,
}

impl LifecycleEvent {
    /// Counts block sent with the event.
    pub fn counts(&self) -> RowCounts {
        RowCounts::new(self.rows_read, self.rows_processed)
    }
}

/// Acknowledgement returned by the control service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleAck {
    pub status: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl LifecycleAck {
    /// Acknowledgement used when no control service is configured.
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
            result: serde_json::Value::Null,
        }
    }

    /// Anything but a `Fail` status counts as accepted.
    pub fn is_ok(&self) -> bool {
        !self.status.eq_ignore_ascii_case("fail")
    }
}

/// Transport for lifecycle events.
#[async_trait]
pub trait LifecycleClient: Send + Sync {
    /// Report the start of a step.
    async fn start(&self, step_name: &str) -> Result<LifecycleAck>;

    /// Report the end of a step with its counts.
    async fn end(&self, step_name: &str, code: ResultCode, counts: RowCounts) -> Result<LifecycleAck>;
}

/// Client that only records events in the log.
#[derive(Debug, Default, Clone)]
pub struct LogLifecycleClient;

#[async_trait]
impl LifecycleClient for LogLifecycleClient {
    async fn start(&self, step_name: &str) -> Result<LifecycleAck> {
        info!("Lifecycle start: {}", step_name);
        Ok(LifecycleAck::ok())
    }

    async fn end(&self, step_name: &str, code: ResultCode, counts: RowCounts) -> Result<LifecycleAck> {
        info!(
            "Lifecycle end: {} {} (read {}, written {})",
            step_name, code, counts.num_rows_read, counts.total_rows_to_target
        );
        Ok(LifecycleAck::ok())
    }
}

/// Emits lifecycle events and applies the lifecycle error policy.
#[derive(Clone)]
pub struct LifecycleReporter {
    client: Arc<dyn LifecycleClient>,
    policy: ErrorPolicy,
}

impl LifecycleReporter {
    pub fn new(client: Arc<dyn LifecycleClient>, policy: ErrorPolicy) -> Self {
        Self { client, policy }
    }

    /// Report that a step started.
    pub async fn report_start(&self, step_name: &str) -> Result<()> {
        debug!("Reporting start of {}", step_name);
        let outcome = self.client.start(step_name).await;
        self.settle(step_name, "start", outcome)
    }

    /// Report that a step ended.
    pub async fn report_end(&self, event: &LifecycleEvent) -> Result<()> {
        debug!("Reporting end of {}: {}", event.step_name, event.status);
        let outcome = self
            .client
            .end(&event.step_name, event.status, event.counts())
            .await;
        self.settle(&event.step_name, "end", outcome)
    }

    fn settle(&self, step_name: &str, kind: &str, outcome: Result<LifecycleAck>) -> Result<()> {
        let message = match outcome {
            Ok(ack) if ack.is_ok() => return Ok(()),
            Ok(ack) => format!("{} rejected with status {} ({})", kind, ack.status, ack.result),
            Err(e) => format!("{} failed: {}", kind, e),
        };

        match self.policy {
            ErrorPolicy::Abort => Err(ExtractError::lifecycle(step_name, message)),
            ErrorPolicy::Continue => {
                warn!("Lifecycle {} for {}; continuing", message, step_name);
                Ok(())
            }
        }
    }
}
