//! End-of-run notification.
//!
//! Exactly one message is produced per run: success to the success list,
//! failure to the failure list. Delivery is pluggable through [`Notifier`].

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

/// Which recipient list a notification goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Failure,
}

/// One outbound run notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunNotification {
    pub kind: NotificationKind,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl RunNotification {
    /// Success message carrying the table count and elapsed minutes.
    pub fn success(label: &str, recipients: Vec<String>, tables: usize, elapsed: Duration) -> Self {
        Self {
            kind: NotificationKind::Success,
            recipients,
            subject: format!("{} extract Successful", label),
            body: format!(
                "{} extract successful\nExtracted {} tables\nExecution time {:.4} minutes",
                label,
                tables,
                elapsed.as_secs_f64() / 60.0
            ),
        }
    }

    /// Failure message carrying the error and where to find the log.
    pub fn failure(label: &str, recipients: Vec<String>, error: &str, log_ref: &str) -> Self {
        Self {
            kind: NotificationKind::Failure,
            recipients,
            subject: format!("{} extract Failed", label),
            body: format!(
                "{} extract FAILED\nError {}\nPlease review log file {}",
                label, error, log_ref
            ),
        }
    }
}

/// Delivers run notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &RunNotification) -> Result<()>;
}

/// Notifier that records the message through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &RunNotification) -> Result<()> {
        let to = notification.recipients.join(", ");
        match notification.kind {
            NotificationKind::Success => info!(
                to = %to,
                subject = %notification.subject,
                "{}",
                notification.body
            ),
            NotificationKind::Failure => error!(
                to = %to,
                subject = %notification.subject,
                "{}",
                notification.body
            ),
        }
        Ok(())
    }
}
