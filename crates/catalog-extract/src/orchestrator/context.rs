//! Connections and collaborators owned by one run.

use crate::catalog::{CatalogStore, OdbcCatalog};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{HttpLifecycleClient, LifecycleClient, LogLifecycleClient};
use crate::notify::{LogNotifier, Notifier};
use crate::source::{OdbcSource, SourceConnection};
use crate::target::{OdbcTarget, TargetConnection};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Everything a run talks to, constructed once and closed on every exit path.
#[derive(Clone)]
pub struct RunContext {
    pub catalog: Arc<dyn CatalogStore>,
    pub source: Arc<dyn SourceConnection>,
    pub target: Arc<dyn TargetConnection>,
    pub lifecycle: Arc<dyn LifecycleClient>,
    pub notifier: Arc<dyn Notifier>,
}

impl RunContext {
    /// Assemble a context from already-open collaborators.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        source: Arc<dyn SourceConnection>,
        target: Arc<dyn TargetConnection>,
        lifecycle: Arc<dyn LifecycleClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            catalog,
            source,
            target,
            lifecycle,
            notifier,
        }
    }

    /// Open the control, source and target connections over ODBC.
    ///
    /// Connections already opened are closed again if a later one fails.
    pub async fn connect(config: &Config) -> Result<Self> {
        let lifecycle = lifecycle_client(config)?;

        let catalog = OdbcCatalog::connect(&config.control, &config.extract.catalog_table).await?;

        let source = match OdbcSource::connect(&config.source).await {
            Ok(source) => source,
            Err(e) => {
                catalog.close().await;
                return Err(e);
            }
        };

        let target = match OdbcTarget::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                catalog.close().await;
                return Err(e);
            }
        };

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(source),
            Arc::new(target),
            lifecycle,
            Arc::new(LogNotifier),
        ))
    }

    /// Replace the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Close every connection.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
        self.catalog.close().await;
        info!("All connections closed");
    }
}

/// Lifecycle client for the configuration: HTTP when a control API is set, log-only otherwise.
pub fn lifecycle_client(config: &Config) -> Result<Arc<dyn LifecycleClient>> {
    Ok(match &config.control_api {
        Some(api) => Arc::new(HttpLifecycleClient::new(api)?),
        None => {
            info!("No control_api configured; lifecycle events are only logged");
            Arc::new(LogLifecycleClient)
        }
    })
}

/// Connectivity of one role.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub role: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    fn from_result(role: &str, result: Result<()>) -> Self {
        Self {
            role: role.to_string(),
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

/// Open and close each connection in turn, reporting per-role success.
pub async fn health_check(config: &Config) -> Vec<HealthStatus> {
    let control = match OdbcCatalog::connect(&config.control, &config.extract.catalog_table).await {
        Ok(c) => {
            c.close().await;
            Ok(())
        }
        Err(e) => Err(e),
    };
    let source = match OdbcSource::connect(&config.source).await {
        Ok(s) => {
            s.close().await;
            Ok(())
        }
        Err(e) => Err(e),
    };
    let target = match OdbcTarget::connect(&config.target).await {
        Ok(t) => {
            t.close().await;
            Ok(())
        }
        Err(e) => Err(e),
    };

    vec![
        HealthStatus::from_result("control", control),
        HealthStatus::from_result("source", source),
        HealthStatus::from_result("target", target),
    ]
}
