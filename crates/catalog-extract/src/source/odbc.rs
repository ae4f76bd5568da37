//! ODBC-backed source connection.
//!
//! The cursor is held by the session worker between open and close, so one
//! table's result set is read in bounded fetches without ever being
//! materialized in full.

use super::{RowFetcher, SourceConnection};
use crate::config::ConnectionConfig;
use crate::core::value::RowBatch;
use crate::error::Result;
use crate::odbc::OdbcSession;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Source database reached over ODBC.
pub struct OdbcSource {
    session: Arc<OdbcSession>,
}

impl OdbcSource {
    /// Connect to the source database.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let session = OdbcSession::connect("source", config.connection_string()).await?;
        info!("Connected to source via ODBC: {}", config.describe());
        Ok(Self {
            session: Arc::new(session),
        })
    }
}

#[async_trait]
impl SourceConnection for OdbcSource {
    async fn open_cursor(&self, select: &str, fetch_size: usize) -> Result<Box<dyn RowFetcher>> {
        self.session.open_cursor(select, fetch_size).await?;
        Ok(Box::new(OdbcFetcher {
            session: self.session.clone(),
            closed: false,
        }))
    }

    async fn close(&self) {
        self.session.close().await;
    }
}

/// Fetcher over the cursor held by the source session.
struct OdbcFetcher {
    session: Arc<OdbcSession>,
    closed: bool,
}

#[async_trait]
impl RowFetcher for OdbcFetcher {
    async fn fetch(&mut self) -> Result<RowBatch> {
        self.session.fetch().await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.session.close_cursor();
        }
    }
}

impl Drop for OdbcFetcher {
    fn drop(&mut self) {
        if !self.closed {
            self.session.close_cursor();
        }
    }
}
