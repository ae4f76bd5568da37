//! Source database access.

pub mod convert;
pub mod cursor;
pub mod odbc;

pub use convert::{decode_cell, ColumnKind};
pub use cursor::BatchCursor;
pub use odbc::OdbcSource;

use crate::core::value::RowBatch;
use crate::error::Result;
use async_trait::async_trait;

/// Trait for source database operations.
#[async_trait]
pub trait SourceConnection: Send + Sync {
    /// Execute a SELECT and keep its result set open for batched fetching.
    async fn open_cursor(&self, select: &str, fetch_size: usize) -> Result<Box<dyn RowFetcher>>;

    /// Release the connection.
    async fn close(&self);
}

/// One open result set, read in bounded round trips.
#[async_trait]
pub trait RowFetcher: Send {
    /// Fetch at most `fetch_size` rows. An empty batch means the result set is exhausted.
    async fn fetch(&mut self) -> Result<RowBatch>;

    /// Release the server-side cursor. Safe to call more than once.
    async fn close(&mut self);
}
