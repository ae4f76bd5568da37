//! Bounded, forward-only batch iteration over one source query.

use super::{RowFetcher, SourceConnection};
use crate::core::value::RowBatch;
use crate::error::{ExtractError, Result};
use tracing::debug;

/// A source query exposed as a finite, non-restartable sequence of batches.
///
/// Iteration stops after the first batch shorter than the fetch size, so a
/// partial last batch costs no extra round trip and a table that is an exact
/// multiple of the fetch size costs exactly one (empty) extra fetch. The
/// underlying cursor is released when the sequence ends, on error, or on
/// [`BatchCursor::close`].
pub struct BatchCursor {
    table: String,
    fetcher: Box<dyn RowFetcher>,
    fetch_size: usize,
    done: bool,
    closed: bool,
    fetches: u64,
    rows_read: u64,
}

impl BatchCursor {
    /// Open the SELECT on the source.
    pub async fn open(
        source: &dyn SourceConnection,
        table: &str,
        select: &str,
        fetch_size: usize,
    ) -> Result<Self> {
        if fetch_size == 0 {
            return Err(ExtractError::Config(
                "fetch size must be at least 1".to_string(),
            ));
        }

        debug!("{}: opening cursor: {}", table, select);
        let fetcher = source
            .open_cursor(select, fetch_size)
            .await
            .map_err(|e| scope_error(table, e))?;

        Ok(Self {
            table: table.to_string(),
            fetcher,
            fetch_size,
            done: false,
            closed: false,
            fetches: 0,
            rows_read: 0,
        })
    }

    /// Fetch the next batch, or `None` once the result set is exhausted.
    ///
    /// Every returned batch is non-empty and at most `fetch_size` rows.
    pub async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.done {
            return Ok(None);
        }

        let batch = match self.fetcher.fetch().await {
            Ok(batch) => batch,
            Err(e) => {
                self.done = true;
                self.close().await;
                return Err(scope_error(&self.table, e));
            }
        };
        self.fetches += 1;

        if batch.len() > self.fetch_size {
            self.done = true;
            self.close().await;
            return Err(ExtractError::extract(
                &self.table,
                format!(
                    "source returned {} rows for a fetch size of {}",
                    batch.len(),
                    self.fetch_size
                ),
            ));
        }

        self.rows_read += batch.len() as u64;
        if batch.len() < self.fetch_size {
            self.done = true;
            self.close().await;
        }

        debug!(
            "{}: fetch {} returned {} rows",
            self.table,
            self.fetches,
            batch.len()
        );

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    /// Release the source cursor. Idempotent.
    pub async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.fetcher.close().await;
        }
    }

    /// Number of fetch round trips issued so far.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// Rows returned so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// True once the last batch has been returned.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Attach the table to errors raised below the cursor.
fn scope_error(table: &str, err: ExtractError) -> ExtractError {
    match err {
        ExtractError::Extract { .. } | ExtractError::Cancelled => err,
        other => ExtractError::extract(table, other.to_string()),
    }
}
