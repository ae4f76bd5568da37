//! ODBC session worker.
//!
//! ODBC handles are blocking and must stay on the thread that uses them, so
//! each connection lives on one dedicated worker thread for the whole run.
//! Async callers talk to it over an unbounded command channel and receive
//! replies on oneshot channels. An open source cursor lives inside the worker
//! between [`OdbcSession::open_cursor`] and [`OdbcSession::close_cursor`];
//! while it is open the worker serves only fetch and close commands.

use crate::core::value::RowBatch;
use crate::error::{ExtractError, Result};
use crate::source::convert::{decode_cell, ColumnKind};
use odbc_api::buffers::TextRowSet;
use odbc_api::{Connection, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Upper bound for a single text cell in fetch buffers.
const MAX_TEXT_CELL: usize = 65536;

/// Upper bound for a text cell in plain query results. Catalog column lists
/// for wide tables run well past the source cell limit.
const MAX_QUERY_CELL: usize = 262144;

/// Rows per fetch for plain (non-cursor) queries.
const QUERY_BATCH_SIZE: usize = 100;

/// Rows of parameter text, `None` binding as SQL NULL.
pub type ParamRows = Vec<Vec<Option<String>>>;

/// Rows returned by a plain query, as text.
pub type TextRows = Vec<Vec<Option<String>>>;

enum Command {
    Query {
        sql: String,
        reply: oneshot::Sender<Result<TextRows>>,
    },
    Execute {
        sql: String,
        reply: oneshot::Sender<Result<()>>,
    },
    InsertRows {
        sql: String,
        rows: ParamRows,
        reply: oneshot::Sender<Result<u64>>,
    },
    OpenCursor {
        sql: String,
        fetch_size: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Fetch {
        reply: oneshot::Sender<Result<RowBatch>>,
    },
    CloseCursor,
    Shutdown,
}

impl Command {
    fn reject(self, role: &str, message: &str) {
        let err = || ExtractError::connection(role, message);
        match self {
            Command::Query { reply, .. } => {
                let _ = reply.send(Err(err()));
            }
            Command::Execute { reply, .. } | Command::OpenCursor { reply, .. } => {
                let _ = reply.send(Err(err()));
            }
            Command::InsertRows { reply, .. } => {
                let _ = reply.send(Err(err()));
            }
            Command::Fetch { reply } => {
                let _ = reply.send(Err(err()));
            }
            Command::CloseCursor | Command::Shutdown => {}
        }
    }
}

/// Handle to one ODBC connection owned by a worker thread.
///
/// Dropping the handle closes the channel, which stops the worker and
/// releases the connection.
pub struct OdbcSession {
    role: &'static str,
    tx: mpsc::UnboundedSender<Command>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl OdbcSession {
    /// Open a connection on a new worker thread.
    ///
    /// `role` names the connection (control, source, target) in logs and errors.
    pub async fn connect(role: &'static str, connection_string: String) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = std::thread::Builder::new()
            .name(format!("odbc-{}", role))
            .spawn(move || worker_main(role, connection_string, rx, ready_tx))
            .map_err(|e| ExtractError::connection(role, format!("spawning worker: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = tokio::task::spawn_blocking(move || worker.join()).await;
                return Err(e);
            }
            Err(_) => {
                return Err(ExtractError::connection(
                    role,
                    "ODBC worker exited during connect",
                ));
            }
        }

        info!("Opened {} connection", role);
        Ok(Self {
            role,
            tx,
            worker: std::sync::Mutex::new(Some(worker)),
        })
    }

    /// Connection role.
    pub fn role(&self) -> &'static str {
        self.role
    }

    /// Run a query and return every row as text.
    pub async fn query(&self, sql: &str) -> Result<TextRows> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Query {
            sql: sql.to_string(),
            reply,
        })?;
        self.recv(rx).await?
    }

    /// Execute a statement, discarding any result set.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Execute {
            sql: sql.to_string(),
            reply,
        })?;
        self.recv(rx).await?
    }

    /// Execute a parameterized INSERT once, binding every row as one parameter set.
    pub async fn insert_rows(&self, sql: &str, rows: ParamRows) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::InsertRows {
            sql: sql.to_string(),
            rows,
            reply,
        })?;
        self.recv(rx).await?
    }

    /// Execute a SELECT and keep its cursor open in the worker.
    pub async fn open_cursor(&self, sql: &str, fetch_size: usize) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::OpenCursor {
            sql: sql.to_string(),
            fetch_size,
            reply,
        })?;
        self.recv(rx).await?
    }

    /// Fetch the next block of the open cursor. Empty when exhausted.
    pub async fn fetch(&self) -> Result<RowBatch> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Fetch { reply })?;
        self.recv(rx).await?
    }

    /// Release the open cursor, if any. Does not wait for the worker.
    pub fn close_cursor(&self) {
        let _ = self.tx.send(Command::CloseCursor);
    }

    /// Stop the worker and disconnect. Idempotent.
    pub async fn close(&self) {
        let _ = self.tx.send(Command::Shutdown);
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("{} ODBC worker did not shut down cleanly", self.role);
            }
            info!("Closed {} connection", self.role);
        }
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| ExtractError::connection(self.role, "connection is closed"))
    }

    async fn recv<T>(&self, rx: oneshot::Receiver<T>) -> Result<T> {
        rx.await
            .map_err(|_| ExtractError::connection(self.role, "ODBC worker stopped"))
    }
}

fn worker_main(
    role: &'static str,
    connection_string: String,
    mut rx: mpsc::UnboundedReceiver<Command>,
    ready: oneshot::Sender<Result<()>>,
) {
    let env = match Environment::new() {
        Ok(env) => env,
        Err(e) => {
            let _ = ready.send(Err(ExtractError::connection(
                role,
                format!(
                    "Failed to create ODBC environment: {}. \
                     Make sure an ODBC driver manager and driver are installed.",
                    e
                ),
            )));
            return;
        }
    };

    let conn = match env.connect_with_connection_string(&connection_string, ConnectionOptions::default())
    {
        Ok(conn) => conn,
        Err(e) => {
            let _ = ready.send(Err(ExtractError::connection(
                role,
                format!("Failed to connect via ODBC: {}", e),
            )));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            Command::Query { sql, reply } => {
                let _ = reply.send(run_query(role, &conn, &sql));
            }
            Command::Execute { sql, reply } => {
                let _ = reply.send(run_execute(role, &conn, &sql));
            }
            Command::InsertRows { sql, rows, reply } => {
                let _ = reply.send(run_insert(role, &conn, &sql, &rows));
            }
            Command::OpenCursor {
                sql,
                fetch_size,
                reply,
            } => {
                if !serve_cursor(role, &conn, &sql, fetch_size, reply, &mut rx) {
                    break;
                }
            }
            Command::Fetch { reply } => {
                let _ = reply.send(Err(ExtractError::connection(role, "no open cursor")));
            }
            Command::CloseCursor => {}
            Command::Shutdown => break,
        }
    }

    debug!("{} ODBC worker exiting", role);
}

fn odbc_error(role: &str, action: &str, sql: &str, e: odbc_api::Error) -> ExtractError {
    ExtractError::connection(role, format!("ODBC {} failed: {} - SQL: {}", action, e, sql))
}

/// Map a fetch error, naming the column when a value did not fit its buffer.
fn fetch_error(role: &str, sql: &str, limit: usize, e: odbc_api::Error) -> ExtractError {
    match e {
        odbc_api::Error::TooLargeValueForBuffer {
            indicator,
            buffer_index,
        } => {
            let size = indicator.map_or_else(|| "unknown".to_string(), |n| n.to_string());
            ExtractError::connection(
                role,
                format!(
                    "value in column {} truncated: {} bytes exceeds the {} byte buffer - SQL: {}",
                    buffer_index + 1,
                    size,
                    limit,
                    sql
                ),
            )
        }
        other => odbc_error(role, "fetch", sql, other),
    }
}

fn run_query(role: &str, conn: &Connection<'_>, sql: &str) -> Result<TextRows> {
    let mut rows = Vec::new();

    if let Some(mut cursor) = conn
        .execute(sql, ())
        .map_err(|e| odbc_error(role, "query", sql, e))?
    {
        let num_cols = cursor
            .num_result_cols()
            .map_err(|e| odbc_error(role, "column count", sql, e))? as usize;

        let mut buffers = TextRowSet::for_cursor(QUERY_BATCH_SIZE, &mut cursor, Some(MAX_QUERY_CELL))
            .map_err(|e| odbc_error(role, "row buffer", sql, e))?;

        let mut row_cursor = cursor
            .bind_buffer(&mut buffers)
            .map_err(|e| odbc_error(role, "bind buffer", sql, e))?;

        while let Some(batch) = row_cursor
            .fetch_with_truncation_check(true)
            .map_err(|e| fetch_error(role, sql, MAX_QUERY_CELL, e))?
        {
            for row_idx in 0..batch.num_rows() {
                let row = (0..num_cols)
                    .map(|col_idx| {
                        batch
                            .at(col_idx, row_idx)
                            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    })
                    .collect();
                rows.push(row);
            }
        }
    }

    Ok(rows)
}

fn run_execute(role: &str, conn: &Connection<'_>, sql: &str) -> Result<()> {
    conn.execute(sql, ())
        .map_err(|e| odbc_error(role, "execute", sql, e))?;
    Ok(())
}

fn run_insert(role: &str, conn: &Connection<'_>, sql: &str, rows: &ParamRows) -> Result<u64> {
    let Some(first) = rows.first() else {
        return Ok(0);
    };
    let width = first.len();

    let mut max_lens = vec![1usize; width];
    for row in rows {
        if row.len() != width {
            return Err(ExtractError::connection(
                role,
                format!("row has {} values, expected {}", row.len(), width),
            ));
        }
        for (len, value) in max_lens.iter_mut().zip(row) {
            if let Some(value) = value {
                *len = (*len).max(value.len());
            }
        }
    }

    let prepared = conn
        .prepare(sql)
        .map_err(|e| odbc_error(role, "prepare", sql, e))?;
    let mut inserter = prepared
        .into_text_inserter(rows.len(), max_lens)
        .map_err(|e| odbc_error(role, "bind parameters", sql, e))?;

    for row in rows {
        inserter
            .append(row.iter().map(|v| v.as_deref().map(str::as_bytes)))
            .map_err(|e| odbc_error(role, "bind row", sql, e))?;
    }

    inserter
        .execute()
        .map_err(|e| odbc_error(role, "insert", sql, e))?;

    Ok(rows.len() as u64)
}

/// Open a cursor and serve fetches until it is closed.
///
/// Returns false when the worker should stop.
fn serve_cursor(
    role: &str,
    conn: &Connection<'_>,
    sql: &str,
    fetch_size: usize,
    reply: oneshot::Sender<Result<()>>,
    rx: &mut mpsc::UnboundedReceiver<Command>,
) -> bool {
    let mut cursor = match conn.execute(sql, ()) {
        Ok(Some(cursor)) => cursor,
        Ok(None) => {
            // Statement produced no result set: behave as an exhausted cursor
            let _ = reply.send(Ok(()));
            return serve_open_cursor(role, rx, || Ok(Vec::new()));
        }
        Err(e) => {
            let _ = reply.send(Err(odbc_error(role, "query", sql, e)));
            return true;
        }
    };

    let kinds = match column_kinds(&mut cursor) {
        Ok(kinds) => kinds,
        Err(e) => {
            let _ = reply.send(Err(odbc_error(role, "describe columns", sql, e)));
            return true;
        }
    };

    let mut buffers = match TextRowSet::for_cursor(fetch_size, &mut cursor, Some(MAX_TEXT_CELL)) {
        Ok(buffers) => buffers,
        Err(e) => {
            let _ = reply.send(Err(odbc_error(role, "row buffer", sql, e)));
            return true;
        }
    };

    let mut block = match cursor.bind_buffer(&mut buffers) {
        Ok(block) => block,
        Err(e) => {
            let _ = reply.send(Err(odbc_error(role, "bind buffer", sql, e)));
            return true;
        }
    };

    let _ = reply.send(Ok(()));
    debug!("{} cursor open ({} columns)", role, kinds.len());

    serve_open_cursor(role, rx, || match block.fetch_with_truncation_check(true) {
        Ok(Some(batch)) => Ok((0..batch.num_rows())
            .map(|row_idx| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(col_idx, kind)| decode_cell(batch.at(col_idx, row_idx), *kind))
                    .collect()
            })
            .collect()),
        Ok(None) => Ok(Vec::new()),
        Err(e) => Err(fetch_error(role, sql, MAX_TEXT_CELL, e)),
    })
}

fn serve_open_cursor(
    role: &str,
    rx: &mut mpsc::UnboundedReceiver<Command>,
    mut fetch: impl FnMut() -> Result<RowBatch>,
) -> bool {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            Command::Fetch { reply } => {
                let _ = reply.send(fetch());
            }
            Command::CloseCursor => {
                debug!("{} cursor closed", role);
                return true;
            }
            Command::Shutdown => return false,
            other => other.reject(role, "a cursor is open on this connection"),
        }
    }
    false
}

fn column_kinds(cursor: &mut impl ResultSetMetadata) -> std::result::Result<Vec<ColumnKind>, odbc_api::Error> {
    let num_cols = cursor.num_result_cols()?;
    (1..=num_cols as u16)
        .map(|col| cursor.col_data_type(col).map(ColumnKind::from))
        .collect()
}
