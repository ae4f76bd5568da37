//! In-memory collaborators for driving the orchestrator end to end.

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_extract::lifecycle::{LifecycleAck, LifecycleClient, ResultCode, RowCounts};
use catalog_extract::{
    CatalogStore, Config, ExtractError, Notifier, Result, RowBatch, RowFetcher, RowRecord,
    RunContext, RunNotification, SourceConnection, SqlValue, TableExtractSpec, TargetConnection,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const BASE_YAML: &str = r#"
control:
  dsn: ETL Control
source:
  dsn: QuickBooks Data
target:
  server: dwhost
  database: PXLTD_CEDW
notification:
  success: [ops@example.com]
  failure: [oncall@example.com]
extract:
  source_db_tag: QB_CEDW
  fetch_size: 3000
"#;

/// Base configuration with extra YAML appended under `extract:`.
pub fn config_with(extract_extra: &str, tables: &str) -> Config {
    let mut yaml = BASE_YAML.to_string();
    for line in extract_extra.lines().filter(|l| !l.trim().is_empty()) {
        yaml.push_str("  ");
        yaml.push_str(line.trim());
        yaml.push('\n');
    }
    if !tables.trim().is_empty() {
        yaml.push_str("tables:\n");
        yaml.push_str(tables);
    }
    Config::from_yaml(&yaml).unwrap()
}

pub fn config() -> Config {
    config_with("", "")
}

/// Ordered record of every call made against the fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

// ===== Catalog =====

pub struct FakeCatalog {
    pub specs: Vec<TableExtractSpec>,
    pub fail: bool,
    journal: Journal,
}

#[async_trait]
impl CatalogStore for FakeCatalog {
    async fn load_catalog(&self, source_db_tag: &str) -> Result<Vec<TableExtractSpec>> {
        self.journal.push(format!("catalog:load {}", source_db_tag));
        if self.fail {
            return Err(ExtractError::Catalog("control database unavailable".into()));
        }
        Ok(self
            .specs
            .iter()
            .filter(|s| s.active && s.source_db_tag == source_db_tag)
            .cloned()
            .collect())
    }

    async fn close(&self) {
        self.journal.push("close:catalog");
    }
}

// ===== Source =====

#[derive(Clone, Default)]
pub struct TableData {
    pub rows: usize,
    /// Fail the nth fetch (1-based).
    pub fail_on_fetch: Option<usize>,
    /// Return rows of this width instead of the SELECT's.
    pub width_override: Option<usize>,
}

pub struct FakeSource {
    tables: HashMap<String, TableData>,
    cancel_on_first_fetch: Option<CancellationToken>,
    journal: Journal,
}

fn parse_select(select: &str) -> (String, usize) {
    let (head, table) = select
        .rsplit_once(" FROM ")
        .expect("generated SELECT has a FROM clause");
    let cols = head.trim_start_matches("SELECT ");
    (table.to_string(), cols.matches(',').count() + 1)
}

fn make_row(index: usize, width: usize) -> RowRecord {
    (0..width)
        .map(|col| match col {
            0 => SqlValue::I64(index as i64),
            1 => SqlValue::DateTime(
                NaiveDate::from_ymd_opt(2020, 2, 28)
                    .unwrap()
                    .and_hms_opt(13, 45, 7)
                    .unwrap(),
            ),
            _ if index % 10 == 0 => SqlValue::Null,
            _ => SqlValue::Text(format!("r{}c{}", index, col)),
        })
        .collect()
}

#[async_trait]
impl SourceConnection for FakeSource {
    async fn open_cursor(&self, select: &str, fetch_size: usize) -> Result<Box<dyn RowFetcher>> {
        let (table, width) = parse_select(select);
        self.journal.push(format!("source:open {}", table));
        self.journal.push(format!("source:select {}", select));
        let data = self.tables.get(&table).cloned().unwrap_or_default();
        Ok(Box::new(FakeFetcher {
            width: data.width_override.unwrap_or(width),
            table,
            data,
            fetch_size,
            next_row: 0,
            fetches: 0,
            cancel: self.cancel_on_first_fetch.clone(),
            journal: self.journal.clone(),
        }))
    }

    async fn close(&self) {
        self.journal.push("close:source");
    }
}

struct FakeFetcher {
    table: String,
    data: TableData,
    width: usize,
    fetch_size: usize,
    next_row: usize,
    fetches: usize,
    cancel: Option<CancellationToken>,
    journal: Journal,
}

#[async_trait]
impl RowFetcher for FakeFetcher {
    async fn fetch(&mut self) -> Result<RowBatch> {
        self.fetches += 1;
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        if self.data.fail_on_fetch == Some(self.fetches) {
            self.journal.push(format!("source:fetch-error {}", self.table));
            return Err(ExtractError::connection("source", "communication link failure"));
        }
        let end = (self.next_row + self.fetch_size).min(self.data.rows);
        let batch: RowBatch = (self.next_row..end)
            .map(|i| make_row(i, self.width))
            .collect();
        self.next_row = end;
        self.journal
            .push(format!("source:fetch {} {}", self.table, batch.len()));
        Ok(batch)
    }

    async fn close(&mut self) {
        self.journal.push(format!("source:close {}", self.table));
    }
}

// ===== Target =====

pub struct RecordingTarget {
    fail_insert_for: Option<String>,
    fail_exec: Option<String>,
    journal: Journal,
    pub rows: Mutex<Vec<RowRecord>>,
}

impl RecordingTarget {
    fn check_insert(&self, insert: &str) -> Result<()> {
        match &self.fail_insert_for {
            Some(t) if insert.contains(&format!(".[{}]", t)) => {
                Err(ExtractError::connection("target", "string or binary data would be truncated"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TargetConnection for RecordingTarget {
    async fn truncate(&self, table_ref: &str) -> Result<()> {
        self.journal.push(format!("target:truncate {}", table_ref));
        Ok(())
    }

    async fn insert_many(&self, insert: &str, rows: &[RowRecord]) -> Result<u64> {
        self.check_insert(insert)?;
        self.journal.push(format!("target:insert_many {}", rows.len()));
        self.journal.push(format!("target:sql {}", insert));
        self.rows.lock().unwrap().extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn insert_one(&self, insert: &str, row: &RowRecord) -> Result<u64> {
        self.check_insert(insert)?;
        self.journal.push("target:insert_one");
        self.journal.push(format!("target:sql {}", insert));
        self.rows.lock().unwrap().push(row.clone());
        Ok(1)
    }

    async fn exec_statement(&self, sql: &str) -> Result<()> {
        self.journal.push(format!("target:exec {}", sql));
        match &self.fail_exec {
            Some(s) if s == sql => Err(ExtractError::connection("target", "procedure failed")),
            _ => Ok(()),
        }
    }

    async fn close(&self) {
        self.journal.push("close:target");
    }
}

// ===== Lifecycle =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCall {
    Start(String),
    End(String, ResultCode, RowCounts),
}

pub struct RecordingLifecycle {
    pub calls: Mutex<Vec<LifecycleCall>>,
    reject: bool,
    journal: Journal,
}

impl RecordingLifecycle {
    pub fn calls(&self) -> Vec<LifecycleCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LifecycleCall::Start(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn ends(&self) -> Vec<(String, ResultCode, RowCounts)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LifecycleCall::End(s, code, counts) => Some((s, code, counts)),
                _ => None,
            })
            .collect()
    }

    fn ack(&self) -> LifecycleAck {
        if self.reject {
            LifecycleAck {
                status: "Fail".into(),
                result: serde_json::json!("unknown step"),
            }
        } else {
            LifecycleAck::ok()
        }
    }
}

#[async_trait]
impl LifecycleClient for RecordingLifecycle {
    async fn start(&self, step_name: &str) -> Result<LifecycleAck> {
        self.journal.push(format!("lifecycle:start {}", step_name));
        self.calls
            .lock()
            .unwrap()
            .push(LifecycleCall::Start(step_name.to_string()));
        Ok(self.ack())
    }

    async fn end(&self, step_name: &str, code: ResultCode, counts: RowCounts) -> Result<LifecycleAck> {
        self.journal.push(format!("lifecycle:end {} {}", step_name, code));
        self.calls
            .lock()
            .unwrap()
            .push(LifecycleCall::End(step_name.to_string(), code, counts));
        Ok(self.ack())
    }
}

// ===== Notifier =====

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<RunNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<RunNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &RunNotification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ===== Harness =====

/// Builder for a run wired to the fakes above.
#[derive(Default)]
pub struct Scenario {
    specs: Vec<TableExtractSpec>,
    data: HashMap<String, TableData>,
    catalog_fails: bool,
    fail_insert_for: Option<String>,
    fail_exec: Option<String>,
    reject_lifecycle: bool,
    cancel_on_first_fetch: Option<CancellationToken>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &str, rows: usize) -> Self {
        self.specs.push(TableExtractSpec::new(name, columns, "QB_CEDW"));
        self.data.insert(
            name.to_string(),
            TableData {
                rows,
                ..TableData::default()
            },
        );
        self
    }

    pub fn spec(mut self, spec: TableExtractSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn fail_fetch(mut self, table: &str, fetch: usize) -> Self {
        self.data.entry(table.to_string()).or_default().fail_on_fetch = Some(fetch);
        self
    }

    pub fn row_width(mut self, table: &str, width: usize) -> Self {
        self.data.entry(table.to_string()).or_default().width_override = Some(width);
        self
    }

    pub fn fail_catalog(mut self) -> Self {
        self.catalog_fails = true;
        self
    }

    pub fn fail_insert(mut self, table: &str) -> Self {
        self.fail_insert_for = Some(table.to_string());
        self
    }

    pub fn fail_exec(mut self, sql: &str) -> Self {
        self.fail_exec = Some(sql.to_string());
        self
    }

    pub fn reject_lifecycle(mut self) -> Self {
        self.reject_lifecycle = true;
        self
    }

    pub fn cancel_on_first_fetch(mut self, token: CancellationToken) -> Self {
        self.cancel_on_first_fetch = Some(token);
        self
    }

    pub fn build(self) -> Harness {
        let journal = Journal::default();
        let catalog = Arc::new(FakeCatalog {
            specs: self.specs,
            fail: self.catalog_fails,
            journal: journal.clone(),
        });
        let source = Arc::new(FakeSource {
            tables: self.data,
            cancel_on_first_fetch: self.cancel_on_first_fetch,
            journal: journal.clone(),
        });
        let target = Arc::new(RecordingTarget {
            fail_insert_for: self.fail_insert_for,
            fail_exec: self.fail_exec,
            journal: journal.clone(),
            rows: Mutex::new(Vec::new()),
        });
        let lifecycle = Arc::new(RecordingLifecycle {
            calls: Mutex::new(Vec::new()),
            reject: self.reject_lifecycle,
            journal: journal.clone(),
        });
        let notifier = Arc::new(RecordingNotifier::default());

        Harness {
            journal,
            catalog,
            source,
            target,
            lifecycle,
            notifier,
        }
    }
}

pub struct Harness {
    pub journal: Journal,
    pub catalog: Arc<FakeCatalog>,
    pub source: Arc<FakeSource>,
    pub target: Arc<RecordingTarget>,
    pub lifecycle: Arc<RecordingLifecycle>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn context(&self) -> RunContext {
        RunContext::new(
            self.catalog.clone(),
            self.source.clone(),
            self.target.clone(),
            self.lifecycle.clone(),
            self.notifier.clone(),
        )
    }

    pub fn assert_all_closed(&self) {
        for role in ["close:catalog", "close:source", "close:target"] {
            assert_eq!(self.journal.count(role), 1, "{} closed once", role);
        }
    }
}
