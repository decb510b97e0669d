// ABOUTME: Shared data models for SQL Magpie
// ABOUTME: Diff summaries, previews, selections, and the sync wire contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ConnectionConfig;

/// Preview sampling cap per diff class; the backend silently caps at this
/// figure rather than erroring when more rows differ.
pub const PREVIEW_ROW_LIMIT: u32 = 200;

/// What gets compared and applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    Data,
    Schema,
    Both,
}

/// How rows are written to the target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    InsertUpdate,
    InsertOnly,
    FullOverwrite,
}

/// One table's row-level difference, produced by an analyze run.
/// Immutable; the next analyze run supersedes the whole list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDiffSummary {
    pub table: String,
    #[serde(rename = "primaryKey", default)]
    pub primary_key: Option<String>,
    #[serde(rename = "canSync", default)]
    pub can_sync: bool,
    #[serde(default)]
    pub inserts: u64,
    #[serde(default)]
    pub updates: u64,
    #[serde(default)]
    pub deletes: u64,
    #[serde(default)]
    pub unchanged: u64,
    #[serde(default)]
    pub message: Option<String>,
}

impl TableDiffSummary {
    pub fn has_changes(&self) -> bool {
        self.inserts > 0 || self.updates > 0 || self.deletes > 0
    }
}

/// A database row keyed by column name
pub type Row = BTreeMap<String, serde_json::Value>;

/// An update sample carrying both sides plus the columns that differ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedRow {
    #[serde(rename = "changedColumns")]
    pub changed_columns: Vec<String>,
    pub source: Row,
    pub target: Row,
}

/// Bounded sample of the actual differing rows for one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffPreviewBundle {
    pub table: String,
    #[serde(rename = "primaryKey", default)]
    pub primary_key: Option<String>,
    #[serde(rename = "insertTotal", default)]
    pub insert_total: u64,
    #[serde(rename = "updateTotal", default)]
    pub update_total: u64,
    #[serde(rename = "deleteTotal", default)]
    pub delete_total: u64,
    #[serde(default)]
    pub inserts: Vec<Row>,
    #[serde(default)]
    pub updates: Vec<UpdatedRow>,
    #[serde(default)]
    pub deletes: Vec<Row>,
}

/// Diff class a selection or preview row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Insert,
    Update,
    Delete,
}

/// Per-table apply choices. A false flag suppresses the class entirely;
/// a true flag with an empty key set applies every differing row in the
/// class; a non-empty key set restricts to those primary keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableOperationSelection {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
    #[serde(rename = "insertKeys", default)]
    pub insert_keys: BTreeSet<String>,
    #[serde(rename = "updateKeys", default)]
    pub update_keys: BTreeSet<String>,
    #[serde(rename = "deleteKeys", default)]
    pub delete_keys: BTreeSet<String>,
}

impl TableOperationSelection {
    /// Defaults derived from an analyze result: inserts and updates follow
    /// eligibility, deletes are always off.
    pub fn from_summary(summary: &TableDiffSummary) -> Self {
        Self {
            insert: summary.can_sync,
            update: summary.can_sync,
            delete: false,
            insert_keys: BTreeSet::new(),
            update_keys: BTreeSet::new(),
            delete_keys: BTreeSet::new(),
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.insert || self.update || self.delete
    }

    /// Whether one differing row is covered by this selection. A disabled
    /// class covers nothing regardless of keys; an enabled class with an
    /// empty key set covers every row of the class.
    pub fn applies_to(&self, class: OperationClass, key: &str) -> bool {
        let (enabled, keys) = match class {
            OperationClass::Insert => (self.insert, &self.insert_keys),
            OperationClass::Update => (self.update, &self.update_keys),
            OperationClass::Delete => (self.delete, &self.delete_keys),
        };
        enabled && (keys.is_empty() || keys.contains(key))
    }
}

/// Log severity for sync job entries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of a job's ordered log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Live progress for a running job. Each field is independently optional
/// on the wire; the receiver merges field-by-field, last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SyncProgress {
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

impl SyncProgress {
    /// Fold an update onto the prior value; unspecified fields keep their
    /// previous value, never reset.
    pub fn merge(&mut self, update: &SyncProgress) {
        if update.percent.is_some() {
            self.percent = update.percent;
        }
        if update.current.is_some() {
            self.current = update.current;
        }
        if update.total.is_some() {
            self.total = update.total;
        }
        if update.table.is_some() {
            self.table = update.table.clone();
        }
        if update.stage.is_some() {
            self.stage = update.stage.clone();
        }
    }
}

/// Analyze call payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "sourceConfig")]
    pub source_config: ConnectionConfig,
    #[serde(rename = "targetConfig")]
    pub target_config: ConnectionConfig,
    pub tables: Vec<String>,
    pub content: ContentMode,
    pub mode: SyncMode,
    #[serde(rename = "autoAddColumns")]
    pub auto_add_columns: bool,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Analyze call result payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeData {
    #[serde(default)]
    pub tables: Vec<TableDiffSummary>,
}

/// Preview call payload; `tables` carries the same scope as the analyze
/// run so the backend diffs identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    #[serde(rename = "sourceConfig")]
    pub source_config: ConnectionConfig,
    #[serde(rename = "targetConfig")]
    pub target_config: ConnectionConfig,
    pub tables: Vec<String>,
    pub content: ContentMode,
    pub mode: SyncMode,
    #[serde(rename = "autoAddColumns")]
    pub auto_add_columns: bool,
    pub table: String,
    pub limit: u32,
}

/// Sync execution payload, frozen at submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(rename = "sourceConfig")]
    pub source_config: ConnectionConfig,
    #[serde(rename = "targetConfig")]
    pub target_config: ConnectionConfig,
    pub tables: Vec<String>,
    pub content: ContentMode,
    pub mode: SyncMode,
    #[serde(rename = "autoAddColumns")]
    pub auto_add_columns: bool,
    #[serde(rename = "tableOptions")]
    pub table_options: HashMap<String, TableOperationSelection>,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Terminal result of one sync execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(rename = "tablesSynced", default)]
    pub tables_synced: Option<u32>,
    #[serde(rename = "rowsInserted", default)]
    pub rows_inserted: Option<u64>,
    #[serde(rename = "rowsUpdated", default)]
    pub rows_updated: Option<u64>,
}

/// Entry on the "log" notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
}

/// Entry on the "progress" notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

impl ProgressEvent {
    pub fn as_progress(&self) -> SyncProgress {
        SyncProgress {
            percent: self.percent,
            current: self.current,
            total: self.total,
            table: self.table.clone(),
            stage: self.stage.clone(),
        }
    }
}
