// ABOUTME: Job identifiers and frozen sync requests
// ABOUTME: Ids are unique per run; frozen requests never see later edits

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::models::{ContentMode, SyncMode, SyncRequest, SyncResult, TableOperationSelection};

/// Correlation identifier for one analyze or sync run. The
/// "{prefix}-{epoch-millis}-{6-hex}" shape is a readability convention;
/// uniqueness is the only contract, and the random suffix carries it even
/// for two jobs minted in the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(String);

impl JobId {
    pub fn mint(prefix: &str) -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}-{}",
            prefix,
            Utc::now().timestamp_millis(),
            &hex[..6]
        ))
    }

    pub fn analyze() -> Self {
        Self::mint("analyze")
    }

    pub fn sync() -> Self {
        Self::mint("sync")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The request exactly as submitted: configs, scope, modes, and the
/// selection snapshot are all deep copies taken at Syncing entry, so
/// concurrent edits to the live session cannot reach the running job.
#[derive(Debug, Clone)]
pub struct FrozenRequest {
    pub job_id: JobId,
    pub source_config: ConnectionConfig,
    pub target_config: ConnectionConfig,
    pub tables: Vec<String>,
    pub content: ContentMode,
    pub mode: SyncMode,
    pub auto_add_columns: bool,
    pub table_options: HashMap<String, TableOperationSelection>,
}

impl FrozenRequest {
    pub fn to_wire(&self) -> SyncRequest {
        SyncRequest {
            source_config: self.source_config.clone(),
            target_config: self.target_config.clone(),
            tables: self.tables.clone(),
            content: self.content,
            mode: self.mode,
            auto_add_columns: self.auto_add_columns,
            table_options: self.table_options.clone(),
            job_id: self.job_id.as_str().to_string(),
        }
    }
}

/// Terminal record of one sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub job_id: JobId,
    pub result: SyncResult,
}

impl SyncReport {
    pub fn succeeded(&self) -> bool {
        self.result.success
    }
}
