// ABOUTME: Diff analyzer and preview clients
// ABOUTME: Thin request builders over the backend with local validation

use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::models::{
    AnalyzeRequest, ContentMode, DiffPreviewBundle, PreviewRequest, SyncMode, TableDiffSummary,
    PREVIEW_ROW_LIMIT,
};
use crate::BackendResponse;

use super::backend::SyncBackend;
use super::error::SyncError;

/// Unwrap a backend envelope into its payload or a request failure.
fn into_data<T>(response: BackendResponse<T>, what: &str) -> Result<T, SyncError> {
    if !response.success {
        return Err(SyncError::Request(
            response
                .message
                .unwrap_or_else(|| format!("{} failed", what)),
        ));
    }
    response
        .data
        .ok_or_else(|| SyncError::Request(format!("{} returned no data", what)))
}

/// Issues analyze requests and interprets the per-table results
pub struct DiffAnalyzer {
    backend: Arc<dyn SyncBackend>,
}

impl DiffAnalyzer {
    pub fn new(backend: Arc<dyn SyncBackend>) -> Self {
        Self { backend }
    }

    /// Compute the per-table diff. The returned list may omit tables the
    /// backend dropped (unsupported engines etc.); absence means "not
    /// analyzable", not an error. Schema-only syncs have no row diff and
    /// short-circuit to an empty list.
    pub async fn analyze(
        &self,
        source_config: &ConnectionConfig,
        target_config: &ConnectionConfig,
        tables: &[String],
        content: ContentMode,
        auto_add_columns: bool,
        job_id: &str,
    ) -> Result<Vec<TableDiffSummary>, SyncError> {
        if tables.is_empty() {
            return Err(SyncError::Validation(
                "No tables selected for comparison".to_string(),
            ));
        }
        if content == ContentMode::Schema {
            return Ok(Vec::new());
        }

        let request = AnalyzeRequest {
            source_config: source_config.clone(),
            target_config: target_config.clone(),
            tables: tables.to_vec(),
            content,
            mode: SyncMode::InsertUpdate,
            auto_add_columns,
            job_id: job_id.to_string(),
        };

        log::info!(
            "Analyzing {} table(s) for job {}",
            request.tables.len(),
            request.job_id
        );
        let response = self.backend.analyze(&request).await?;
        let data = into_data(response, "Analyze")?;
        Ok(data.tables)
    }

    /// Best-effort row total for one table. Never surfaces a failure; an
    /// unavailable count degrades to an unknown total.
    pub async fn row_total(&self, config: &ConnectionConfig, table: &str) -> Option<u64> {
        match self.backend.estimate_row_count(config, table).await {
            Ok(count) => count,
            Err(e) => {
                log::warn!("Row count estimate for '{}' unavailable: {}", table, e);
                None
            }
        }
    }
}

/// Fetches bounded row samples so the operator can inspect a diff before
/// committing a row-level selection
pub struct DiffPreviewer {
    backend: Arc<dyn SyncBackend>,
}

impl DiffPreviewer {
    pub fn new(backend: Arc<dyn SyncBackend>) -> Self {
        Self { backend }
    }

    /// Sample up to 200 rows per class for one table. The full analyze
    /// table list rides along so the backend scopes the diff identically.
    pub async fn preview(
        &self,
        source_config: &ConnectionConfig,
        target_config: &ConnectionConfig,
        tables: &[String],
        table: &str,
    ) -> Result<DiffPreviewBundle, SyncError> {
        if !tables.iter().any(|t| t == table) {
            return Err(SyncError::Validation(format!(
                "Table '{}' is not part of the current comparison",
                table
            )));
        }

        let request = PreviewRequest {
            source_config: source_config.clone(),
            target_config: target_config.clone(),
            tables: tables.to_vec(),
            content: ContentMode::Data,
            mode: SyncMode::InsertUpdate,
            auto_add_columns: false,
            table: table.to_string(),
            limit: PREVIEW_ROW_LIMIT,
        };

        let response = self.backend.preview(&request).await?;
        into_data(response, "Preview")
    }
}
