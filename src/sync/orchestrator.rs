// ABOUTME: Sync job orchestrator and overwrite safety guard
// ABOUTME: Owns the configure/compare/review/sync state machine and job lifecycle

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::models::{
    ContentMode, DiffPreviewBundle, LogLevel, SyncMode, TableDiffSummary,
};
use crate::BackendResponse;

use super::backend::{notification_channels, NotificationSender, SyncBackend};
use super::diff::{DiffAnalyzer, DiffPreviewer};
use super::error::SyncError;
use super::events::{EventBus, JobFeed};
use super::job::{FrozenRequest, JobId, SyncReport};
use super::selection::SelectionModel;

/// Workflow phase. One compare and one sync may be in flight per session;
/// the phase checks below are what enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Configuring,
    Comparing,
    Reviewing,
    Syncing,
    Completed,
    Failed,
}

/// What the operator is asked before a destructive run starts
#[derive(Debug, Clone)]
pub struct OverwritePrompt {
    pub mode: SyncMode,
    pub tables: Vec<String>,
    pub consequence: String,
}

/// Human confirmation gate for destructive configurations. Must resolve
/// before a full-overwrite job is submitted; a refusal aborts the
/// transition with no job created.
#[async_trait]
pub trait OverwriteGuard: Send + Sync {
    async fn confirm(&self, prompt: &OverwritePrompt) -> bool;
}

/// Outcome of a start_sync call that was not itself an error
#[derive(Debug)]
pub enum SyncStart {
    /// The operator declined the overwrite confirmation; state unchanged
    Declined,
    /// The job ran to a terminal result
    Finished(SyncReport),
}

/// Owns one operator session's sync workflow: connection choices, the
/// current diff, the live selection, and the active job.
pub struct SyncOrchestrator {
    backend: Arc<dyn SyncBackend>,
    analyzer: DiffAnalyzer,
    previewer: DiffPreviewer,
    feed: JobFeed,
    bus: Option<EventBus>,

    phase: SyncPhase,
    source: Option<ConnectionConfig>,
    target: Option<ConnectionConfig>,
    tables: Vec<String>,
    content: ContentMode,
    mode: SyncMode,
    auto_add_columns: bool,

    diff: Vec<TableDiffSummary>,
    selection: SelectionModel,
    last_report: Option<SyncReport>,
}

impl SyncOrchestrator {
    pub fn new(backend: Arc<dyn SyncBackend>, feed: JobFeed) -> Self {
        Self {
            analyzer: DiffAnalyzer::new(backend.clone()),
            previewer: DiffPreviewer::new(backend.clone()),
            backend,
            feed,
            bus: None,
            phase: SyncPhase::Configuring,
            source: None,
            target: None,
            tables: Vec::new(),
            content: ContentMode::Data,
            mode: SyncMode::InsertUpdate,
            auto_add_columns: false,
            diff: Vec::new(),
            selection: SelectionModel::new(),
            last_report: None,
        }
    }

    /// Convenience wiring: build the notification channels, spawn the event
    /// bus on a fresh feed, and hand back the sender for the backend side.
    pub fn with_channels(backend: Arc<dyn SyncBackend>) -> (Self, NotificationSender) {
        let (sender, log_rx, progress_rx) = notification_channels();
        let feed = JobFeed::new();
        let bus = EventBus::spawn(feed.clone(), log_rx, progress_rx);
        let mut orchestrator = Self::new(backend, feed);
        orchestrator.bus = Some(bus);
        (orchestrator, sender)
    }

    /// Stop the owned event bus task, if any. Safe to call once the
    /// session is over; a running backend job is unaffected.
    pub fn shutdown(&mut self) {
        if let Some(bus) = self.bus.take() {
            bus.abort();
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn feed(&self) -> &JobFeed {
        &self.feed
    }

    pub fn diff(&self) -> &[TableDiffSummary] {
        &self.diff
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    /// Live selection mutators stay available while a job runs; the frozen
    /// snapshot is what executes, so edits cannot reach an in-flight job.
    pub fn selection_mut(&mut self) -> &mut SelectionModel {
        &mut self.selection
    }

    pub fn last_report(&self) -> Option<&SyncReport> {
        self.last_report.as_ref()
    }

    // -- configuration -------------------------------------------------

    pub fn set_source(&mut self, config: ConnectionConfig) {
        self.source = Some(config);
    }

    pub fn set_target(&mut self, config: ConnectionConfig) {
        self.target = Some(config);
    }

    pub fn set_tables(&mut self, tables: Vec<String>) {
        self.tables = tables;
    }

    pub fn set_content_mode(&mut self, content: ContentMode) {
        self.content = content;
    }

    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
    }

    pub fn set_auto_add_columns(&mut self, enabled: bool) {
        self.auto_add_columns = enabled;
    }

    /// Enumerate the source's tables for the configuring step.
    pub async fn load_tables(&self) -> Result<Vec<String>, SyncError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| SyncError::Validation("Select a source connection first".to_string()))?;
        let response = self.backend.list_tables(source).await?;
        unwrap_envelope(response, "Table listing")
    }

    // -- compare -------------------------------------------------------

    /// Run the diff analysis and load the result into the selection model.
    /// A failure surfaces its message and leaves any previous diff
    /// untouched; no job survives the call either way.
    pub async fn compare(&mut self) -> Result<&[TableDiffSummary], SyncError> {
        match self.phase {
            SyncPhase::Comparing => {
                return Err(SyncError::Validation(
                    "A comparison is already running".to_string(),
                ))
            }
            SyncPhase::Syncing => {
                return Err(SyncError::Validation(
                    "Cannot compare while a sync is running".to_string(),
                ))
            }
            _ => {}
        }

        let (source, target) = self.require_endpoints()?;
        if self.tables.is_empty() {
            return Err(SyncError::Validation(
                "Select at least one table to compare".to_string(),
            ));
        }

        let source = source.clone();
        let target = target.clone();
        let job_id = JobId::analyze();
        self.feed.activate(job_id.as_str());
        self.phase = SyncPhase::Comparing;

        let result = self
            .analyzer
            .analyze(
                &source,
                &target,
                &self.tables,
                self.content,
                self.auto_add_columns,
                job_id.as_str(),
            )
            .await;

        self.phase = SyncPhase::Reviewing;
        match result {
            Ok(summaries) => {
                log::info!(
                    "Comparison {} finished: {} table(s) analyzable",
                    job_id,
                    summaries.len()
                );
                self.selection.rebuild(&summaries);
                self.diff = summaries;
                Ok(&self.diff)
            }
            Err(e) => {
                log::warn!("Comparison {} failed: {}", job_id, e);
                Err(e)
            }
        }
    }

    /// Fetch the bounded row sample for one table of the current diff.
    pub async fn preview(&self, table: &str) -> Result<DiffPreviewBundle, SyncError> {
        let (source, target) = self.require_endpoints()?;
        self.previewer
            .preview(source, target, &self.tables, table)
            .await
    }

    // -- sync ----------------------------------------------------------

    /// Gate, freeze, and run one sync job to its terminal result.
    pub async fn start_sync(&mut self, guard: &dyn OverwriteGuard) -> Result<SyncStart, SyncError> {
        match self.phase {
            SyncPhase::Syncing => {
                return Err(SyncError::Validation(
                    "A sync is already running".to_string(),
                ))
            }
            SyncPhase::Reviewing => {}
            _ => {
                return Err(SyncError::Validation(
                    "Run a comparison before syncing".to_string(),
                ))
            }
        }

        let (source, target) = self.require_endpoints()?;
        let source = source.clone();
        let target = target.clone();

        if self.content != ContentMode::Schema && self.diff.is_empty() {
            return Err(SyncError::Validation(
                "Nothing to sync; compare first".to_string(),
            ));
        }

        let tables = self.tables_for_mode();
        if tables.is_empty() {
            return Err(SyncError::Validation(
                "No tables have changes selected to apply".to_string(),
            ));
        }

        if self.mode == SyncMode::FullOverwrite {
            let prompt = OverwritePrompt {
                mode: self.mode,
                tables: tables.clone(),
                consequence: format!(
                    "Full overwrite truncates {} target table(s) and reloads them from the \
                     source. Existing target rows are not recoverable.",
                    tables.len()
                ),
            };
            if !guard.confirm(&prompt).await {
                log::info!("Full overwrite declined by operator; no job created");
                return Ok(SyncStart::Declined);
            }
        }

        let mut table_options = self.selection.snapshot();
        table_options.retain(|table, _| tables.contains(table));

        let frozen = FrozenRequest {
            job_id: JobId::sync(),
            source_config: source,
            target_config: target,
            tables,
            content: self.content,
            mode: self.mode,
            auto_add_columns: self.auto_add_columns,
            table_options,
        };

        self.feed.activate(frozen.job_id.as_str());
        self.phase = SyncPhase::Syncing;
        log::info!(
            "Sync {} started: {} table(s), mode {:?}",
            frozen.job_id,
            frozen.tables.len(),
            frozen.mode
        );

        match self.backend.sync(&frozen.to_wire()).await {
            Ok(result) => {
                self.phase = if result.success {
                    SyncPhase::Completed
                } else {
                    SyncPhase::Failed
                };

                // Only when no correlated events arrived during execution:
                // reconstruct the visible log from the inline result lines.
                if self.feed.log_is_empty() && !result.logs.is_empty() {
                    for line in &result.logs {
                        self.feed.push_local(classify_log_line(line), line.clone());
                    }
                }

                log::info!(
                    "Sync {} finished: success={}, tables={:?}",
                    frozen.job_id,
                    result.success,
                    result.tables_synced
                );
                let report = SyncReport {
                    job_id: frozen.job_id,
                    result,
                };
                self.last_report = Some(report.clone());
                Ok(SyncStart::Finished(report))
            }
            Err(e) => {
                self.phase = SyncPhase::Failed;
                self.feed
                    .push_local(LogLevel::Error, format!("Sync request failed: {}", e));
                log::error!("Sync {} transport failure: {}", frozen.job_id, e);
                Err(SyncError::Transport(e))
            }
        }
    }

    /// Re-enter review to run another pass. Only a terminal job can be
    /// left behind.
    pub fn return_to_review(&mut self) -> Result<(), SyncError> {
        match self.phase {
            SyncPhase::Completed | SyncPhase::Failed => {
                self.phase = SyncPhase::Reviewing;
                Ok(())
            }
            _ => Err(SyncError::Validation(
                "No finished sync to dismiss".to_string(),
            )),
        }
    }

    /// The close action is refused while a job runs; there is no cancel
    /// path, and a backend-side write must not be orphaned.
    pub fn close(&self) -> Result<(), SyncError> {
        if self.phase == SyncPhase::Syncing {
            return Err(SyncError::Validation(
                "A sync is running; wait for it to finish".to_string(),
            ));
        }
        Ok(())
    }

    fn require_endpoints(&self) -> Result<(&ConnectionConfig, &ConnectionConfig), SyncError> {
        let source = self
            .source
            .as_ref()
            .filter(|c| !c.database.is_empty())
            .ok_or_else(|| SyncError::Validation("Select a source database".to_string()))?;
        let target = self
            .target
            .as_ref()
            .filter(|c| !c.database.is_empty())
            .ok_or_else(|| SyncError::Validation("Select a target database".to_string()))?;
        Ok((source, target))
    }

    /// Table scope for the frozen request. Diff-driven mode applies only
    /// tables with differing rows and at least one class enabled; the
    /// blind modes and schema-only syncs bypass the diff entirely.
    fn tables_for_mode(&self) -> Vec<String> {
        match (self.content, self.mode) {
            (ContentMode::Schema, _)
            | (_, SyncMode::InsertOnly)
            | (_, SyncMode::FullOverwrite) => self.tables.clone(),
            (_, SyncMode::InsertUpdate) => self
                .diff
                .iter()
                .filter(|s| s.has_changes())
                .filter(|s| {
                    self.selection
                        .get(&s.table)
                        .map(|sel| sel.any_enabled())
                        .unwrap_or(false)
                })
                .map(|s| s.table.clone())
                .collect(),
        }
    }
}

/// Best-effort severity for inline result lines; the live event path
/// carries an explicit level and wins whenever it produced anything.
fn classify_log_line(line: &str) -> LogLevel {
    let lowered = line.to_lowercase();
    if lowered.contains("fail") || lowered.contains("error") {
        LogLevel::Error
    } else if lowered.contains("skip") || lowered.contains("warn") {
        LogLevel::Warn
    } else {
        LogLevel::Info
    }
}

fn unwrap_envelope<T>(response: BackendResponse<T>, what: &str) -> Result<T, SyncError> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize, EngineKind, StoredConnection};
    use crate::models::{
        AnalyzeData, AnalyzeRequest, PreviewRequest, SyncRequest, SyncResult,
    };
    use crate::sync::backend::BackendError;
    use std::sync::Mutex;

    struct MockBackend {
        analyze_tables: Mutex<Vec<TableDiffSummary>>,
        sync_requests: Mutex<Vec<SyncRequest>>,
        sync_result: Mutex<Option<Result<SyncResult, BackendError>>>,
        // When set, sync() pushes a correlated live log event into this
        // feed before resolving, imitating mid-job notification delivery.
        live_feed: Mutex<Option<JobFeed>>,
    }

    impl MockBackend {
        fn new(analyze_tables: Vec<TableDiffSummary>) -> Arc<Self> {
            Arc::new(Self {
                analyze_tables: Mutex::new(analyze_tables),
                sync_requests: Mutex::new(Vec::new()),
                sync_result: Mutex::new(None),
                live_feed: Mutex::new(None),
            })
        }

        fn emit_live_into(&self, feed: JobFeed) {
            *self.live_feed.lock().unwrap() = Some(feed);
        }

        fn script_sync(&self, result: Result<SyncResult, BackendError>) {
            *self.sync_result.lock().unwrap() = Some(result);
        }

        fn sync_requests(&self) -> Vec<SyncRequest> {
            self.sync_requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncBackend for MockBackend {
        async fn analyze(
            &self,
            request: &AnalyzeRequest,
        ) -> Result<BackendResponse<AnalyzeData>, BackendError> {
            let scripted = self.analyze_tables.lock().unwrap().clone();
            // The backend may drop tables it cannot analyze
            let tables = scripted
                .into_iter()
                .filter(|s| request.tables.contains(&s.table))
                .collect();
            Ok(BackendResponse::success(AnalyzeData { tables }))
        }

        async fn preview(
            &self,
            _request: &PreviewRequest,
        ) -> Result<BackendResponse<DiffPreviewBundle>, BackendError> {
            unimplemented!()
        }

        async fn sync(&self, request: &SyncRequest) -> Result<SyncResult, BackendError> {
            self.sync_requests.lock().unwrap().push(request.clone());
            if let Some(feed) = self.live_feed.lock().unwrap().as_ref() {
                feed.apply_log(crate::models::LogEvent {
                    job_id: request.job_id.clone(),
                    level: Some(LogLevel::Info),
                    message: Some("live: copying orders".to_string()),
                    ts: None,
                });
            }
            self.sync_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| {
                    Ok(SyncResult {
                        success: true,
                        message: None,
                        logs: Vec::new(),
                        tables_synced: Some(request.tables.len() as u32),
                        rows_inserted: None,
                        rows_updated: None,
                    })
                })
        }

        async fn list_tables(
            &self,
            _config: &ConnectionConfig,
        ) -> Result<BackendResponse<Vec<String>>, BackendError> {
            Ok(BackendResponse::success(vec![
                "orders".to_string(),
                "users".to_string(),
            ]))
        }
    }

    struct Accept;
    struct Decline {
        prompts: Mutex<Vec<OverwritePrompt>>,
    }

    #[async_trait]
    impl OverwriteGuard for Accept {
        async fn confirm(&self, _prompt: &OverwritePrompt) -> bool {
            true
        }
    }

    #[async_trait]
    impl OverwriteGuard for Decline {
        async fn confirm(&self, prompt: &OverwritePrompt) -> bool {
            self.prompts.lock().unwrap().push(prompt.clone());
            false
        }
    }

    fn summary(table: &str, inserts: u64, updates: u64) -> TableDiffSummary {
        TableDiffSummary {
            table: table.to_string(),
            primary_key: Some("id".to_string()),
            can_sync: true,
            inserts,
            updates,
            deletes: 0,
            unchanged: 50,
            message: None,
        }
    }

    fn config(db: &str) -> ConnectionConfig {
        let stored = StoredConnection {
            name: db.to_string(),
            engine: EngineKind::MySql,
            host: "localhost".to_string(),
            port: None,
            username: "root".to_string(),
            password: None,
            database: Some(db.to_string()),
            ssh_tunnel: None,
        };
        normalize(&stored, None).unwrap()
    }

    fn configured(backend: Arc<MockBackend>, tables: &[&str]) -> SyncOrchestrator {
        let mut orchestrator = SyncOrchestrator::new(backend, JobFeed::new());
        orchestrator.set_source(config("app_prod"));
        orchestrator.set_target(config("app_stage"));
        orchestrator.set_tables(tables.iter().map(|t| t.to_string()).collect());
        orchestrator
    }

    #[tokio::test]
    async fn compare_requires_tables_and_endpoints() {
        let backend = MockBackend::new(vec![]);
        let mut orchestrator = SyncOrchestrator::new(backend.clone(), JobFeed::new());

        assert!(matches!(
            orchestrator.compare().await,
            Err(SyncError::Validation(_))
        ));
        assert_eq!(orchestrator.phase(), SyncPhase::Configuring);

        orchestrator.set_source(config("app_prod"));
        orchestrator.set_target(config("app_stage"));
        assert!(matches!(
            orchestrator.compare().await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn compare_loads_diff_and_selection_defaults() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend, &["orders", "missing"]);

        orchestrator.compare().await.unwrap();
        assert_eq!(orchestrator.phase(), SyncPhase::Reviewing);

        // The backend dropped "missing"; its absence means not analyzable
        assert_eq!(orchestrator.diff().len(), 1);
        assert!(orchestrator.selection().get("missing").is_none());
        let orders = orchestrator.selection().get("orders").unwrap();
        assert!(orders.insert && orders.update && !orders.delete);
    }

    #[tokio::test]
    async fn sync_without_diff_is_refused_without_a_job() {
        let backend = MockBackend::new(vec![]);
        let mut orchestrator = configured(backend.clone(), &["orders"]);
        orchestrator.compare().await.unwrap();
        assert!(orchestrator.diff().is_empty());

        let result = orchestrator.start_sync(&Accept).await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(orchestrator.phase(), SyncPhase::Reviewing);
        assert!(backend.sync_requests().is_empty());
        assert!(orchestrator.feed().active_job().unwrap().starts_with("analyze-"));
    }

    #[tokio::test]
    async fn declined_overwrite_leaves_review_untouched() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend.clone(), &["orders"]);
        orchestrator.compare().await.unwrap();
        orchestrator.set_sync_mode(SyncMode::FullOverwrite);

        let guard = Decline {
            prompts: Mutex::new(Vec::new()),
        };
        let outcome = orchestrator.start_sync(&guard).await.unwrap();

        assert!(matches!(outcome, SyncStart::Declined));
        assert_eq!(orchestrator.phase(), SyncPhase::Reviewing);
        assert!(backend.sync_requests().is_empty());

        let prompts = guard.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].mode, SyncMode::FullOverwrite);
        assert!(prompts[0].consequence.contains("truncates"));
    }

    #[tokio::test]
    async fn default_sync_requests_only_tables_with_changes() {
        // spec'd scenario: orders has diffs, users is clean
        let backend = MockBackend::new(vec![summary("orders", 5, 2), summary("users", 0, 0)]);
        let mut orchestrator = configured(backend.clone(), &["orders", "users"]);
        orchestrator.compare().await.unwrap();

        let outcome = orchestrator.start_sync(&Accept).await.unwrap();

        let requests = backend.sync_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tables, vec!["orders".to_string()]);
        let orders = requests[0].table_options.get("orders").unwrap();
        assert!(orders.insert && orders.update && !orders.delete);
        assert!(!requests[0].table_options.contains_key("users"));
        assert!(requests[0].job_id.starts_with("sync-"));

        match outcome {
            SyncStart::Finished(report) => {
                assert!(report.succeeded());
                assert_eq!(report.result.tables_synced, Some(1));
            }
            other => panic!("expected finished job, got {:?}", other),
        }
        assert_eq!(orchestrator.phase(), SyncPhase::Completed);
    }

    #[tokio::test]
    async fn each_sync_mints_a_fresh_job_id() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend.clone(), &["orders"]);
        orchestrator.compare().await.unwrap();

        orchestrator.start_sync(&Accept).await.unwrap();
        orchestrator.return_to_review().unwrap();
        orchestrator.start_sync(&Accept).await.unwrap();

        let requests = backend.sync_requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].job_id, requests[1].job_id);
    }

    #[tokio::test]
    async fn failed_result_backfills_log_with_classified_lines() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend.clone(), &["orders"]);
        orchestrator.compare().await.unwrap();

        backend.script_sync(Ok(SyncResult {
            success: false,
            message: Some("2 tables failed".to_string()),
            logs: vec![
                "orders: 5 rows inserted".to_string(),
                "orders: 1 row skipped".to_string(),
                "users: insert failed: duplicate key".to_string(),
            ],
            tables_synced: Some(0),
            rows_inserted: None,
            rows_updated: None,
        }));

        let outcome = orchestrator.start_sync(&Accept).await.unwrap();
        assert!(matches!(outcome, SyncStart::Finished(_)));
        assert_eq!(orchestrator.phase(), SyncPhase::Failed);

        let log = orchestrator.feed().log_snapshot();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].level, LogLevel::Info);
        assert_eq!(log[1].level, LogLevel::Warn);
        assert_eq!(log[2].level, LogLevel::Error);

        // Review can be re-entered after a terminal state, not before
        orchestrator.return_to_review().unwrap();
        assert_eq!(orchestrator.phase(), SyncPhase::Reviewing);
    }

    #[tokio::test]
    async fn inline_lines_backfill_only_when_no_live_events_arrived() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend.clone(), &["orders"]);
        orchestrator.compare().await.unwrap();

        backend.script_sync(Ok(SyncResult {
            success: true,
            message: None,
            logs: vec!["inline line".to_string()],
            tables_synced: Some(1),
            rows_inserted: Some(5),
            rows_updated: Some(2),
        }));

        // No live events: the inline result line is backfilled
        orchestrator.start_sync(&Accept).await.unwrap();
        let log = orchestrator.feed().log_snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "inline line");

        // A correlated event during execution suppresses backfill entirely
        orchestrator.return_to_review().unwrap();
        backend.emit_live_into(orchestrator.feed().clone());
        backend.script_sync(Ok(SyncResult {
            success: true,
            message: None,
            logs: vec!["inline line".to_string()],
            tables_synced: Some(1),
            rows_inserted: Some(5),
            rows_updated: Some(2),
        }));
        orchestrator.start_sync(&Accept).await.unwrap();

        let log = orchestrator.feed().log_snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "live: copying orders");
    }

    #[tokio::test]
    async fn transport_failure_fails_the_job_and_logs_error() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend.clone(), &["orders"]);
        orchestrator.compare().await.unwrap();

        backend.script_sync(Err(BackendError::ConnectionFailed(
            "target unreachable".to_string(),
        )));

        let result = orchestrator.start_sync(&Accept).await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
        assert_eq!(orchestrator.phase(), SyncPhase::Failed);

        let log = orchestrator.feed().log_snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].level, LogLevel::Error);
        assert!(log[0].message.contains("target unreachable"));
    }

    #[tokio::test]
    async fn rerunning_compare_resets_operator_edits() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend, &["orders"]);
        orchestrator.compare().await.unwrap();

        orchestrator.selection_mut().set_operation_enabled(
            "orders",
            crate::models::OperationClass::Delete,
            true,
        );
        assert!(orchestrator.selection().get("orders").unwrap().delete);

        orchestrator.compare().await.unwrap();
        assert!(!orchestrator.selection().get("orders").unwrap().delete);
    }

    #[tokio::test]
    async fn close_is_allowed_outside_syncing() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let mut orchestrator = configured(backend, &["orders"]);
        assert!(orchestrator.close().is_ok());

        orchestrator.compare().await.unwrap();
        orchestrator.start_sync(&Accept).await.unwrap();
        // Terminal states may close; only Syncing refuses, and the await
        // above only returns once the job is terminal.
        assert!(orchestrator.close().is_ok());
    }

    #[tokio::test]
    async fn load_tables_uses_the_source_connection() {
        let backend = MockBackend::new(vec![]);
        let mut orchestrator = SyncOrchestrator::new(backend, JobFeed::new());
        assert!(matches!(
            orchestrator.load_tables().await,
            Err(SyncError::Validation(_))
        ));

        orchestrator.set_source(config("app_prod"));
        let tables = orchestrator.load_tables().await.unwrap();
        assert_eq!(tables, vec!["orders".to_string(), "users".to_string()]);
    }

    #[tokio::test]
    async fn channel_wiring_streams_events_into_the_feed() {
        let backend = MockBackend::new(vec![summary("orders", 5, 2)]);
        let (mut orchestrator, sender) = SyncOrchestrator::with_channels(backend);
        orchestrator.set_source(config("app_prod"));
        orchestrator.set_target(config("app_stage"));
        orchestrator.set_tables(vec!["orders".to_string()]);
        orchestrator.compare().await.unwrap();

        let job_id = orchestrator.feed().active_job().unwrap();
        sender.log(crate::models::LogEvent {
            job_id: job_id.clone(),
            level: None,
            message: Some("comparing orders".to_string()),
            ts: None,
        });
        sender.progress(crate::models::ProgressEvent {
            job_id,
            percent: Some(40.0),
            current: Some(2),
            total: Some(5),
            table: Some("orders".to_string()),
            stage: Some("comparing".to_string()),
        });

        for _ in 0..50 {
            if !orchestrator.feed().log_is_empty()
                && orchestrator.feed().progress_snapshot().percent.is_some()
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_eq!(orchestrator.feed().log_snapshot()[0].message, "comparing orders");
        assert_eq!(orchestrator.feed().progress_snapshot().percent, Some(40.0));
        orchestrator.shutdown();
    }

    #[test]
    fn log_line_classification_markers() {
        assert_eq!(classify_log_line("orders: 5 rows inserted"), LogLevel::Info);
        assert_eq!(classify_log_line("3 rows SKIPPED"), LogLevel::Warn);
        assert_eq!(classify_log_line("warning: fallback"), LogLevel::Warn);
        assert_eq!(classify_log_line("insert FAILED"), LogLevel::Error);
        assert_eq!(classify_log_line("connection error"), LogLevel::Error);
    }
}
