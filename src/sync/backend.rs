// ABOUTME: Backend seam for the sync workflow
// ABOUTME: Trait over the query-execution API plus the push notification channels

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ConnectionConfig;
use crate::models::{
    AnalyzeData, AnalyzeRequest, DiffPreviewBundle, LogEvent, PreviewRequest, ProgressEvent,
    SyncRequest, SyncResult,
};
use crate::BackendResponse;

/// Bound on each notification channel; slow delivery must never block the
/// orchestrator's own control flow.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// The external execution API the sync core drives. Implementations wrap
/// whatever actually talks to the databases; this crate only owns the
/// orchestration on top.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Row-level diff for a set of tables. Emits progress notifications
    /// tagged with the request's job id while running.
    async fn analyze(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<BackendResponse<AnalyzeData>, BackendError>;

    /// Bounded sample of the differing rows for one table.
    async fn preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<BackendResponse<DiffPreviewBundle>, BackendError>;

    /// Execute a frozen sync request. Invoked once per job; all incremental
    /// visibility arrives on the notification channels, this call only
    /// resolves with the terminal result. Unlike analyze and preview the
    /// result carries its own success flag rather than a data envelope.
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResult, BackendError>;

    /// Enumerate the tables of a configured data source.
    async fn list_tables(
        &self,
        config: &ConnectionConfig,
    ) -> Result<BackendResponse<Vec<String>>, BackendError>;

    /// Best-effort total-row-count estimate for one table. Backends without
    /// a cheap estimate return Ok(None).
    async fn estimate_row_count(
        &self,
        _config: &ConnectionConfig,
        _table: &str,
    ) -> Result<Option<u64>, BackendError> {
        Ok(None)
    }
}

/// Sender half of the notification channels, handed to the backend at
/// wiring time. Fan-out, fire-and-forget: a full channel drops the event
/// rather than block the emitter.
#[derive(Clone)]
pub struct NotificationSender {
    log_tx: mpsc::Sender<LogEvent>,
    progress_tx: mpsc::Sender<ProgressEvent>,
}

impl NotificationSender {
    pub fn log(&self, event: LogEvent) {
        if self.log_tx.try_send(event).is_err() {
            log::warn!("log notification dropped: channel full or closed");
        }
    }

    pub fn progress(&self, event: ProgressEvent) {
        if self.progress_tx.try_send(event).is_err() {
            log::warn!("progress notification dropped: channel full or closed");
        }
    }
}

/// Build the paired notification channels for one session. The sender goes
/// to the backend, the receivers to the event bus.
pub fn notification_channels() -> (
    NotificationSender,
    mpsc::Receiver<LogEvent>,
    mpsc::Receiver<ProgressEvent>,
) {
    let (log_tx, log_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
    let (progress_tx, progress_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
    (
        NotificationSender {
            log_tx,
            progress_tx,
        },
        log_rx,
        progress_rx,
    )
}
