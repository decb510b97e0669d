// ABOUTME: Event correlation bus for sync job notifications
// ABOUTME: Filters log/progress events by active job id and folds them into live state

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{LogEvent, LogLevel, ProgressEvent, SyncLogEntry, SyncProgress};

/// Live visible state of the active job: correlation id, ordered log,
/// merged progress. Shared between the consumer task and the orchestrator;
/// the lock is held only for single-field reads and writes.
#[derive(Debug, Default)]
struct FeedState {
    active_job: Option<String>,
    log: Vec<SyncLogEntry>,
    progress: SyncProgress,
}

#[derive(Debug, Clone, Default)]
pub struct JobFeed {
    state: Arc<Mutex<FeedState>>,
}

impl JobFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate the correlation id and reset the visible log and progress.
    /// Called exactly once per job, on the transition into Syncing or
    /// Comparing.
    pub fn activate(&self, job_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.active_job = Some(job_id.to_string());
        state.log.clear();
        state.progress = SyncProgress::default();
    }

    pub fn active_job(&self) -> Option<String> {
        self.state.lock().unwrap().active_job.clone()
    }

    /// Append a correlated log event. Mismatched job ids are discarded
    /// silently: delivery is not ordered against id rotation, and a prior
    /// job's trailing events must never corrupt a newer job's state.
    /// Blank messages are dropped; a missing level reads as info.
    pub fn apply_log(&self, event: LogEvent) {
        let mut state = self.state.lock().unwrap();
        if state.active_job.as_deref() != Some(event.job_id.as_str()) {
            log::debug!("Discarding log event for stale job {}", event.job_id);
            return;
        }

        let message = match event.message {
            Some(m) if !m.trim().is_empty() => m,
            _ => return,
        };

        state.log.push(SyncLogEntry {
            level: event.level.unwrap_or(LogLevel::Info),
            message,
            timestamp: event.ts.or_else(|| Some(Utc::now())),
        });
    }

    /// Merge a correlated progress event field-by-field, last write wins.
    pub fn apply_progress(&self, event: ProgressEvent) {
        let mut state = self.state.lock().unwrap();
        if state.active_job.as_deref() != Some(event.job_id.as_str()) {
            log::debug!("Discarding progress event for stale job {}", event.job_id);
            return;
        }
        let update = event.as_progress();
        state.progress.merge(&update);
    }

    /// Append a locally-generated entry, bypassing correlation. Used for
    /// transport failures during an active job and for terminal backfill.
    pub fn push_local(&self, level: LogLevel, message: String) {
        let mut state = self.state.lock().unwrap();
        state.log.push(SyncLogEntry {
            level,
            message,
            timestamp: Some(Utc::now()),
        });
    }

    pub fn log_snapshot(&self) -> Vec<SyncLogEntry> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn log_is_empty(&self) -> bool {
        self.state.lock().unwrap().log.is_empty()
    }

    pub fn progress_snapshot(&self) -> SyncProgress {
        self.state.lock().unwrap().progress.clone()
    }
}

/// Consumer task draining both notification channels for the lifetime of a
/// session. Decoupled from the request that triggered the job, so slow or
/// reordered delivery cannot block the orchestrator.
pub struct EventBus {
    handle: JoinHandle<()>,
}

impl EventBus {
    pub fn spawn(
        feed: JobFeed,
        mut log_rx: mpsc::Receiver<LogEvent>,
        mut progress_rx: mpsc::Receiver<ProgressEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = log_rx.recv() => match event {
                        Some(event) => feed.apply_log(event),
                        None => break,
                    },
                    event = progress_rx.recv() => match event {
                        Some(event) => feed.apply_progress(event),
                        None => break,
                    },
                }
            }
            log::info!("Notification channels closed; event bus stopping");
        });
        Self { handle }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
