// ABOUTME: Sync subsystem exports for SQL Magpie
// ABOUTME: Diff analysis, selection, event correlation, and job orchestration

pub mod backend;
pub mod diff;
pub mod error;
pub mod events;
pub mod job;
pub mod orchestrator;
pub mod selection;

pub use backend::{notification_channels, BackendError, NotificationSender, SyncBackend};
pub use diff::{DiffAnalyzer, DiffPreviewer};
pub use error::SyncError;
pub use events::{EventBus, JobFeed};
pub use job::{FrozenRequest, JobId, SyncReport};
pub use orchestrator::{OverwriteGuard, OverwritePrompt, SyncOrchestrator, SyncPhase, SyncStart};
pub use selection::SelectionModel;
