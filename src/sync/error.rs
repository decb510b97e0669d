// ABOUTME: Failure taxonomy for the sync workflow
// ABOUTME: Separates local validation from backend refusals and transport faults

use thiserror::Error;

use super::backend::BackendError;

/// Every way a sync-workflow operation can fail. Partial row failures are
/// not represented here: they surface only in the terminal result's counts
/// and log lines, and the job still completes.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Rejected locally before anything is sent to the backend
    #[error("{0}")]
    Validation(String),

    /// The backend answered with success = false
    #[error("Request failed: {0}")]
    Request(String),

    /// The call itself failed before a response arrived
    #[error("Transport failure: {0}")]
    Transport(#[from] BackendError),
}

impl SyncError {
    /// Message for operator-facing surfaces; request and transport failures
    /// read the same to the user.
    pub fn operator_message(&self) -> String {
        self.to_string()
    }
}
