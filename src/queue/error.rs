use thiserror::Error;

use super::job::JobId;

/// Errors surfaced by the caller-facing queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("queue is full ({limit} jobs waiting)")]
    QueueFull { limit: usize },
    #[error("queue worker is already running")]
    WorkerAlreadyRunning,
}
