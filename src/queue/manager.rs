//! Caller-facing queue operations over the shared state

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::QueueError;
use super::job::JobId;
use super::processor::Processor;
use super::state::{ActivityEntry, QueueState};
use super::status::{self, GlobalStatus, QueueStats, StatusSnapshot};
use super::worker::{supervise, Worker, WorkerHandle};
use crate::config::queue_config::QueueSettings;

/// State shared between callers and the worker
pub(crate) struct Shared<P: Processor> {
    pub(crate) state: Mutex<QueueState<P::Payload, P::Output>>,
    pub(crate) notify: Notify,
    pub(crate) processor: P,
    pub(crate) settings: QueueSettings,
    pub(crate) running: AtomicBool,
    pub(crate) restarts: AtomicU64,
}

/// Worker liveness as seen from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub worker_running: bool,
    pub restarts: u64,
    pub in_flight: Option<JobId>,
    pub tracked_jobs: usize,
}

/// Owns the FIFO, the processing history, and the worker lifecycle
///
/// Cloning is cheap; all clones operate on the same queue.
pub struct QueueManager<P: Processor> {
    shared: Arc<Shared<P>>,
}

impl<P: Processor> Clone for QueueManager<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Processor> QueueManager<P> {
    /// Create a manager; the worker is not running until `start` is called
    pub fn new(settings: QueueSettings, processor: P) -> Self {
        let state = QueueState::new(settings.history_size, settings.activity_limit);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                notify: Notify::new(),
                processor,
                settings,
                running: AtomicBool::new(false),
                restarts: AtomicU64::new(0),
            }),
        }
    }

    /// Spawn the supervised worker loop
    pub fn start(&self) -> Result<WorkerHandle, QueueError> {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(QueueError::WorkerAlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        let join = tokio::spawn(supervise(Arc::clone(&self.shared), shutdown.clone()));
        info!("Queue worker spawned");
        Ok(WorkerHandle::new(shutdown, join))
    }

    /// A worker bound to this queue, for driving jobs one step at a time
    pub fn worker(&self) -> Worker<P> {
        Worker::new(Arc::clone(&self.shared))
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Enqueue a payload and return its id without waiting for processing
    pub async fn submit(&self, payload: P::Payload) -> Result<JobId, QueueError> {
        let id = {
            let mut state = self.shared.state.lock().await;
            if let Some(limit) = self.shared.settings.max_pending {
                if state.pending().len() >= limit {
                    warn!("Rejecting submission, {} jobs already waiting", limit);
                    return Err(QueueError::QueueFull { limit });
                }
            }
            state.enqueue(payload, Instant::now())
        };

        self.shared.notify.notify_one();
        info!("Submitted job {}", id);
        Ok(id)
    }

    pub async fn status(&self, id: JobId) -> Result<StatusSnapshot<P::Output>, QueueError> {
        let state = self.shared.state.lock().await;
        status::project(&state, id, self.shared.settings.default_duration)
            .ok_or(QueueError::NotFound(id))
    }

    /// Cancel a job that is still waiting
    ///
    /// Returns `Ok(false)` if the job already started or finished.
    pub async fn cancel(&self, id: JobId) -> Result<bool, QueueError> {
        let mut state = self.shared.state.lock().await;
        state.cancel(id, Instant::now())
    }

    pub async fn global_status(&self) -> GlobalStatus {
        let state = self.shared.state.lock().await;
        status::global_status(&state, self.shared.settings.default_duration)
    }

    /// Recently completed jobs, newest first
    pub async fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        let state = self.shared.state.lock().await;
        state.recent_activity(limit)
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.shared.state.lock().await;
        status::stats(
            &state,
            self.shared.settings.default_duration,
            Utc::now().date_naive(),
        )
    }

    /// Durations currently in the moving-average window, oldest first
    pub async fn processing_history(&self) -> Vec<Duration> {
        let state = self.shared.state.lock().await;
        state.history().iter().copied().collect()
    }

    pub async fn health(&self) -> Health {
        let state = self.shared.state.lock().await;
        Health {
            worker_running: self.shared.running.load(Ordering::SeqCst),
            restarts: self.shared.restarts.load(Ordering::SeqCst),
            in_flight: state.current(),
            tracked_jobs: state.job_count(),
        }
    }

    /// Drop terminal jobs older than the retention window
    pub async fn purge_expired(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        let purged = state.purge_expired(Instant::now(), self.shared.settings.retention);
        if purged > 0 {
            debug!("Purged {} expired jobs", purged);
        }
        purged
    }
}
