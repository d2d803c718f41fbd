//! The single worker that drains the queue
//!
//! Exactly one job is handed to the processor at a time. The state lock is
//! taken to pick a job and to record its outcome, never across the call.

use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::{JobId, JobOutcome};
use super::manager::Shared;
use super::processor::Processor;

/// Drives jobs through the processor, one at a time
pub struct Worker<P: Processor> {
    shared: Arc<Shared<P>>,
}

impl<P: Processor> Worker<P> {
    pub(crate) fn new(shared: Arc<Shared<P>>) -> Self {
        Self { shared }
    }

    /// Process the oldest waiting job, if there is one
    ///
    /// Returns the id of the job that was processed. A processor error or
    /// panic marks that job failed and nothing else. The outcome is recorded
    /// by a spawned task, so dropping this future mid-call leaves the job to
    /// finish on its own.
    pub async fn step(&self) -> Option<JobId> {
        let (id, payload) = {
            let mut state = self.shared.state.lock().await;
            state.begin_next(Instant::now())?
        };
        info!("Processing job {}", id);

        let shared = Arc::clone(&self.shared);
        let job = tokio::spawn(async move {
            let outcome = call_processor(&shared, id, payload).await;
            record_outcome(&shared, id, outcome).await;
        });

        if let Err(e) = job.await {
            error!("Recording outcome of job {} failed: {}", id, e);
            let mut state = self.shared.state.lock().await;
            state.abandon_current("job bookkeeping failed", Instant::now());
        }

        Some(id)
    }

    /// Run until `shutdown` fires, sleeping while the queue is empty
    ///
    /// A job that is already processing is allowed to finish first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Queue worker started");
        let settings = &self.shared.settings;

        while !shutdown.is_cancelled() {
            if self.step().await.is_some() {
                if !settings.cooldown.is_zero() {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(settings.cooldown) => {}
                    }
                }
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.shared.notify.notified() => {}
                _ = tokio::time::sleep(settings.sweep_interval) => {
                    let mut state = self.shared.state.lock().await;
                    let purged = state.purge_expired(Instant::now(), settings.retention);
                    if purged > 0 {
                        debug!("Idle sweep purged {} expired jobs", purged);
                    }
                }
            }
        }

        info!("Queue worker stopped");
    }
}

async fn call_processor<P: Processor>(
    shared: &Arc<Shared<P>>,
    id: JobId,
    payload: P::Payload,
) -> JobOutcome<P::Output> {
    let inner = Arc::clone(shared);
    match tokio::spawn(async move { inner.processor.process(payload).await }).await {
        Ok(Ok(output)) => JobOutcome::Completed(output),
        Ok(Err(e)) => {
            warn!("Job {} failed: {:#}", id, e);
            JobOutcome::Failed(format!("{:#}", e))
        }
        Err(e) if e.is_panic() => {
            error!("Processor panicked on job {}", id);
            JobOutcome::Failed("processor panicked".to_string())
        }
        Err(e) => {
            error!("Processor task for job {} was cancelled: {}", id, e);
            JobOutcome::Failed("processor task cancelled".to_string())
        }
    }
}

async fn record_outcome<P: Processor>(
    shared: &Shared<P>,
    id: JobId,
    outcome: JobOutcome<P::Output>,
) {
    let mut state = shared.state.lock().await;
    let now = Instant::now();
    let succeeded = outcome.is_success();
    state.finish(id, outcome, now);
    if succeeded {
        info!("Completed job {} ({} waiting)", id, state.pending().len());
    }
    let purged = state.purge_expired(now, shared.settings.retention);
    if purged > 0 {
        debug!("Purged {} expired jobs", purged);
    }
    // A worker may have polled while this job held the slot
    if !state.pending().is_empty() {
        shared.notify.notify_one();
    }
}

/// Keep a worker loop alive until shutdown
///
/// If the loop dies unexpectedly the in-flight job is failed, the restart is
/// counted, and a fresh loop takes over.
pub(crate) async fn supervise<P: Processor>(shared: Arc<Shared<P>>, shutdown: CancellationToken) {
    loop {
        let worker = Worker::new(Arc::clone(&shared));
        let token = shutdown.clone();
        match tokio::spawn(async move { worker.run(token).await }).await {
            Ok(()) => break,
            Err(e) if shutdown.is_cancelled() => {
                warn!("Queue worker ended during shutdown: {}", e);
                break;
            }
            Err(e) => {
                let restarts = shared.restarts.fetch_add(1, Ordering::SeqCst) + 1;
                error!("Queue worker died ({}), restart #{}", e, restarts);
                let mut state = shared.state.lock().await;
                if let Some(id) = state.abandon_current("worker restarted", Instant::now()) {
                    warn!("Job {} failed by worker restart", id);
                }
            }
        }
    }
    shared.running.store(false, Ordering::SeqCst);
}

/// Handle to the spawned, supervised worker
pub struct WorkerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn new(shutdown: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { shutdown, join }
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop accepting new work and wait for the in-flight job to finish
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.join.await.context("Queue worker task failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::queue_config::QueueSettings;
    use crate::queue::job::{JobOutcome, JobState};
    use crate::queue::manager::QueueManager;
    use crate::queue::processor::Processor;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Panicky;

    #[async_trait]
    impl Processor for Panicky {
        type Payload = bool;
        type Output = &'static str;

        async fn process(&self, explode: bool) -> Result<&'static str> {
            if explode {
                panic!("collaborator blew up");
            }
            Ok("fine")
        }
    }

    #[tokio::test]
    async fn test_panic_fails_only_that_job() {
        let manager = QueueManager::new(QueueSettings::default(), Panicky);
        let bad = manager.submit(true).await.unwrap();
        let good = manager.submit(false).await.unwrap();

        let worker = manager.worker();
        assert_eq!(worker.step().await, Some(bad));
        assert_eq!(worker.step().await, Some(good));

        let bad = manager.status(bad).await.unwrap();
        assert_eq!(bad.state, JobState::Failed);
        assert_eq!(
            bad.result,
            Some(JobOutcome::Failed("processor panicked".to_string()))
        );
        assert_eq!(manager.status(good).await.unwrap().state, JobState::Completed);
    }

    /// Payload whose copy can blow up inside the worker loop itself
    #[derive(Debug)]
    struct Fragile {
        poisoned: bool,
    }

    impl Clone for Fragile {
        fn clone(&self) -> Self {
            if self.poisoned {
                panic!("payload copy failed");
            }
            Self { poisoned: false }
        }
    }

    struct Accepting;

    #[async_trait]
    impl Processor for Accepting {
        type Payload = Fragile;
        type Output = ();

        async fn process(&self, _payload: Fragile) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_restarts_dead_loop() {
        let manager = QueueManager::new(QueueSettings::default(), Accepting);
        let doomed = manager.submit(Fragile { poisoned: true }).await.unwrap();
        let after = manager.submit(Fragile { poisoned: false }).await.unwrap();
        let handle = manager.start().unwrap();

        for _ in 0..100 {
            if manager.status(after).await.unwrap().state == JobState::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let doomed = manager.status(doomed).await.unwrap();
        assert_eq!(doomed.state, JobState::Failed);
        assert_eq!(
            doomed.result,
            Some(JobOutcome::Failed("worker restarted".to_string()))
        );
        assert_eq!(manager.status(after).await.unwrap().state, JobState::Completed);

        let health = manager.health().await;
        assert!(health.worker_running);
        assert_eq!(health.restarts, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_step_on_empty_queue() {
        let manager = QueueManager::new(QueueSettings::default(), Panicky);
        assert_eq!(manager.worker().step().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_worker_drains_queue() {
        let manager = QueueManager::new(QueueSettings::default(), Panicky);
        let handle = manager.start().unwrap();
        assert!(handle.is_running());

        let id = manager.submit(false).await.unwrap();
        for _ in 0..100 {
            if manager.status(id).await.unwrap().state == JobState::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.status(id).await.unwrap().state, JobState::Completed);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_spaces_out_jobs() {
        let settings = QueueSettings {
            cooldown: Duration::from_secs(5),
            ..QueueSettings::default()
        };
        let manager = QueueManager::new(settings, Panicky);
        let first = manager.submit(false).await.unwrap();
        let second = manager.submit(false).await.unwrap();
        let handle = manager.start().unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.status(first).await.unwrap().state, JobState::Completed);
        assert_eq!(manager.status(second).await.unwrap().state, JobState::Waiting);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.status(second).await.unwrap().state, JobState::Completed);

        handle.shutdown().await.unwrap();
    }
}
