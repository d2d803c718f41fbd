//! In-memory queue state guarded by the manager's lock
//!
//! Every method here is a short, non-blocking mutation. The manager holds its
//! single lock around each call and never across the processor call.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::QueueError;
use super::history::ProcessingHistory;
use super::job::{Job, JobId, JobOutcome, JobState};

/// Days of per-day completion counts kept for the stats chart
pub const DAILY_WINDOW_DAYS: u64 = 7;

/// Lifetime counters for the stats view
#[derive(Debug, Clone)]
pub struct Counters {
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub daily_completed: BTreeMap<NaiveDate, u64>,
    pub started_at: DateTime<Utc>,
}

impl Counters {
    /// Count one completion on `day`, dropping days older than the chart window
    pub fn record_completion(&mut self, day: NaiveDate) {
        *self.daily_completed.entry(day).or_insert(0) += 1;
        if let Some(oldest) = day.checked_sub_days(Days::new(DAILY_WINDOW_DAYS - 1)) {
            self.daily_completed = self.daily_completed.split_off(&oldest);
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            total_completed: 0,
            total_failed: 0,
            total_cancelled: 0,
            daily_completed: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }
}

/// One successful job in the recent-activity feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub job_id: JobId,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct QueueState<I, O> {
    pending: VecDeque<JobId>,
    jobs: HashMap<JobId, Job<I, O>>,
    history: ProcessingHistory,
    current: Option<JobId>,
    counters: Counters,
    activity: VecDeque<ActivityEntry>,
    activity_limit: usize,
}

impl<I, O> QueueState<I, O> {
    pub fn new(history_size: usize, activity_limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            jobs: HashMap::new(),
            history: ProcessingHistory::with_capacity(history_size),
            current: None,
            counters: Counters::default(),
            activity: VecDeque::new(),
            activity_limit,
        }
    }

    /// Append a new `Waiting` job to the back of the queue
    pub fn enqueue(&mut self, payload: I, now: Instant) -> JobId {
        let id = JobId::new();
        self.jobs.insert(id, Job::new(id, payload, now));
        self.pending.push_back(id);
        debug!("Enqueued job {} ({} waiting)", id, self.pending.len());
        id
    }

    /// Cancel a job that has not started yet
    ///
    /// Returns `Ok(false)` when the job is already processing or finished.
    pub fn cancel(&mut self, id: JobId, now: Instant) -> Result<bool, QueueError> {
        let job = self.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if job.state != JobState::Waiting {
            debug!("Cannot cancel job {} in state {}", id, job.state);
            return Ok(false);
        }

        job.cancel(now);
        self.pending.retain(|pending_id| *pending_id != id);
        self.counters.total_cancelled += 1;
        info!("Cancelled job {} ({} waiting)", id, self.pending.len());
        Ok(true)
    }

    /// Pop the oldest waiting job and mark it `Processing`
    ///
    /// Returns `None` when nothing is waiting or a job is already in flight.
    pub fn begin_next(&mut self, now: Instant) -> Option<(JobId, I)>
    where
        I: Clone,
    {
        if self.current.is_some() {
            return None;
        }

        while let Some(id) = self.pending.pop_front() {
            let Some(job) = self.jobs.get_mut(&id) else {
                warn!("Pending job {} has no record, skipping", id);
                continue;
            };
            job.start(now);
            self.current = Some(id);
            return Some((id, job.payload.clone()));
        }
        None
    }

    /// Record the outcome of the in-flight job
    pub fn finish(&mut self, id: JobId, outcome: JobOutcome<O>, now: Instant) {
        if self.current == Some(id) {
            self.current = None;
        }

        let Some(job) = self.jobs.get_mut(&id) else {
            warn!("Finished job {} was purged while processing", id);
            return;
        };
        if job.state != JobState::Processing {
            warn!("Ignoring outcome for job {} in state {}", id, job.state);
            return;
        }

        let success = outcome.is_success();
        job.finish(outcome, now);
        let duration = job.duration().unwrap_or_default();
        self.history.record(duration);

        if success {
            let finished_at = Utc::now();
            self.counters.total_completed += 1;
            self.counters.record_completion(finished_at.date_naive());
            self.push_activity(ActivityEntry {
                job_id: id,
                finished_at,
                duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            });
        } else {
            self.counters.total_failed += 1;
        }
    }

    /// Fail the in-flight job, if any, after the worker died under it
    pub fn abandon_current(&mut self, reason: &str, now: Instant) -> Option<JobId> {
        let id = self.current?;
        self.finish(id, JobOutcome::Failed(reason.to_string()), now);
        Some(id)
    }

    /// Drop terminal jobs that finished at least `ttl` ago
    pub fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|id, job| {
            let expired = job.state.is_terminal()
                && job
                    .finished_at
                    .is_some_and(|finished| now.saturating_duration_since(finished) >= ttl);
            if expired {
                debug!("Purging expired job {}", id);
            }
            !expired
        });
        before - self.jobs.len()
    }

    fn push_activity(&mut self, entry: ActivityEntry) {
        if self.activity_limit == 0 {
            return;
        }
        if self.activity.len() == self.activity_limit {
            self.activity.pop_front();
        }
        self.activity.push_back(entry);
    }

    pub fn pending(&self) -> &VecDeque<JobId> {
        &self.pending
    }

    pub fn job(&self, id: &JobId) -> Option<&Job<I, O>> {
        self.jobs.get(id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn history(&self) -> &ProcessingHistory {
        &self.history
    }

    pub fn current(&self) -> Option<JobId> {
        self.current
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Recent successful jobs, newest first
    pub fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.activity.iter().rev().take(limit).cloned().collect()
    }
}
