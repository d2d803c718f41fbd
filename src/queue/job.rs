//! Job records tracked by the queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;
use uuid::Uuid;

/// Opaque identifier handed back to the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Queued behind other jobs
    Waiting,
    /// Handed to the processor
    Processing,
    Completed,
    Failed,
    /// Removed from the queue before it started
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal result attached to a processed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum JobOutcome<O> {
    Completed(O),
    Failed(String),
}

impl<O> JobOutcome<O> {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

/// A submitted unit of work and its lifecycle
///
/// `started_at` is set once the job leaves `Waiting` for `Processing`, and
/// `finished_at` once it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct Job<I, O> {
    pub id: JobId,
    pub payload: I,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub enqueued_at: Instant,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub outcome: Option<JobOutcome<O>>,
}

impl<I, O> Job<I, O> {
    pub fn new(id: JobId, payload: I, now: Instant) -> Self {
        Self {
            id,
            payload,
            state: JobState::Waiting,
            submitted_at: Utc::now(),
            enqueued_at: now,
            started_at: None,
            finished_at: None,
            outcome: None,
        }
    }

    pub(crate) fn start(&mut self, now: Instant) {
        self.state = JobState::Processing;
        self.started_at = Some(now);
    }

    pub(crate) fn finish(&mut self, outcome: JobOutcome<O>, now: Instant) {
        self.state = if outcome.is_success() {
            JobState::Completed
        } else {
            JobState::Failed
        };
        self.finished_at = Some(now);
        self.outcome = Some(outcome);
    }

    pub(crate) fn cancel(&mut self, now: Instant) {
        self.state = JobState::Cancelled;
        self.finished_at = Some(now);
    }

    /// Time spent in the processor, once finished
    pub fn duration(&self) -> Option<std::time::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.saturating_duration_since(started)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_timestamps() {
        let mut job: Job<&str, &str> = Job::new(JobId::new(), "alice", Instant::now());
        assert_eq!(job.state, JobState::Waiting);
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());

        job.start(Instant::now());
        assert_eq!(job.state, JobState::Processing);
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_none());

        tokio::time::advance(Duration::from_secs(3)).await;
        job.finish(JobOutcome::Failed("boom".to_string()), Instant::now());
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.duration(), Some(Duration::from_secs(3)));
        assert_eq!(job.outcome, Some(JobOutcome::Failed("boom".to_string())));
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&JobState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
