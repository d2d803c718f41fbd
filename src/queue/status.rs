//! Point-in-time projections of the queue state for pollers

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::job::{JobId, JobOutcome, JobState};
use super::state::{QueueState, DAILY_WINDOW_DAYS};

/// What a single client sees when it polls its job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot<O> {
    pub job_id: JobId,
    pub state: JobState,
    /// 1-based rank among waiting jobs, 0 once the job has started
    pub position: usize,
    pub total_waiting: usize,
    pub estimated_wait_seconds: u64,
    pub result: Option<JobOutcome<O>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueActivity {
    Idle,
    Active,
}

/// Queue-wide view, independent of any client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatus {
    pub state: QueueActivity,
    /// Waiting jobs plus the one in flight
    pub total_queue: usize,
    pub estimated_wait_seconds: u64,
    pub avg_processing_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub today_completed: u64,
    pub started_at: DateTime<Utc>,
    pub queue_size: usize,
    pub avg_processing_seconds: f64,
    /// Last seven days, oldest first
    pub daily: Vec<DailyCount>,
}

/// Mean of the recorded durations, or `default` while nothing has run
pub fn average_duration<I, O>(state: &QueueState<I, O>, default: Duration) -> f64 {
    state
        .history()
        .average()
        .unwrap_or_else(|| default.as_secs_f64())
}

fn estimate(position: usize, average: f64) -> u64 {
    (position as f64 * average) as u64
}

/// Compute the snapshot for `id`, or `None` if the queue doesn't know it
pub fn project<I, O: Clone>(
    state: &QueueState<I, O>,
    id: JobId,
    default_duration: Duration,
) -> Option<StatusSnapshot<O>> {
    let job = state.job(&id)?;
    let total_waiting = state.pending().len();

    let position = match job.state {
        JobState::Waiting => state
            .pending()
            .iter()
            .position(|pending_id| *pending_id == id)
            .map_or(0, |index| index + 1),
        _ => 0,
    };

    Some(StatusSnapshot {
        job_id: id,
        state: job.state,
        position,
        total_waiting,
        estimated_wait_seconds: estimate(position, average_duration(state, default_duration)),
        result: job.outcome.clone(),
    })
}

pub fn global_status<I, O>(
    state: &QueueState<I, O>,
    default_duration: Duration,
) -> GlobalStatus {
    let total_queue = state.pending().len() + usize::from(state.current().is_some());
    let average = average_duration(state, default_duration);

    GlobalStatus {
        state: if total_queue == 0 {
            QueueActivity::Idle
        } else {
            QueueActivity::Active
        },
        total_queue,
        estimated_wait_seconds: estimate(total_queue, average),
        avg_processing_seconds: average,
    }
}

pub fn stats<I, O>(
    state: &QueueState<I, O>,
    default_duration: Duration,
    today: NaiveDate,
) -> QueueStats {
    let counters = state.counters();
    let count_for = |date: NaiveDate| counters.daily_completed.get(&date).copied().unwrap_or(0);

    let daily = (0..DAILY_WINDOW_DAYS)
        .rev()
        .filter_map(|days_ago| today.checked_sub_days(Days::new(days_ago)))
        .map(|date| DailyCount {
            date,
            count: count_for(date),
        })
        .collect();

    QueueStats {
        total_completed: counters.total_completed,
        total_failed: counters.total_failed,
        total_cancelled: counters.total_cancelled,
        today_completed: count_for(today),
        started_at: counters.started_at,
        queue_size: state.pending().len(),
        avg_processing_seconds: (average_duration(state, default_duration) * 10.0).round() / 10.0,
        daily,
    }
}
