//! Single-worker request queue for rate-limited operations
//!
//! This module provides:
//! - Strict FIFO ordering with exactly one job processing at a time
//! - Per-job position and wait estimates from a moving average of durations
//! - Cancellation of jobs that have not started
//! - Bounded retention of finished jobs for pollers

pub mod error;
pub mod executor;
pub mod history;
pub mod job;
pub mod manager;
pub mod processor;
pub mod state;
pub mod status;
pub mod worker;

pub use error::QueueError;
pub use executor::CommandProcessor;
pub use history::ProcessingHistory;
pub use job::{Job, JobId, JobOutcome, JobState};
pub use manager::{Health, QueueManager};
pub use processor::{Deadline, Processor};
pub use state::ActivityEntry;
pub use status::{GlobalStatus, QueueActivity, QueueStats, StatusSnapshot};
pub use worker::{Worker, WorkerHandle};
