pub mod config;
pub mod queue;
pub mod web_server;

// Public API
pub use config::queue_config::QueueSettings;
pub use config::Config;
pub use queue::{
    CommandProcessor, Deadline, JobId, JobOutcome, JobState, Processor, QueueError, QueueManager,
    StatusSnapshot, Worker, WorkerHandle,
};
pub use web_server::WebServer;
