use crate::config::helper::parse_duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Queue section matching config.yaml structure; durations are "30s"-style strings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_duration")]
    pub default_duration: String,
    #[serde(default = "default_retention")]
    pub retention: String,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,
    #[serde(default = "default_cooldown")]
    pub cooldown: String,
    #[serde(default)]
    pub max_pending: Option<usize>,
    #[serde(default)]
    pub process_timeout: Option<String>,
    #[serde(default = "default_activity_limit")]
    pub activity_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            default_duration: default_duration(),
            retention: default_retention(),
            sweep_interval: default_sweep_interval(),
            cooldown: default_cooldown(),
            max_pending: None,
            process_timeout: None,
            activity_limit: default_activity_limit(),
        }
    }
}

fn default_history_size() -> usize {
    10
}

fn default_duration() -> String {
    "5s".to_string()
}

fn default_retention() -> String {
    "10m".to_string()
}

fn default_sweep_interval() -> String {
    "30s".to_string()
}

fn default_cooldown() -> String {
    "0s".to_string()
}

fn default_activity_limit() -> usize {
    20
}

/// Queue settings with every duration parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Number of recent durations averaged for wait estimates
    pub history_size: usize,
    /// Per-job estimate used until the first job finishes
    pub default_duration: Duration,
    /// How long terminal jobs stay visible to pollers
    pub retention: Duration,
    /// How often an idle worker sweeps expired jobs
    pub sweep_interval: Duration,
    /// Pause between consecutive jobs
    pub cooldown: Duration,
    pub max_pending: Option<usize>,
    pub process_timeout: Option<Duration>,
    pub activity_limit: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            default_duration: Duration::from_secs(5),
            retention: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
            cooldown: Duration::ZERO,
            max_pending: None,
            process_timeout: None,
            activity_limit: default_activity_limit(),
        }
    }
}

impl QueueConfig {
    /// Parse duration strings into QueueSettings
    pub fn compile(&self) -> Result<QueueSettings> {
        let parse = |field: &str, value: &str| {
            parse_duration(value).with_context(|| format!("Invalid queue.{}: {}", field, value))
        };

        let sweep_interval = parse("sweep_interval", &self.sweep_interval)?;
        if sweep_interval.is_zero() {
            anyhow::bail!("queue.sweep_interval must be greater than zero");
        }

        let process_timeout = match &self.process_timeout {
            Some(value) => Some(parse("process_timeout", value)?),
            None => None,
        };

        Ok(QueueSettings {
            history_size: self.history_size.max(1),
            default_duration: parse("default_duration", &self.default_duration)?,
            retention: parse("retention", &self.retention)?,
            sweep_interval,
            cooldown: parse("cooldown", &self.cooldown)?,
            max_pending: self.max_pending,
            process_timeout,
            activity_limit: self.activity_limit,
        })
    }
}
