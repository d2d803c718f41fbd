pub mod helper;
pub mod processor_config;
pub mod queue_config;
pub mod server_config;

use crate::config::processor_config::ProcessorConfig;
use crate::config::queue_config::QueueConfig;
use crate::config::server_config::ServerConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure matching config.yaml format
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config =
            serde_yaml::from_str(&content).with_context(|| "Failed to parse YAML config file")?;

        // Surface bad durations at load time rather than at worker start
        config.queue.compile()?;

        Ok(config)
    }

    /// Load an explicitly given file, or `config.yaml` if it exists, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new("config.yaml");
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    info!("No config.yaml found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }
}
