//! Command-backed processor used by the binary

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

use super::processor::Processor;
use crate::config::processor_config::ProcessorConfig;

/// Runs an external program once per job, with the payload as its last argument
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
}

impl CommandProcessor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Execute the command for a payload and return its stdout
    pub async fn execute(&self, payload: &str) -> Result<String> {
        if self.program.trim().is_empty() {
            return Err(anyhow!("Empty command"));
        }
        debug!("Executing {} {:?} {}", self.program, self.args, payload);

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        if output.status.success() {
            let stdout = String::from_utf8(output.stdout)
                .context("Command output is not valid UTF-8")?;
            debug!("Command output: {} bytes", stdout.len());
            Ok(stdout.trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Command failed: {}", stderr.trim_end());
            Err(anyhow!(
                "Command failed with status {}: {}",
                output.status,
                stderr.trim_end()
            ))
        }
    }
}

#[async_trait]
impl Processor for CommandProcessor {
    type Payload = String;
    type Output = String;

    async fn process(&self, payload: String) -> Result<String> {
        self.execute(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_command() {
        let processor = CommandProcessor::new("echo", vec!["hello".to_string()]);
        let output = processor.process("world".to_string()).await.unwrap();
        assert_eq!(output, "hello world");
    }

    #[tokio::test]
    async fn test_execute_command_failure() {
        let processor = CommandProcessor::new("false", Vec::new());
        let result = processor.process("ignored".to_string()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let processor = CommandProcessor::new("definitely-not-a-real-binary-7f3a", Vec::new());
        let err = processor.process("x".to_string()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_empty_program() {
        let processor = CommandProcessor::new("  ", Vec::new());
        assert!(processor.process("x".to_string()).await.is_err());
    }
}
