use serial_queue::config::Config;
use anyhow::Result;
use std::fmt::Write;

/// Human-readable summary of the effective configuration
pub fn describe_config(config: &Config) -> Result<String> {
    let settings = config.queue.compile()?;
    let mut out = String::new();

    writeln!(out, "Queue:")?;
    writeln!(out, "  history_size: {}", settings.history_size)?;
    writeln!(out, "  default_duration: {:?}", settings.default_duration)?;
    writeln!(out, "  retention: {:?}", settings.retention)?;
    writeln!(out, "  sweep_interval: {:?}", settings.sweep_interval)?;
    writeln!(out, "  cooldown: {:?}", settings.cooldown)?;
    match settings.max_pending {
        Some(limit) => writeln!(out, "  max_pending: {}", limit)?,
        None => writeln!(out, "  max_pending: unbounded")?,
    }
    match settings.process_timeout {
        Some(timeout) => writeln!(out, "  process_timeout: {:?}", timeout)?,
        None => writeln!(out, "  process_timeout: none")?,
    }
    writeln!(out, "  activity_limit: {}", settings.activity_limit)?;

    writeln!(out, "\nServer:")?;
    writeln!(out, "  enabled: {}", config.server.enabled)?;
    writeln!(out, "  host: {}", config.server.host)?;
    writeln!(out, "  port: {}", config.server.port)?;

    writeln!(out, "\nProcessor:")?;
    writeln!(out, "  program: {}", config.processor.program)?;
    writeln!(out, "  args: {:?}", config.processor.args)?;

    Ok(out)
}
