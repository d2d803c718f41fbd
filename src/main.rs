mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serial_queue::config::Config;
use serial_queue::{CommandProcessor, Deadline, Processor, QueueManager, QueueSettings, WebServer};
use serde::{de::DeserializeOwned, Serialize};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first to get debug flag
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        None => run_queue(config).await?,
        Some(command) => match command {
            Commands::Show(args) => handle_show_command(&config, &args)?,
        },
    }

    Ok(())
}

/// Start the worker and the HTTP API, then wait for Ctrl+C
async fn run_queue(config: Config) -> Result<()> {
    let settings = config.queue.compile()?;
    let processor = CommandProcessor::from_config(&config.processor);

    match settings.process_timeout {
        Some(limit) => serve(config, settings, Deadline::new(processor, limit)).await,
        None => serve(config, settings, processor).await,
    }
}

async fn serve<P>(config: Config, settings: QueueSettings, processor: P) -> Result<()>
where
    P: Processor,
    P::Payload: DeserializeOwned,
    P::Output: Serialize,
{
    let manager = QueueManager::new(settings, processor);
    let worker = manager.start()?;

    info!(
        "serial-queue started, running '{}' once per job",
        config.processor.program
    );

    let server_handle = if config.server.enabled {
        let web_server = WebServer::new(config.server.port, config.server.host.clone(), manager.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = web_server.start().await {
                error!("Web server failed: {:#}", e);
            }
        }))
    } else {
        info!("HTTP API disabled in configuration");
        None
    };

    signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c")?;
    info!("Received Ctrl+C, shutting down");

    if let Some(handle) = server_handle {
        handle.abort();
    }

    let pending = manager.global_status().await.total_queue;
    if pending > 0 {
        info!("{} jobs still queued at shutdown", pending);
    }
    worker.shutdown().await?;

    Ok(())
}

/// Handle show command
fn handle_show_command(config: &Config, args: &cli::ShowArgs) -> Result<()> {
    if args.yaml {
        print!("{}", serde_yaml::to_string(config)?);
    } else {
        print!("{}", cli::describe_config(config)?);
    }
    Ok(())
}
