// ABOUTME: Entry point for the Slack/Telegram relay
// ABOUTME: Loads config, connects both pumpers, runs the connection and health server until a signal

use anyhow::{Context, Result};
use cable::config::Config;
use cable::connection::BidirectionalPumpConnection;
use cable::health;
use cable::logging::{self, LogFormat};
use cable::platform::{SlackPumper, TelegramPumper};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Relay messages between a Slack channel and a Telegram group
#[derive(Parser)]
#[command(name = "cable", version, about)]
struct Cli {
    /// Path to the TOML config file (defaults to CABLE_CONFIG_PATH or cable.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    logging::init(LogFormat::from_env());

    tracing::info!("Starting cable relay");

    let config_path = cli.config.unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path)?;

    tracing::info!(
        config = %config_path.display(),
        slack_channel = %config.slack.relayed_channel,
        telegram_chat = config.telegram.relayed_chat,
        listen = %config.listen_address(),
        "Configuration loaded"
    );

    let slack = Arc::new(SlackPumper::connect(&config.slack).await?);
    let telegram = Arc::new(TelegramPumper::connect(&config.telegram).await?);

    let mut connection = BidirectionalPumpConnection::new(slack, telegram);
    connection.go()?;

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(health::serve(config.listen_address(), shutdown.clone()));

    let server_done = tokio::select! {
        res = shutdown_signal() => {
            res?;
            false
        }
        res = &mut server => {
            // The health server only returns on its own when it failed
            res.context("Health server task panicked")??;
            true
        }
    };

    tracing::info!("Shutting down");
    connection.stop().await?;
    shutdown.cancel();
    if !server_done {
        server.await.context("Health server task panicked")??;
    }

    tracing::info!("Relay stopped");
    Ok(())
}

/// Wait for Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    Ok(())
}
