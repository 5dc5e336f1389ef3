use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing::{error, info};

use tweetstream::config::{Config, LogFormat};
use tweetstream::logging::init_tracing;
use tweetstream::TweetStream;

#[derive(Parser)]
#[command(name = "tweetstream")]
#[command(about = "Print matching tweets from the X filtered stream as JSON lines", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON instead of human-readable lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if cli.json_logs {
        config.log.format = LogFormat::Json;
    }
    init_tracing(&config.log)?;

    info!(base_url = %config.api.base_url, "Starting filtered stream");
    let stream = TweetStream::from_config(&config);

    let failed = tokio::select! {
        failed = print_tweets(stream) => failed?,
        _ = shutdown_signal() => {
            info!("Shutdown requested, closing stream");
            false
        }
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns `true` when the stream ended with an error.
async fn print_tweets(mut stream: TweetStream) -> Result<bool> {
    let stdout = std::io::stdout();
    while let Some(item) = stream.next().await {
        match item {
            Ok(tweet) => {
                let line = serde_json::to_string(&tweet)?;
                let mut out = stdout.lock();
                writeln!(out, "{line}")?;
                out.flush()?;
            }
            Err(err) => {
                error!(error = %err.report(), "Filtered stream failed");
                return Ok(true);
            }
        }
    }
    info!("Filtered stream ended");
    Ok(false)
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
