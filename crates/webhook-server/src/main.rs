use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use holdline_transfer_engine::{LoggingProvider, QueueEngine, TelephonyProvider};
use holdline_webhook_server::{create_router, setup_logging, ServerConfig, TwilioProvider};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "holdline")]
#[command(about = "Call queue and transfer orchestration server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    setup_logging(&config.logging)?;
    info!("Starting holdline v{}", env!("CARGO_PKG_VERSION"));

    let provider: Arc<dyn TelephonyProvider> = match config.twilio.clone() {
        Some(twilio) => Arc::new(TwilioProvider::new(twilio).context("Failed to create Twilio provider")?),
        None => {
            warn!("⚠️ No Twilio credentials configured, transfers will only be logged");
            Arc::new(LoggingProvider)
        }
    };

    let engine = QueueEngine::builder()
        .with_config(config.engine.clone())
        .with_provider(provider)
        .build()
        .context("Failed to create transfer engine")?;

    let sweeper = engine.spawn_sweeper();

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("🌐 Listening on {} (callbacks via {})", config.bind_address, config.engine.status_callback_url);

    axum::serve(listener, create_router(Arc::clone(&engine)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    let remaining = engine.queue_status();
    info!(
        queued = remaining.queue_length,
        in_flight = remaining.active_calls.len(),
        "👋 holdline stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}
