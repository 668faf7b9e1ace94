//! Vitrine Player (vitrine-player) - Main entry point
//!
//! Loads the model directory, starts a session on the headless viewer and
//! serves the HTTP control API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitrine_common::config::{resolve_config_path, TomlConfig};
use vitrine_common::events::EventBus;
use vitrine_player::api::{self, AppContext};
use vitrine_player::conversion::{AssetConverter, HttpAssetConverter};
use vitrine_player::gateway::FetchGateway;
use vitrine_player::headless::HeadlessViewer;
use vitrine_player::platform::Platform;
use vitrine_player::session::{self, ViewerSession};
use vitrine_player::{Error, SessionContext};

/// Command-line arguments for vitrine-player
#[derive(Parser, Debug)]
#[command(name = "vitrine-player")]
#[command(about = "Model viewer orchestration service for Vitrine")]
#[command(version)]
struct Args {
    /// Model set to display
    #[arg(long, env = "VITRINE_MODEL_ID")]
    id: Option<String>,

    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "VITRINE_PORT")]
    port: Option<u16>,

    /// Pin the platform: "ios" or "other" (overrides config)
    #[arg(long)]
    platform: Option<String>,

    /// User agent used for platform detection
    #[arg(long)]
    user_agent: Option<String>,

    /// Simulated load time of the headless viewer
    #[arg(long, default_value = "250")]
    load_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vitrine_player={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vitrine Player");
    if let Some(path) = &config_path {
        info!("Configuration: {}", path.display());
    }

    let model_id = args
        .id
        .clone()
        .or_else(|| config.default_model_id.clone())
        .ok_or_else(|| {
            Error::Config("no model id given (--id, VITRINE_MODEL_ID or default_model_id)".to_string())
        })?;

    let platform = Platform::resolve(
        args.platform.as_deref().or(config.platform.as_deref()),
        args.user_agent.as_deref().or(config.user_agent.as_deref()),
    )
    .context("Invalid platform")?;
    let port = args.port.unwrap_or(config.server.port);

    info!(model_id = %model_id, platform = %platform, port, "Resolved startup parameters");

    let ctx = Arc::new(SessionContext::new(EventBus::new(256)));
    let gateway = FetchGateway::new(&config.gateway).context("Failed to create fetch gateway")?;
    let converter: Arc<dyn AssetConverter> = Arc::new(
        HttpAssetConverter::new(&config.conversion.api_url)
            .context("Failed to create conversion client")?,
    );
    let viewer = Arc::new(HeadlessViewer::new(Duration::from_millis(args.load_delay_ms)));

    // Ctrl+C during the directory fetch aborts it
    let cancel = CancellationToken::new();
    let bootstrap = tokio::select! {
        result = session::bootstrap(&ctx, &gateway, &model_id, &cancel) => Some(result),
        _ = shutdown_signal() => {
            cancel.cancel();
            None
        }
    };
    let Some(directory) = bootstrap else {
        info!("Shutdown requested during startup");
        return Ok(());
    };

    // Startup failures are already shown through the session context; the
    // API keeps serving them
    let session = match directory.and_then(|directory| {
        ViewerSession::start(
            Arc::clone(&ctx),
            directory,
            viewer.clone(),
            Some(converter),
            platform,
            &config.playback,
        )
    }) {
        Ok(session) => Some(Arc::new(session)),
        Err(e) => {
            error!("Session not started: {}", e);
            None
        }
    };

    let app = AppContext {
        ctx,
        session,
        headless: Some(viewer),
    };

    api::run(app, port, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
