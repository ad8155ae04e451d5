mod catalog;
mod config;
mod embed;
mod error;
mod methods;
mod panels;
mod playback;
mod player;
mod ui;

use anyhow::{anyhow, Result};
use config::AppConfig;
use reqwest::Client;
use std::fs::File;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// The terminal belongs to the UI, so logs go to a file.
fn init_logging(config: &AppConfig) -> Result<()> {
    let file = File::create(AppConfig::log_path())?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to set up logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load();
    init_logging(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let client = Client::builder()
        .user_agent(concat!("sportscast_tui/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout())
        .build()?;

    println!("📡 Fetching stream catalog from {}", config.catalog_url);
    let catalog = catalog::fetch_catalog(&client, &config.catalog_url).await;
    if let Err(e) = &catalog {
        warn!(error = %e, "continuing without catalog");
    }

    let (media_tx, media_rx) = mpsc::unbounded_channel();
    let backend = player::FfmpegBackend::new(
        &config.ffmpeg_path,
        config.request_timeout(),
        config.initial_volume,
        media_tx,
    )
    .map_err(|e| {
        eprintln!("Failed to start audio player: {}", e);
        eprintln!("Make sure you have audio drivers installed and working");
        e
    })?;
    let (controller, session_rx) =
        playback::PlaybackController::new(backend, methods::CONNECTION_METHODS);

    let ui_result = ui::run_ui(&config, catalog, controller, media_rx, session_rx).await;

    if let Err(e) = ui_result {
        eprintln!("UI error: {:?}", e);
    } else {
        config.save();
        println!("Thanks for watching!");
    }

    Ok(())
}
