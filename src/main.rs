mod config;
mod media;
mod services;
mod web;

use actix_web::web::Data;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::config::CONFIG;
use crate::web::models::AppState;
use crate::web::server::run_server;
use crate::web::thumbnails::prewarm_thumbnails;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();
    info!("Logging initialized, starting the application");
    info!(
        "Data path: {}, videos: {}, thumbnail slots: {}",
        CONFIG.data_path, CONFIG.videos_dir, CONFIG.thumbnail_slots
    );

    tokio::fs::create_dir_all(&CONFIG.videos_dir).await?;

    let state = Data::new(AppState::from_config()?);

    // Create shutdown signal
    let shutdown = Arc::new(Notify::new());
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        ctrl_c_shutdown.notify_waiters();
    });

    let mut now_playing = {
        let playback = state.playback.lock().await;
        info!("Autoplay threshold: {}", playback.threshold());
        playback.subscribe()
    };
    tokio::spawn(async move {
        while now_playing.changed().await.is_ok() {
            let current = now_playing.borrow_and_update().clone();
            info!("Now playing: {}", current.as_deref().unwrap_or("nothing"));
        }
    });

    // Thumbnails for the existing catalogue are built in the background
    let prewarm_state = state.clone();
    tokio::spawn(async move {
        prewarm_thumbnails(&prewarm_state).await;
    });

    if let Err(e) = run_server(state, shutdown).await {
        error!("Web server error: {:?}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
