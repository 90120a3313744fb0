use actix_files::Files;
use actix_web::{web, App, HttpServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

use crate::config::CONFIG;
use crate::web::handlers;
use crate::web::models::AppState;

pub async fn run_server(state: web::Data<AppState>, shutdown_signal: Arc<Notify>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", CONFIG.webserver_host, CONFIG.webserver_port)
        .parse::<SocketAddr>()?;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
            .service(Files::new("/videos", state.videos_dir.clone()))
    })
    .bind(addr)?;

    info!("Starting web server on: {addr}");

    let server = server.run();
    let handle = server.handle();

    tokio::select! {
        result = server => result?,
        _ = shutdown_signal.notified() => {
            info!("Shutdown signal received, stopping web server");
            handle.stop(true).await;
        }
    }

    Ok(())
}
