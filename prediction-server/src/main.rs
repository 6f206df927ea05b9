use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use prediction_persistence::connection::connect_and_migrate;
use prediction_server::{
    config::Config, create_routes, game_service::GameService, random_org::RandomOrgClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting prediction game server...");

    let config = Config::from_env()?;
    if config.random_service_key.is_empty() {
        tracing::warn!("RANDOM_API_KEY is not set; every round will fail to draw numbers");
    }

    let random_source = Arc::new(RandomOrgClient::new(
        config.random_service_key.clone(),
        config.random_service_url.clone(),
        config.random_timeout(),
    )?);

    // Initialize database connection and run migrations
    let storage_url = config.storage_connection_url()?;
    let db = match connect_and_migrate(&storage_url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };

    let game_service = Arc::new(GameService::new(random_source, db));
    let routes = create_routes(game_service.clone());

    // Start cleanup task
    let cleanup_game_service = game_service.clone();
    let round_ttl = config.round_ttl();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_game_service.cleanup_expired_rounds(round_ttl);
        }
    });

    let addr = (config.host.parse::<std::net::IpAddr>()?, config.port);

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let (Ok(mut sigint), Ok(mut sigterm)) = (
                signal::unix::signal(signal::unix::SignalKind::interrupt()),
                signal::unix::signal(signal::unix::SignalKind::terminate()),
            ) else {
                tracing::error!("Failed to install signal handlers");
                return;
            };

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if signal::ctrl_c().await.is_err() {
                tracing::error!("Failed to listen for ctrl+c");
                return;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
    Ok(())
}
