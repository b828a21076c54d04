use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::info;

use sketchboard_server::config::Config;
use sketchboard_server::create_routes;
use sketchboard_server::room_actor::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("starting sketchboard server");

    let config = Config::new();
    let state = Arc::new(AppState::new(config));

    let routes = create_routes(state.clone());

    let cleanup_connections = state.connections.clone();
    let connection_timeout = Duration::from_secs(state.config.connection_timeout_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            cleanup_connections
                .cleanup_inactive_connections(connection_timeout)
                .await;
        }
    });

    info!("server starting on {}:{}", state.config.host, state.config.port);

    let addr = (
        state
            .config
            .host
            .parse::<std::net::IpAddr>()
            .expect("invalid HOST"),
        state.config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("failed to listen for ctrl+c");
            info!("received Ctrl+C, shutting down gracefully...");
        }
    });

    info!("server started successfully on {}. Press Ctrl+C to stop.", addr);

    let shutdown_grace = Duration::from_secs(state.config.shutdown_grace_seconds);
    match tokio::time::timeout(shutdown_grace, server).await {
        Ok(()) => info!("server shutdown complete."),
        Err(_) => {
            tracing::error!(
                "graceful shutdown exceeded {}s, forcing exit",
                shutdown_grace.as_secs()
            );
            std::process::exit(1);
        }
    }
}
