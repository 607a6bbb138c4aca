//! SEAMS Server - REST API for campus events, registrations and attendance credits
//!
//! Storage is PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory
//! store that is lost on restart. A set but unreachable database is fatal.

use std::net::SocketAddr;

use seams_server::{config::Config, db::Database, mailer, routes, state::AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("seams_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "Starting SEAMS server v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::from_config(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to open database");
        e
    })?;

    let mailer = mailer::from_config(&config)?;
    let addr = config.socket_addr();
    let state = AppState::new(config, db, mailer)?;
    let hub = state.hub.clone();
    let app = routes::create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API docs at http://{}/swagger-ui", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Open event streams never complete on their own
        hub.close();
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
