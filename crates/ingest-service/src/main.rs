use anyhow::{Context, Result};
use ingest_service::{
    AppState, IngestServiceConfig, MemoryParkingStore, ParkingStore, ParkingStoreType,
    PgParkingStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_with_service("ingest-service");

    info!("Starting ingest service...");

    let config = IngestServiceConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        store = ?config.store_type,
        total_spaces = config.total_spaces,
        "ingest service configuration"
    );

    let store: Arc<dyn ParkingStore> = match config.store_type {
        ParkingStoreType::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres store")?;

            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;

            info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;

            info!("Migrations complete");

            Arc::new(PgParkingStore::new(pool, config.total_spaces))
        }
        ParkingStoreType::Memory => {
            info!("Using in-memory parking store");
            Arc::new(MemoryParkingStore::new(config.total_spaces))
        }
    };

    let state = AppState::new(store);
    let app = ingest_service::create_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    info!("Ingest service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Ingest service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
