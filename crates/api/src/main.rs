use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod app;
mod config;
mod error;
mod extractors;
mod jobs;
mod middleware;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize logging
    middleware::logging::init_logging(&config.logging);

    // Initialize Prometheus metrics
    middleware::metrics::init_metrics();

    info!("Starting ridehail dispatch API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let db_config = persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    };
    let pool = persistence::db::create_pool(&db_config).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let shutdown_grace = Duration::from_secs(config.server.shutdown_grace_secs);
    let state = app::build_state(config, pool.clone());

    // Start job scheduler: offer timeout sweep, hot-store reclamation,
    // pool gauges
    let mut scheduler = jobs::JobScheduler::new();
    scheduler.register(jobs::OfferTimeoutJob::new(Arc::clone(&state.dispatch)));
    scheduler.register(jobs::HotStoreCleanupJob::new(
        Arc::clone(&state.geo_index),
        Arc::clone(&state.offers),
        Arc::clone(&state.locks),
        Arc::clone(&state.demand),
        Arc::clone(&state.surge_cache),
        Arc::clone(&state.idempotency),
    ));
    scheduler.register(jobs::PoolMetricsJob::new(pool));
    scheduler.start();

    // Build application
    let addr = state.config.socket_addr();
    let app = app::create_app(state);

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Handle shutdown gracefully
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Shutdown job scheduler
    scheduler.shutdown();
    scheduler.wait_for_shutdown(shutdown_grace).await;

    info!("Server shutdown complete");
    Ok(())
}
