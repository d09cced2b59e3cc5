use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{EventPublisher, LoggingEventPublisher};
use persistence::hot::{
    DemandCounterStore, GeoIndex, IdempotencyStore, OfferEntryStore, RideLockStore,
    SurgeCacheStore,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{drivers, health, rides, surge};
use crate::services::{DispatchService, ProximityService, SurgeService};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub geo_index: Arc<GeoIndex>,
    pub locks: Arc<RideLockStore>,
    pub offers: Arc<OfferEntryStore>,
    pub demand: Arc<DemandCounterStore>,
    pub surge_cache: Arc<SurgeCacheStore>,
    pub idempotency: Arc<IdempotencyStore>,
    pub events: Arc<dyn EventPublisher>,
    pub proximity: Arc<ProximityService>,
    pub surge: Arc<SurgeService>,
    pub dispatch: Arc<DispatchService>,
}

/// Construct the hot stores, event publisher, and engines. Everything here
/// is an explicitly wired dependency; nothing hides behind process-wide
/// singletons.
pub fn build_state(config: Config, pool: PgPool) -> AppState {
    build_state_with_events(config, pool, Arc::new(LoggingEventPublisher::new()))
}

/// State construction with a caller-supplied event publisher (tests swap in
/// a recording bus).
pub fn build_state_with_events(
    config: Config,
    pool: PgPool,
    events: Arc<dyn EventPublisher>,
) -> AppState {
    let config = Arc::new(config);

    let geo_index = Arc::new(GeoIndex::new(config.proximity.presence_ttl()));
    let locks = Arc::new(RideLockStore::new(config.dispatch.lock_ttl()));
    let offers = Arc::new(OfferEntryStore::new(config.dispatch.offer_entry_slack()));
    let demand = Arc::new(DemandCounterStore::new(config.surge.demand_ttl()));
    let surge_cache = Arc::new(SurgeCacheStore::new(config.surge.cache_ttl()));
    let idempotency = Arc::new(IdempotencyStore::new(config.idempotency.ttl()));

    let proximity = Arc::new(ProximityService::new(
        pool.clone(),
        Arc::clone(&geo_index),
        Arc::clone(&events),
        config.proximity.default_region.clone(),
    ));
    let surge = Arc::new(SurgeService::new(
        Arc::clone(&geo_index),
        Arc::clone(&demand),
        Arc::clone(&surge_cache),
        Arc::clone(&events),
        config.surge.clone(),
        config.proximity.default_region.clone(),
    ));
    let dispatch = Arc::new(DispatchService::new(
        pool.clone(),
        Arc::clone(&geo_index),
        Arc::clone(&locks),
        Arc::clone(&offers),
        Arc::clone(&surge),
        Arc::clone(&events),
        config.dispatch.clone(),
        config.fare.clone(),
        config.proximity.default_region.clone(),
    ));

    AppState {
        pool,
        config,
        geo_index,
        locks,
        offers,
        demand,
        surge_cache,
        idempotency,
        events,
        proximity,
        surge,
        dispatch,
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.security.cors_origins.is_empty()
        || state.config.security.cors_origins.iter().any(|o| o == "*")
    {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = state
            .config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let driver_routes = Router::new()
        .route("/api/v1/drivers", post(drivers::register_driver))
        .route("/api/v1/drivers/nearby", get(drivers::find_nearby))
        .route("/api/v1/drivers/:driver_id", get(drivers::get_driver))
        .route(
            "/api/v1/drivers/:driver_id/location",
            post(drivers::update_location),
        )
        .route(
            "/api/v1/drivers/:driver_id/status",
            patch(drivers::update_status),
        );

    let ride_routes = Router::new()
        .route("/api/v1/rides", post(rides::create_ride))
        .route("/api/v1/rides/:ride_id", get(rides::get_ride))
        .route(
            "/api/v1/rides/:ride_id/driver-response",
            post(rides::driver_response),
        )
        .route(
            "/api/v1/rides/:ride_id/check-timeout",
            post(rides::check_timeout),
        )
        .route("/api/v1/rides/:ride_id/cancel", post(rides::cancel_ride));

    let surge_routes = Router::new()
        .route("/api/v1/surge/calculate", post(surge::calculate))
        .route("/api/v1/surge/demand", post(surge::increment_demand))
        .route("/api/v1/surge/region/:region", get(surge::region_zones))
        .route("/api/v1/surge/:cell", get(surge::get_cell));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(driver_routes)
        .merge(ride_routes)
        .merge(surge_routes)
        .merge(public_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
