//! Driver endpoint handlers: registration, heartbeats, status, and
//! nearest-neighbour queries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use validator::Validate;

use domain::models::{
    Driver, DriverLocationUpdate, LocationUpdateResponse, NearbyDriver, NearbyQuery,
    RegisterDriverRequest, UpdateDriverStatusRequest,
};
use persistence::repositories::DriverRepository;

use crate::app::AppState;
use crate::error::ApiError;

/// Register (or re-register) a driver profile.
///
/// POST /api/v1/drivers
pub async fn register_driver(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<Driver>), ApiError> {
    let request: RegisterDriverRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    request.validate()?;

    let entity = DriverRepository::new(state.pool.clone())
        .upsert(
            &request.driver_id,
            &request.name,
            request.vehicle_type.as_str(),
        )
        .await?;
    let driver = Driver::try_from(entity).map_err(ApiError::Internal)?;

    info!(driver_id = %driver.id, vehicle_type = %driver.vehicle_type, "Driver registered");
    Ok((StatusCode::CREATED, Json(driver)))
}

/// Driver profile response with live location, when present.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDetailsResponse {
    #[serde(flatten)]
    pub driver: Driver,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Fetch a driver profile, augmented with the live position when the
/// driver has a live presence record.
///
/// GET /api/v1/drivers/{driver_id}
pub async fn get_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
) -> Result<Json<DriverDetailsResponse>, ApiError> {
    let entity = DriverRepository::new(state.pool.clone())
        .find_by_id(&driver_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Driver {} not found", driver_id)))?;
    let driver = Driver::try_from(entity).map_err(ApiError::Internal)?;

    let live = state.proximity.locate(&driver_id);

    Ok(Json(DriverDetailsResponse {
        driver,
        latitude: live.as_ref().map(|p| p.latitude),
        longitude: live.as_ref().map(|p| p.longitude),
        region: live.map(|p| p.region),
    }))
}

/// Ingest a driver heartbeat.
///
/// POST /api/v1/drivers/{driver_id}/location
pub async fn update_location(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<LocationUpdateResponse>, ApiError> {
    let update: DriverLocationUpdate =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    update.validate()?;

    let ingest = state.proximity.update_location(&driver_id, &update).await?;

    Ok(Json(LocationUpdateResponse {
        success: true,
        driver_id,
        cell: ingest.cell,
        region: ingest.region,
    }))
}

/// Nearby drivers response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResponse {
    pub drivers: Vec<NearbyDriver>,
    pub count: usize,
}

/// Nearest-neighbour search.
///
/// GET /api/v1/drivers/nearby
pub async fn find_nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<NearbyResponse>, ApiError> {
    query.validate()?;

    let drivers = state.proximity.find_nearby(&query);
    let count = drivers.len();
    Ok(Json(NearbyResponse { drivers, count }))
}

/// Driver status change response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResponse {
    pub driver_id: String,
    pub status: domain::models::DriverStatus,
}

/// Change a driver's availability status.
///
/// PATCH /api/v1/drivers/{driver_id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<StatusChangeResponse>, ApiError> {
    let request: UpdateDriverStatusRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;

    let status = state.proximity.set_status(&driver_id, request.status).await?;

    Ok(Json(StatusChangeResponse { driver_id, status }))
}
