//! Ride endpoint handlers: intake, detail reads, driver responses,
//! timeout probes, and cancellation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    CreateRideRequest, DriverResponseRequest, DriverResponseResult, RideDetailsResponse,
    RideRequest,
};
use persistence::hot::IdempotencyOutcome;
use shared::crypto::request_fingerprint;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::IdempotencyKey;

/// Create a ride request and synchronously run the first match attempt.
///
/// Requires an `Idempotency-Key` header. A replay with an identical body
/// returns the cached response with 200; the same key with a different
/// body fails with IDEMPOTENCY_CONFLICT.
///
/// POST /api/v1/rides
pub async fn create_ride(
    State(state): State<AppState>,
    key: IdempotencyKey,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let fingerprint = request_fingerprint("POST", "/api/v1/rides", &body.to_string());

    let ticket = match state.idempotency.begin(&key.hash, &fingerprint) {
        IdempotencyOutcome::Replay { status, response } => {
            info!(idempotency_key = %key.original, "Returning cached response for replayed request");
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            return Ok((status, Json(response)).into_response());
        }
        IdempotencyOutcome::Conflict => return Err(ApiError::IdempotencyConflict),
        IdempotencyOutcome::InFlight => return Err(ApiError::RideBusy),
        IdempotencyOutcome::New(ticket) => ticket,
    };

    let request: CreateRideRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    request.validate()?;

    let response = state
        .dispatch
        .create_ride_request(&request, &key.hash)
        .await?;
    let cached =
        serde_json::to_value(&response).map_err(|e| ApiError::Internal(e.to_string()))?;
    ticket.complete(StatusCode::OK.as_u16(), cached);

    info!(
        ride_id = %response.id,
        status = %response.status,
        matched = response.matched_driver.is_some(),
        "Ride request created"
    );
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Fetch a ride request with its current offer.
///
/// GET /api/v1/rides/{ride_id}
pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideDetailsResponse>, ApiError> {
    Ok(Json(state.dispatch.get_ride_details(ride_id).await?))
}

/// Arbitrate a driver's accept/decline of the outstanding offer.
///
/// POST /api/v1/rides/{ride_id}/driver-response
pub async fn driver_response(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DriverResponseResult>, ApiError> {
    let request: DriverResponseRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    request.validate()?;

    let result = state.dispatch.handle_driver_response(ride_id, &request).await?;
    Ok(Json(result))
}

/// Timeout probe response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTimeoutResponse {
    pub timed_out: bool,
}

/// Resolve the outstanding offer if its deadline passed.
///
/// POST /api/v1/rides/{ride_id}/check-timeout
pub async fn check_timeout(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<CheckTimeoutResponse>, ApiError> {
    let timed_out = state.dispatch.check_timeout(ride_id).await?;
    Ok(Json(CheckTimeoutResponse { timed_out }))
}

/// Cancellation request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRideBody {
    pub reason: Option<String>,
}

/// Cancel a ride; a no-op when it already reached a terminal status.
///
/// POST /api/v1/rides/{ride_id}/cancel
pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
    body: Option<Json<CancelRideBody>>,
) -> Result<Json<RideRequest>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let ride = state.dispatch.cancel_ride(ride_id, reason).await?;
    Ok(Json(ride))
}
