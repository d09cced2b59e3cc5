//! Surge endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use domain::models::{CalculateSurgeRequest, IncrementDemandRequest, SurgeInfo, SurgeZone};
use shared::geo::Cell;

use crate::app::AppState;
use crate::error::ApiError;

/// Cached surge reading for a cell (neutral sentinel when uncached).
///
/// GET /api/v1/surge/{cell}
pub async fn get_cell(
    State(state): State<AppState>,
    Path(cell): Path<String>,
) -> Result<Json<SurgeInfo>, ApiError> {
    let cell: Cell = cell.parse().map_err(ApiError::Validation)?;
    Ok(Json(state.surge.get_surge_for_cell(cell)))
}

/// Explicitly recompute surge for a cell.
///
/// POST /api/v1/surge/calculate
pub async fn calculate(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SurgeInfo>, ApiError> {
    let request: CalculateSurgeRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    request.validate()?;

    let info = state
        .surge
        .calculate_surge(
            request.cell,
            &request.region,
            request.latitude,
            request.longitude,
        )
        .await;
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionZonesQuery {
    pub min_surge: Option<f64>,
}

/// Active surge zones in a region, descending by multiplier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionZonesResponse {
    pub region: String,
    pub zones: Vec<SurgeZone>,
}

/// GET /api/v1/surge/region/{region}
pub async fn region_zones(
    State(state): State<AppState>,
    Path(region): Path<String>,
    Query(query): Query<RegionZonesQuery>,
) -> Result<Json<RegionZonesResponse>, ApiError> {
    let zones = state
        .surge
        .get_surge_zones_for_region(&region, query.min_surge.unwrap_or(1.0));
    Ok(Json(RegionZonesResponse { region, zones }))
}

/// Demand increment response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandResponse {
    pub cell: Cell,
    pub demand_count: u32,
}

/// Bump the demand counter for a cell.
///
/// POST /api/v1/surge/demand
pub async fn increment_demand(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DemandResponse>, ApiError> {
    let request: IncrementDemandRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    request.validate()?;

    let demand_count = state.surge.increment_demand(request.cell);
    Ok(Json(DemandResponse {
        cell: request.cell,
        demand_count,
    }))
}
