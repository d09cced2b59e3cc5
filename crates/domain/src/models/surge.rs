//! Surge pricing domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::geo::Cell;
use validator::Validate;

/// Surge reading for a cell, either cached or freshly computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeInfo {
    pub cell: Cell,
    pub multiplier: f64,
    pub supply: u32,
    pub demand: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl SurgeInfo {
    /// Sentinel for a cell with no cached entry: neutral multiplier.
    pub fn neutral(cell: Cell) -> Self {
        Self {
            cell,
            multiplier: 1.0,
            supply: 0,
            demand: 0,
            updated_at: None,
            valid_until: None,
        }
    }
}

/// Request payload for an explicit surge recomputation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CalculateSurgeRequest {
    pub cell: Cell,

    #[validate(length(min = 1, max = 64, message = "region must be 1-64 characters"))]
    pub region: String,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

/// Request payload for a demand increment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IncrementDemandRequest {
    pub cell: Cell,

    #[validate(length(min = 1, max = 64, message = "region must be 1-64 characters"))]
    pub region: String,
}

/// One active surge cell in a region listing, descending by multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeZone {
    pub cell: Cell,
    pub multiplier: f64,
    pub supply: u32,
    pub demand: u32,
    pub updated_at: DateTime<Utc>,
}
