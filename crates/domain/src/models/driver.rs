//! Driver domain model: profile, live status, and heartbeat DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::geo::Cell;
use std::fmt;
use validator::Validate;

// ============================================================================
// Enums
// ============================================================================

/// Vehicle tier, used both for a driver's vehicle and for a ride request's
/// requested tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleTier {
    Economy,
    Premium,
    Xl,
}

impl VehicleTier {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleTier::Economy => "ECONOMY",
            VehicleTier::Premium => "PREMIUM",
            VehicleTier::Xl => "XL",
        }
    }
}

impl fmt::Display for VehicleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VehicleTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ECONOMY" => Ok(VehicleTier::Economy),
            "PREMIUM" => Ok(VehicleTier::Premium),
            "XL" => Ok(VehicleTier::Xl),
            _ => Err(format!(
                "Invalid vehicle tier: {}. Must be one of: ECONOMY, PREMIUM, XL",
                s
            )),
        }
    }
}

/// Live availability status of a driver.
///
/// Transitions are unrestricted (caller responsibility); `ON_TRIP` and
/// `OFFLINE` exclude the driver from nearest-neighbour results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Online,
    Offline,
    OnTrip,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Online => "ONLINE",
            DriverStatus::Offline => "OFFLINE",
            DriverStatus::OnTrip => "ON_TRIP",
        }
    }

    /// Whether a driver in this status may be offered rides.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, DriverStatus::Online)
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(DriverStatus::Online),
            "OFFLINE" => Ok(DriverStatus::Offline),
            "ON_TRIP" => Ok(DriverStatus::OnTrip),
            _ => Err(format!(
                "Invalid driver status: {}. Must be one of: ONLINE, OFFLINE, ON_TRIP",
                s
            )),
        }
    }
}

// ============================================================================
// Core Model
// ============================================================================

/// A driver profile as persisted in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub vehicle_type: VehicleTier,
    pub rating: f64,
    pub acceptance_rate: f64,
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request payload for registering a driver profile.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDriverRequest {
    #[validate(length(min = 1, max = 64, message = "driverId must be 1-64 characters"))]
    pub driver_id: String,

    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,

    pub vehicle_type: VehicleTier,
}

/// Request payload for a driver heartbeat.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationUpdate {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "crate::models::driver::validate_optional_timestamp"))]
    pub timestamp: Option<i64>,

    #[validate(custom(function = "crate::models::driver::validate_optional_heading"))]
    pub heading: Option<f64>,

    #[validate(custom(function = "crate::models::driver::validate_optional_speed"))]
    pub speed: Option<f64>,
}

pub fn validate_optional_timestamp(ts: i64) -> Result<(), validator::ValidationError> {
    shared::validation::validate_timestamp(ts)
}

pub fn validate_optional_heading(heading: f64) -> Result<(), validator::ValidationError> {
    shared::validation::validate_heading(heading)
}

pub fn validate_optional_speed(speed: f64) -> Result<(), validator::ValidationError> {
    shared::validation::validate_speed(speed)
}

/// Request payload for a driver status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverStatusRequest {
    pub status: DriverStatus,
}

/// Query parameters for a nearest-neighbour search.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_radius_km"))]
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,

    pub region: String,

    pub vehicle_type: Option<VehicleTier>,

    #[validate(custom(function = "shared::validation::validate_nearby_limit"))]
    #[serde(default = "default_nearby_limit")]
    pub limit: u32,
}

fn default_radius_km() -> f64 {
    5.0
}

fn default_nearby_limit() -> u32 {
    20
}

// ============================================================================
// Response DTOs
// ============================================================================

/// One driver in a nearest-neighbour result, ascending by distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDriver {
    pub driver_id: String,
    pub distance_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub vehicle_type: VehicleTier,
    pub status: DriverStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Response payload for a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdateResponse {
    pub success: bool,
    pub driver_id: String,
    pub cell: Cell,
    pub region: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_vehicle_tier_roundtrip() {
        for tier in [VehicleTier::Economy, VehicleTier::Premium, VehicleTier::Xl] {
            assert_eq!(tier.as_str().parse::<VehicleTier>().unwrap(), tier);
        }
    }

    #[test]
    fn test_vehicle_tier_serde() {
        assert_eq!(
            serde_json::to_string(&VehicleTier::Xl).unwrap(),
            "\"XL\""
        );
        let parsed: VehicleTier = serde_json::from_str("\"ECONOMY\"").unwrap();
        assert_eq!(parsed, VehicleTier::Economy);
    }

    #[test]
    fn test_vehicle_tier_from_str_invalid() {
        assert!("economy".parse::<VehicleTier>().is_err());
        assert!("SUV".parse::<VehicleTier>().is_err());
    }

    #[test]
    fn test_driver_status_roundtrip() {
        for status in [
            DriverStatus::Online,
            DriverStatus::Offline,
            DriverStatus::OnTrip,
        ] {
            assert_eq!(status.as_str().parse::<DriverStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_driver_status_serde() {
        assert_eq!(
            serde_json::to_string(&DriverStatus::OnTrip).unwrap(),
            "\"ON_TRIP\""
        );
    }

    #[test]
    fn test_only_online_is_dispatchable() {
        assert!(DriverStatus::Online.is_dispatchable());
        assert!(!DriverStatus::Offline.is_dispatchable());
        assert!(!DriverStatus::OnTrip.is_dispatchable());
    }

    #[test]
    fn test_location_update_valid() {
        let update = DriverLocationUpdate {
            latitude: 12.9716,
            longitude: 77.5946,
            timestamp: Some(Utc::now().timestamp_millis()),
            heading: Some(182.0),
            speed: Some(11.4),
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_location_update_invalid_latitude() {
        let update = DriverLocationUpdate {
            latitude: 91.0,
            longitude: 77.5946,
            timestamp: None,
            heading: None,
            speed: None,
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_location_update_invalid_heading() {
        let update = DriverLocationUpdate {
            latitude: 12.9716,
            longitude: 77.5946,
            timestamp: None,
            heading: Some(361.0),
            speed: None,
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_nearby_query_defaults() {
        let query: NearbyQuery = serde_json::from_str(
            r#"{"latitude":12.97,"longitude":77.59,"region":"bangalore"}"#,
        )
        .unwrap();
        assert_eq!(query.radius_km, 5.0);
        assert_eq!(query.limit, 20);
        assert!(query.vehicle_type.is_none());
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_nearby_query_rejects_oversized_radius() {
        let query: NearbyQuery = serde_json::from_str(
            r#"{"latitude":12.97,"longitude":77.59,"region":"bangalore","radiusKm":80.0}"#,
        )
        .unwrap();
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_register_driver_request_validation() {
        let ok = RegisterDriverRequest {
            driver_id: "drv-1001".into(),
            name: "Asha".into(),
            vehicle_type: VehicleTier::Economy,
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterDriverRequest {
            driver_id: "".into(),
            name: "Asha".into(),
            vehicle_type: VehicleTier::Economy,
        };
        assert!(bad.validate().is_err());
    }
}
