//! Ride request domain model and the request state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::driver::VehicleTier;

// ============================================================================
// Ride Status State Machine
// ============================================================================

/// Status of a ride request in its matching lifecycle.
///
/// Terminal set: ACCEPTED, NO_DRIVERS, EXPIRED, CANCELLED. On match-attempt
/// exhaustion the engine uses EXPIRED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Pending,
    Matching,
    DriverOffered,
    Accepted,
    Declined,
    NoDrivers,
    Expired,
    Cancelled,
}

impl RideStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "PENDING",
            RideStatus::Matching => "MATCHING",
            RideStatus::DriverOffered => "DRIVER_OFFERED",
            RideStatus::Accepted => "ACCEPTED",
            RideStatus::Declined => "DECLINED",
            RideStatus::NoDrivers => "NO_DRIVERS",
            RideStatus::Expired => "EXPIRED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether this status ends the matching lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Accepted
                | RideStatus::NoDrivers
                | RideStatus::Expired
                | RideStatus::Cancelled
        )
    }

    /// Check if transition to target status is valid.
    pub fn can_transition_to(&self, target: RideStatus) -> bool {
        // Rider-initiated cancellation is allowed from any non-terminal status.
        if target == RideStatus::Cancelled {
            return !self.is_terminal();
        }
        match (self, target) {
            (RideStatus::Pending, RideStatus::Matching) => true,
            (RideStatus::Matching, RideStatus::DriverOffered) => true,
            (RideStatus::Matching, RideStatus::NoDrivers) => true,
            (RideStatus::Matching, RideStatus::Expired) => true,
            (RideStatus::DriverOffered, RideStatus::Accepted) => true,
            (RideStatus::DriverOffered, RideStatus::Declined) => true,
            (RideStatus::DriverOffered, RideStatus::Matching) => true,
            (RideStatus::DriverOffered, RideStatus::Expired) => true,
            (RideStatus::Declined, RideStatus::Matching) => true,
            (RideStatus::Declined, RideStatus::Expired) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RideStatus::Pending),
            "MATCHING" => Ok(RideStatus::Matching),
            "DRIVER_OFFERED" => Ok(RideStatus::DriverOffered),
            "ACCEPTED" => Ok(RideStatus::Accepted),
            "DECLINED" => Ok(RideStatus::Declined),
            "NO_DRIVERS" => Ok(RideStatus::NoDrivers),
            "EXPIRED" => Ok(RideStatus::Expired),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            _ => Err(format!("Invalid ride status: {}", s)),
        }
    }
}

/// Payment method selected at quote time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Wallet,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::Wallet => "WALLET",
            PaymentMethod::Cash => "CASH",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD" => Ok(PaymentMethod::Card),
            "WALLET" => Ok(PaymentMethod::Wallet),
            "CASH" => Ok(PaymentMethod::Cash),
            _ => Err(format!(
                "Invalid payment method: {}. Must be one of: CARD, WALLET, CASH",
                s
            )),
        }
    }
}

// ============================================================================
// Core Model
// ============================================================================

/// A geographic point in request/response payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

/// A ride request as persisted in the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub id: Uuid,
    pub rider_id: String,
    pub pickup: Coordinates,
    pub destination: Coordinates,
    pub tier: VehicleTier,
    pub payment_method: PaymentMethod,
    pub status: RideStatus,
    pub surge_multiplier: f64,
    pub estimated_fare: f64,
    pub match_attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_offer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request payload for creating a ride request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    #[validate(length(min = 1, max = 64, message = "riderId must be 1-64 characters"))]
    pub rider_id: String,

    #[validate(nested)]
    pub pickup: Coordinates,

    #[validate(nested)]
    pub destination: Coordinates,

    pub tier: VehicleTier,

    pub payment_method: PaymentMethod,
}

/// Action a driver takes on an outstanding offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverResponseAction {
    Accept,
    Decline,
}

/// Request payload for a driver's response to an offer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DriverResponseRequest {
    #[validate(length(min = 1, max = 64, message = "driverId must be 1-64 characters"))]
    pub driver_id: String,

    pub action: DriverResponseAction,

    #[validate(length(max = 200, message = "reason must be at most 200 characters"))]
    pub reason: Option<String>,
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Matched-driver summary embedded in dispatch responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedDriver {
    pub driver_id: String,
    pub distance_km: f64,
    pub eta_minutes: u32,
}

/// Response payload for ride creation (also the idempotency-cached shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequestResponse {
    pub id: Uuid,
    pub status: RideStatus,
    pub rider_id: String,
    pub pickup: Coordinates,
    pub destination: Coordinates,
    pub tier: VehicleTier,
    pub surge_multiplier: f64,
    pub estimated_fare: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_driver: Option<MatchedDriver>,
    pub match_attempts: i32,
    pub events_published: bool,
}

/// How a driver response (or implicit timeout) was arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchOutcome {
    /// The driver confirmed; terminal for the matcher.
    Accepted,
    /// The offer was resolved and a new driver holds the next offer.
    Reassigned,
    /// The offer was resolved and matching is exhausted.
    Expired,
}

/// Outcome of a driver response or timeout arbitration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverResponseResult {
    pub status: DispatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Detail view of a ride request, augmented with the current offer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideDetailsResponse {
    #[serde(flatten)]
    pub ride: RideRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_offer: Option<super::driver_offer::DriverOffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_status_roundtrip() {
        for status in [
            RideStatus::Pending,
            RideStatus::Matching,
            RideStatus::DriverOffered,
            RideStatus::Accepted,
            RideStatus::Declined,
            RideStatus::NoDrivers,
            RideStatus::Expired,
            RideStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RideStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_ride_status_serde() {
        assert_eq!(
            serde_json::to_string(&RideStatus::DriverOffered).unwrap(),
            "\"DRIVER_OFFERED\""
        );
        let parsed: RideStatus = serde_json::from_str("\"NO_DRIVERS\"").unwrap();
        assert_eq!(parsed, RideStatus::NoDrivers);
    }

    #[test]
    fn test_terminal_set() {
        assert!(RideStatus::Accepted.is_terminal());
        assert!(RideStatus::NoDrivers.is_terminal());
        assert!(RideStatus::Expired.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(!RideStatus::Pending.is_terminal());
        assert!(!RideStatus::Matching.is_terminal());
        assert!(!RideStatus::DriverOffered.is_terminal());
        assert!(!RideStatus::Declined.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(RideStatus::Pending.can_transition_to(RideStatus::Matching));
        assert!(RideStatus::Matching.can_transition_to(RideStatus::DriverOffered));
        assert!(RideStatus::DriverOffered.can_transition_to(RideStatus::Accepted));
    }

    #[test]
    fn test_reassignment_transitions() {
        assert!(RideStatus::DriverOffered.can_transition_to(RideStatus::Declined));
        assert!(RideStatus::Declined.can_transition_to(RideStatus::Matching));
        assert!(RideStatus::DriverOffered.can_transition_to(RideStatus::Matching));
        assert!(RideStatus::DriverOffered.can_transition_to(RideStatus::Expired));
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        assert!(RideStatus::Pending.can_transition_to(RideStatus::Cancelled));
        assert!(RideStatus::Matching.can_transition_to(RideStatus::Cancelled));
        assert!(RideStatus::DriverOffered.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Accepted.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Expired.can_transition_to(RideStatus::Cancelled));
    }

    #[test]
    fn test_no_resurrection_from_terminal() {
        for terminal in [
            RideStatus::Accepted,
            RideStatus::NoDrivers,
            RideStatus::Expired,
            RideStatus::Cancelled,
        ] {
            assert!(!terminal.can_transition_to(RideStatus::Matching));
            assert!(!terminal.can_transition_to(RideStatus::DriverOffered));
            assert!(!terminal.can_transition_to(RideStatus::Accepted));
        }
    }

    #[test]
    fn test_payment_method_roundtrip() {
        for method in [PaymentMethod::Card, PaymentMethod::Wallet, PaymentMethod::Cash] {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("BITCOIN".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_create_ride_request_valid() {
        let request = CreateRideRequest {
            rider_id: "rider-1".into(),
            pickup: Coordinates {
                latitude: 12.9716,
                longitude: 77.5946,
            },
            destination: Coordinates {
                latitude: 12.98,
                longitude: 77.61,
            },
            tier: VehicleTier::Economy,
            payment_method: PaymentMethod::Card,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_ride_request_rejects_bad_pickup() {
        let request = CreateRideRequest {
            rider_id: "rider-1".into(),
            pickup: Coordinates {
                latitude: 95.0,
                longitude: 77.5946,
            },
            destination: Coordinates {
                latitude: 12.98,
                longitude: 77.61,
            },
            tier: VehicleTier::Economy,
            payment_method: PaymentMethod::Card,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_ride_request_deserializes_camel_case() {
        let request: CreateRideRequest = serde_json::from_str(
            r#"{
                "riderId": "rider-1",
                "pickup": {"latitude": 12.9716, "longitude": 77.5946},
                "destination": {"latitude": 12.98, "longitude": 77.61},
                "tier": "ECONOMY",
                "paymentMethod": "CASH"
            }"#,
        )
        .unwrap();
        assert_eq!(request.rider_id, "rider-1");
        assert_eq!(request.payment_method, PaymentMethod::Cash);
    }

    #[test]
    fn test_dispatch_outcome_serde() {
        assert_eq!(
            serde_json::to_string(&DispatchOutcome::Reassigned).unwrap(),
            "\"REASSIGNED\""
        );
        assert_eq!(
            serde_json::to_string(&DispatchOutcome::Accepted).unwrap(),
            "\"ACCEPTED\""
        );
    }

    #[test]
    fn test_driver_response_action_serde() {
        let parsed: DriverResponseAction = serde_json::from_str("\"ACCEPT\"").unwrap();
        assert_eq!(parsed, DriverResponseAction::Accept);
        let parsed: DriverResponseAction = serde_json::from_str("\"DECLINE\"").unwrap();
        assert_eq!(parsed, DriverResponseAction::Decline);
        assert!(serde_json::from_str::<DriverResponseAction>("\"MAYBE\"").is_err());
    }
}
