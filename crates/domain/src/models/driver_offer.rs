//! Driver offer domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of a time-bounded offer to a single driver.
///
/// Transitions out of PENDING are monotonic; a resolved offer never
/// returns to PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl OfferStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "PENDING",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Declined => "DECLINED",
            OfferStatus::Expired => "EXPIRED",
        }
    }

    /// Check if transition to target status is valid.
    pub fn can_transition_to(&self, target: OfferStatus) -> bool {
        matches!(
            (self, target),
            (OfferStatus::Pending, OfferStatus::Accepted)
                | (OfferStatus::Pending, OfferStatus::Declined)
                | (OfferStatus::Pending, OfferStatus::Expired)
        )
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OfferStatus::Pending),
            "ACCEPTED" => Ok(OfferStatus::Accepted),
            "DECLINED" => Ok(OfferStatus::Declined),
            "EXPIRED" => Ok(OfferStatus::Expired),
            _ => Err(format!("Invalid offer status: {}", s)),
        }
    }
}

/// A proposal from the engine to a single driver to take a specific ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOffer {
    pub id: Uuid,
    pub ride_request_id: Uuid,
    pub driver_id: String,
    pub status: OfferStatus,
    pub distance_km: f64,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
