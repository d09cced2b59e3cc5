//! Common validation utilities.

use chrono::{TimeZone, Utc};
use validator::ValidationError;

/// Maximum age of a heartbeat timestamp in days.
const MAX_TIMESTAMP_AGE_DAYS: i64 = 7;

/// Maximum allowed future timestamp tolerance in seconds (clock skew).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 300;

/// Smallest accepted nearest-neighbour search radius in kilometres.
pub const MIN_RADIUS_KM: f64 = 0.1;

/// Largest accepted nearest-neighbour search radius in kilometres.
pub const MAX_RADIUS_KM: f64 = 50.0;

/// Largest accepted nearest-neighbour result limit.
pub const MAX_NEARBY_LIMIT: u32 = 50;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lng: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates a search radius in kilometres (0.1 to 50).
pub fn validate_radius_km(radius_km: f64) -> Result<(), ValidationError> {
    if (MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius_km) {
        Ok(())
    } else {
        let mut err = ValidationError::new("radius_range");
        err.message = Some("Radius must be between 0.1 and 50 km".into());
        Err(err)
    }
}

/// Validates a nearest-neighbour result limit (1 to 50).
pub fn validate_nearby_limit(limit: u32) -> Result<(), ValidationError> {
    if (1..=MAX_NEARBY_LIMIT).contains(&limit) {
        Ok(())
    } else {
        let mut err = ValidationError::new("limit_range");
        err.message = Some("Limit must be between 1 and 50".into());
        Err(err)
    }
}

/// Validates that heading is within valid range (0 to 360).
pub fn validate_heading(heading: f64) -> Result<(), ValidationError> {
    if (0.0..=360.0).contains(&heading) {
        Ok(())
    } else {
        let mut err = ValidationError::new("heading_range");
        err.message = Some("Heading must be between 0 and 360".into());
        Err(err)
    }
}

/// Validates that speed is non-negative.
pub fn validate_speed(speed: f64) -> Result<(), ValidationError> {
    if speed >= 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("speed_range");
        err.message = Some("Speed must be non-negative".into());
        Err(err)
    }
}

/// Validates that a timestamp (in milliseconds since epoch) is within
/// acceptable range: not more than 5 minutes in the future, not older than
/// 7 days.
pub fn validate_timestamp(timestamp_millis: i64) -> Result<(), ValidationError> {
    let now = Utc::now();

    let timestamp = match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(ts) => ts,
        None => {
            let mut err = ValidationError::new("timestamp_invalid");
            err.message = Some("Invalid timestamp format".into());
            return Err(err);
        }
    };

    let future_limit = now + chrono::Duration::seconds(MAX_FUTURE_TOLERANCE_SECS);
    if timestamp > future_limit {
        let mut err = ValidationError::new("timestamp_future");
        err.message = Some("Timestamp cannot be in the future".into());
        return Err(err);
    }

    let past_limit = now - chrono::Duration::days(MAX_TIMESTAMP_AGE_DAYS);
    if timestamp < past_limit {
        let mut err = ValidationError::new("timestamp_old");
        err.message = Some("Timestamp cannot be older than 7 days".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_validate_latitude() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(12.9716).is_ok());
        assert!(validate_latitude(90.01).is_err());
        assert!(validate_latitude(-90.01).is_err());
    }

    #[test]
    fn test_validate_longitude() {
        assert!(validate_longitude(0.0).is_ok());
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(180.01).is_err());
        assert!(validate_longitude(-180.01).is_err());
    }

    #[test]
    fn test_validate_radius_km() {
        assert!(validate_radius_km(0.1).is_ok());
        assert!(validate_radius_km(5.0).is_ok());
        assert!(validate_radius_km(50.0).is_ok());
        assert!(validate_radius_km(0.05).is_err());
        assert!(validate_radius_km(50.1).is_err());
        assert!(validate_radius_km(-1.0).is_err());
    }

    #[test]
    fn test_validate_nearby_limit() {
        assert!(validate_nearby_limit(1).is_ok());
        assert!(validate_nearby_limit(50).is_ok());
        assert!(validate_nearby_limit(0).is_err());
        assert!(validate_nearby_limit(51).is_err());
    }

    #[test]
    fn test_validate_heading() {
        assert!(validate_heading(0.0).is_ok());
        assert!(validate_heading(359.9).is_ok());
        assert!(validate_heading(360.0).is_ok());
        assert!(validate_heading(-0.1).is_err());
        assert!(validate_heading(360.1).is_err());
    }

    #[test]
    fn test_validate_speed() {
        assert!(validate_speed(0.0).is_ok());
        assert!(validate_speed(42.5).is_ok());
        assert!(validate_speed(-0.1).is_err());
    }

    #[test]
    fn test_validate_timestamp_now() {
        assert!(validate_timestamp(Utc::now().timestamp_millis()).is_ok());
    }

    #[test]
    fn test_validate_timestamp_future() {
        let ten_minutes = Utc::now().timestamp_millis() + 10 * 60 * 1000;
        assert!(validate_timestamp(ten_minutes).is_err());
    }

    #[test]
    fn test_validate_timestamp_too_old() {
        let eight_days = Utc::now().timestamp_millis() - 8 * 24 * 3600 * 1000;
        assert!(validate_timestamp(eight_days).is_err());
    }
}
