use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error kinds, each mapped to an HTTP status and a stable machine code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Idempotency-Key header is required")]
    MissingIdempotencyKey,

    #[error("Idempotency key was already used with a different request")]
    IdempotencyConflict,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Offer invalid: {0}")]
    OfferInvalid(String),

    #[error("Offer expired")]
    OfferExpired,

    #[error("Ride is being processed by another request")]
    RideBusy,

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code surfaced in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
            ApiError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::OfferInvalid(_) => "OFFER_INVALID",
            ApiError::OfferExpired => "OFFER_EXPIRED",
            ApiError::RideBusy => "RIDE_BUSY",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::MissingIdempotencyKey
            | ApiError::OfferInvalid(_)
            | ApiError::OfferExpired => StatusCode::BAD_REQUEST,
            ApiError::IdempotencyConflict => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RideBusy => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::IdempotencyConflict,
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.clone().unwrap_or_else(|| "invalid value".into())
                    )
                })
            })
            .collect();

        ApiError::Validation(details.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MissingIdempotencyKey.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::IdempotencyConflict.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::OfferInvalid("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::OfferExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::RideBusy.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::ServiceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_stable_codes() {
        assert_eq!(ApiError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(ApiError::RideBusy.code(), "RIDE_BUSY");
        assert_eq!(ApiError::OfferExpired.code(), "OFFER_EXPIRED");
        assert_eq!(
            ApiError::IdempotencyConflict.code(),
            "IDEMPOTENCY_CONFLICT"
        );
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_errors_join_messages() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(custom(function = "shared::validation::validate_latitude"))]
            lat: f64,
        }

        let err: ApiError = Probe { lat: 99.0 }.validate().unwrap_err().into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("lat"));
    }
}
