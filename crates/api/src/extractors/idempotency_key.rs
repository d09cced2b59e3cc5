//! Idempotency key header extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts},
};
use shared::crypto::sha256_hex;

use crate::error::ApiError;

/// The header name for idempotency keys.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Required idempotency key extracted from request headers.
///
/// The key is hashed with SHA-256 before it is used as a cache key.
/// Requests without the header are rejected with MISSING_IDEMPOTENCY_KEY.
#[derive(Debug, Clone)]
pub struct IdempotencyKey {
    /// The original key value from the header.
    pub original: String,
    /// SHA-256 hash of the key, used as the cache key.
    pub hash: String,
}

impl IdempotencyKey {
    /// Create a new IdempotencyKey from the original value.
    pub fn new(original: String) -> Self {
        let hash = sha256_hex(&original);
        Self { original, hash }
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_name = HeaderName::from_static(IDEMPOTENCY_KEY_HEADER);

        parts
            .headers
            .get(&header_name)
            .and_then(|value| value.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| IdempotencyKey::new(s.to_string()))
            .ok_or(ApiError::MissingIdempotencyKey)
    }
}
