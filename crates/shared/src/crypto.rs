//! Cryptographic utilities for idempotency key and request hashing.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes a deterministic fingerprint for an HTTP request.
///
/// Two requests with the same method, path, and body always produce the
/// same fingerprint; it is used to detect idempotency-key reuse with a
/// different payload.
pub fn request_fingerprint(method: &str, path: &str, body: &str) -> String {
    sha256_hex(&format!("{}|{}|{}", method, path, body))
}
