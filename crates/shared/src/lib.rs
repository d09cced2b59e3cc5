//! Shared utilities and common types for the ridehail backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Geospatial primitives (haversine distance, grid cells, region inference)
//! - Cryptographic utilities (request fingerprinting)
//! - Common validation logic

pub mod crypto;
pub mod geo;
pub mod validation;
