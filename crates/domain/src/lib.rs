//! Domain layer for the ridehail backend.
//!
//! This crate contains:
//! - Domain models (ride requests, driver offers, drivers, surge)
//! - The typed event vocabulary and the event publisher abstraction

pub mod models;
pub mod services;
