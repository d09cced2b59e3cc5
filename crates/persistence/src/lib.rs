//! Persistence layer for the ridehail backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - The hot key-value state: geo index, per-ride locks, offer entries,
//!   demand counters, surge cache, idempotency cache (all in-process,
//!   ephemeral by design)

pub mod db;
pub mod entities;
pub mod hot;
pub mod metrics;
pub mod repositories;
