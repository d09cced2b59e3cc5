//! Background jobs.

pub mod hot_store_cleanup;
pub mod offer_timeouts;
pub mod pool_metrics;
pub mod scheduler;

pub use hot_store_cleanup::HotStoreCleanupJob;
pub use offer_timeouts::OfferTimeoutJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
