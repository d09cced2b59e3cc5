//! Offer timeout sweep.
//!
//! Polls the fast-lookup offer entries every second and drives the
//! implicit-decline path for offers whose deadline passed. Together with
//! the entry slack window this guarantees every PENDING offer reaches a
//! terminal state within offer TTL plus bounded slack.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::jobs::scheduler::{Job, JobFrequency};
use crate::services::DispatchService;

pub struct OfferTimeoutJob {
    dispatch: Arc<DispatchService>,
}

impl OfferTimeoutJob {
    pub fn new(dispatch: Arc<DispatchService>) -> Self {
        Self { dispatch }
    }
}

#[async_trait::async_trait]
impl Job for OfferTimeoutJob {
    fn name(&self) -> &'static str {
        "offer_timeouts"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let mut processed = 0usize;
        for ride_id in self.dispatch.rides_past_deadline() {
            match self.dispatch.check_timeout(ride_id).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                // a live driver response holds the lock; it resolves the
                // offer itself, the sweep just moves on
                Err(ApiError::RideBusy) => {
                    debug!(ride_id = %ride_id, "Ride locked, skipping timeout sweep");
                }
                Err(e) => {
                    warn!(ride_id = %ride_id, error = %e, "Timeout sweep failed for ride");
                }
            }
        }
        if processed > 0 {
            debug!(processed, "Resolved timed-out offers");
        }
        Ok(())
    }
}
