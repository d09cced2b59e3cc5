//! Typed event vocabulary and the event publisher abstraction.
//!
//! Publishing is fire-and-forget: a failed publish is logged and reported to
//! the caller as `false`, and must never fail the dispatch critical path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Event topics, keyed by the id of the entity they concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "ride.requested")]
    RideRequested,
    #[serde(rename = "ride.matched")]
    RideMatched,
    #[serde(rename = "ride.accepted")]
    RideAccepted,
    #[serde(rename = "ride.declined")]
    RideDeclined,
    #[serde(rename = "ride.expired")]
    RideExpired,
    #[serde(rename = "ride.cancelled")]
    RideCancelled,
    #[serde(rename = "driver.location.updated")]
    DriverLocationUpdated,
    #[serde(rename = "driver.status.changed")]
    DriverStatusChanged,
    #[serde(rename = "surge.updated")]
    SurgeUpdated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RideRequested => "ride.requested",
            EventType::RideMatched => "ride.matched",
            EventType::RideAccepted => "ride.accepted",
            EventType::RideDeclined => "ride.declined",
            EventType::RideExpired => "ride.expired",
            EventType::RideCancelled => "ride.cancelled",
            EventType::DriverLocationUpdated => "driver.location.updated",
            EventType::DriverStatusChanged => "driver.status.changed",
            EventType::SurgeUpdated => "surge.updated",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An event envelope as placed on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Id of the entity the event is keyed by (ride, driver, or cell).
    pub key: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, key: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            key: key.into(),
            data,
        }
    }
}

/// Fire-and-forget event publisher.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Returns whether delivery was handed off; `false`
    /// signals a best-effort failure the caller may surface as
    /// `eventsPublished=false`.
    async fn publish(&self, event: Event) -> bool;
}

/// Publisher that emits events to the structured log stream. Stands in for
/// a broker client in development and single-node deployments.
#[derive(Debug, Default)]
pub struct LoggingEventPublisher;

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: Event) -> bool {
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            key = %event.key,
            "Event published"
        );
        tracing::debug!(data = %event.data, "Event payload");
        true
    }
}

/// In-memory recording bus for tests.
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events published for a topic.
    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait::async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: Event) -> bool {
        self.events.lock().unwrap().push(event);
        true
    }
}
