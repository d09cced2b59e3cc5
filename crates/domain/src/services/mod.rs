//! Domain services.

pub mod events;

pub use events::{
    Event, EventPublisher, EventType, InMemoryEventBus, LoggingEventPublisher,
};
