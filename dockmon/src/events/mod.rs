//! Live event streaming
//!
//! The [`EventBus`] owns the registry of connected subscribers and fans out
//! build/deploy events to them as text event-stream frames.

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::{BusOptions, EventBus, Subscription};
pub use event::{EventPayload, EventType, Frame};
pub use sink::{EventSink, SinkClosed};
