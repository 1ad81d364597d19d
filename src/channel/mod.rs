//! Bidirectional, event-based channel to the training backend.

pub mod event;
pub mod hub;
pub mod memory;
pub mod packet;
pub mod polling;

use serde_json::Value;

use crate::error::ChannelError;

pub use event::{EventKind, MetricSet, ProgressEvent, ServerEvent, TestMetricsEvent};
pub use hub::{EventFilter, EventHub, Subscription};
pub use memory::{MemoryChannel, MemoryConnector};
pub use polling::{SocketIoChannel, SocketIoConnector};

/// An open connection that can send named events and deliver server events
/// to subscribers.
pub trait Channel: Send {
    fn emit(&self, event: &str, payload: &Value) -> Result<(), ChannelError>;

    /// Registers a listener; it stays registered until the returned
    /// `Subscription` is dropped.
    fn subscribe(&self, filter: EventFilter) -> Subscription;

    /// Closes the connection. Calling it twice is harmless.
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Opens channels. Sessions hold one so they can reconnect on every run.
pub trait Connector {
    fn connect(&self) -> Result<Box<dyn Channel>, ChannelError>;
}
