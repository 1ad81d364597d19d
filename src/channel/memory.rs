use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::channel::event::ServerEvent;
use crate::channel::hub::{EventFilter, EventHub, Subscription};
use crate::channel::{Channel, Connector};
use crate::error::ChannelError;

struct Inner {
    hub: EventHub,
    emitted: Mutex<Vec<(String, Value)>>,
    open: AtomicBool,
}

/// In-process channel: the test side pushes server events in, and everything
/// the client emits is recorded.
///
/// Clones share state, so a test can keep one handle while a session owns
/// another.
#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        MemoryChannel {
            inner: Arc::new(Inner {
                hub: EventHub::new(),
                emitted: Mutex::new(Vec::new()),
                open: AtomicBool::new(true),
            }),
        }
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        MemoryChannel::default()
    }

    /// Delivers `event` to subscribers as if the server had sent it.
    pub fn push(&self, event: ServerEvent) {
        self.inner.hub.dispatch(event);
    }

    /// Events emitted by the client so far, oldest first.
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.inner.emitted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.hub.listener_count()
    }
}

impl Channel for MemoryChannel {
    fn emit(&self, event: &str, payload: &Value) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        self.inner
            .emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.to_owned(), payload.clone()));
        Ok(())
    }

    fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.inner.hub.subscribe(filter)
    }

    fn close(&self) {
        self.inner.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }
}

/// Hands out clones of one `MemoryChannel`, or fails every attempt.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    channel: MemoryChannel,
    refuse: bool,
}

impl MemoryConnector {
    pub fn new(channel: MemoryChannel) -> Self {
        MemoryConnector { channel, refuse: false }
    }

    pub fn refusing() -> Self {
        MemoryConnector { channel: MemoryChannel::new(), refuse: true }
    }

    pub fn channel(&self) -> &MemoryChannel {
        &self.channel
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<Box<dyn Channel>, ChannelError> {
        if self.refuse {
            return Err(ChannelError::Transport("connection refused".into()));
        }
        Ok(Box::new(self.channel.clone()))
    }
}
