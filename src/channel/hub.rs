use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use crate::channel::event::{EventKind, ServerEvent};

/// Which events a subscription wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Only(EventKind),
}

impl EventFilter {
    fn accepts(self, event: &ServerEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(kind) => event.kind() == kind,
        }
    }
}

struct Listener {
    id: u64,
    filter: EventFilter,
    tx: Sender<ServerEvent>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Fans channel events out to every live subscription, preserving order.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub::default()
    }

    /// Registers a listener. Events dispatched after this call are queued on
    /// the returned `Subscription` until it is drained or dropped.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(Listener { id, filter, tx });
        Subscription { id, rx, hub: Arc::downgrade(&self.inner) }
    }

    pub fn dispatch(&self, event: ServerEvent) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log::trace!("dispatching {:?} to {} listener(s)", event.kind(), inner.listeners.len());
        // A send only fails if the receiver is gone; forget such listeners.
        inner
            .listeners
            .retain(|l| !l.filter.accepts(&event) || l.tx.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).listeners.len()
    }
}

/// A registered listener. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: Receiver<ServerEvent>,
    hub: Weak<Mutex<HubInner>>,
}

impl Subscription {
    /// Next queued event, without blocking.
    pub fn try_next(&self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<ServerEvent> {
        self.rx.try_iter().collect()
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ServerEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            let mut inner = hub.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.retain(|l| l.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_dispatch_order() {
        let hub = EventHub::new();
        let sub = hub.subscribe(EventFilter::All);
        hub.dispatch(ServerEvent::Connected);
        hub.dispatch(ServerEvent::Complete);
        assert_eq!(sub.drain(), vec![ServerEvent::Connected, ServerEvent::Complete]);
        assert_eq!(sub.try_next(), None);
    }

    #[test]
    fn filters_select_by_kind() {
        let hub = EventHub::new();
        let only_complete = hub.subscribe(EventFilter::Only(EventKind::Complete));
        hub.dispatch(ServerEvent::Connected);
        hub.dispatch(ServerEvent::Complete);
        assert_eq!(only_complete.drain(), vec![ServerEvent::Complete]);
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let hub = EventHub::new();
        let keep = hub.subscribe(EventFilter::All);
        {
            let _scoped = hub.subscribe(EventFilter::All);
            assert_eq!(hub.listener_count(), 2);
        }
        assert_eq!(hub.listener_count(), 1);
        hub.dispatch(ServerEvent::Connected);
        assert_eq!(keep.drain().len(), 1);
    }
}
