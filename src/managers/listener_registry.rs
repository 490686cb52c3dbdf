// ListenerRegistry: route event fan-out to subscriber sinks
// Single Responsibility: listener lifecycle and delivery

use std::collections::HashMap;

use log::debug;
use tokio::sync::mpsc;

use crate::api::RouteEvent;

/// Opaque identifier bound 1:1 to a delivery sink.
///
/// Created on subscribe, invalidated on unsubscribe. Delivery to an
/// invalidated handle is a no-op, never an error surfaced to other
/// listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Tracks the unordered set of active route listeners.
///
/// Each listener owns the receiving half of an unbounded channel; the
/// registry keeps the sending half. A sink whose receiver has been dropped
/// is evicted on the next delivery attempt, without disturbing delivery to
/// the remaining listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    sinks: HashMap<u64, mpsc::UnboundedSender<RouteEvent>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener and return its handle plus the event
    /// receiver. The caller is responsible for delivering the initial
    /// snapshot via [ListenerRegistry::send_to].
    pub fn subscribe(&mut self) -> (ListenerHandle, mpsc::UnboundedReceiver<RouteEvent>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.sinks.insert(id, tx);
        debug!("[ListenerRegistry] subscribed listener {}", id);
        (ListenerHandle(id), rx)
    }

    /// Remove a listener. Unknown or already-removed handles are a no-op.
    pub fn unsubscribe(&mut self, handle: ListenerHandle) {
        if self.sinks.remove(&handle.0).is_some() {
            debug!("[ListenerRegistry] unsubscribed listener {}", handle.0);
        }
    }

    /// Deliver an event to one listener only. A closed sink is evicted.
    pub fn send_to(&mut self, handle: ListenerHandle, event: RouteEvent) {
        if let Some(sink) = self.sinks.get(&handle.0) {
            if sink.send(event).is_err() {
                debug!(
                    "[ListenerRegistry] listener {} sink closed, evicting",
                    handle.0
                );
                self.sinks.remove(&handle.0);
            }
        }
    }

    /// Deliver an event to every registered listener. Sinks that fail are
    /// evicted; delivery to the rest always completes.
    pub fn broadcast(&mut self, event: RouteEvent) {
        let mut dead = Vec::new();
        for (id, sink) in &self.sinks {
            if sink.send(event.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            debug!("[ListenerRegistry] listener {} sink closed, evicting", id);
            self.sinks.remove(&id);
        }
    }

    /// Drop every listener (engine teardown).
    pub fn clear(&mut self) {
        self.sinks.clear();
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RouteSnapshot;

    fn snapshot_event() -> RouteEvent {
        RouteEvent::Snapshot {
            state: RouteSnapshot {
                available_devices: vec![],
                selected_device: None,
            },
        }
    }

    #[test]
    fn test_subscribe_and_broadcast() {
        let mut registry = ListenerRegistry::new();
        let (_h1, mut rx1) = registry.subscribe();
        let (_h2, mut rx2) = registry.subscribe();

        registry.broadcast(snapshot_event());

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_send_to_targets_one_listener() {
        let mut registry = ListenerRegistry::new();
        let (h1, mut rx1) = registry.subscribe();
        let (_h2, mut rx2) = registry.subscribe();

        registry.send_to(h1, snapshot_event());

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_unknown_handle_is_noop() {
        let mut registry = ListenerRegistry::new();
        let (handle, _rx) = registry.subscribe();
        registry.unsubscribe(handle);
        // Second removal of the same handle must not panic or error
        registry.unsubscribe(handle);
        registry.unsubscribe(ListenerHandle::from_raw(999));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_evicts_closed_sink_and_reaches_rest() {
        let mut registry = ListenerRegistry::new();
        let (_h1, rx1) = registry.subscribe();
        let (_h2, mut rx2) = registry.subscribe();

        // Simulate a sink failure mid-broadcast
        drop(rx1);
        registry.broadcast(snapshot_event());

        assert!(rx2.try_recv().is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_delivery_to_invalidated_handle_is_noop() {
        let mut registry = ListenerRegistry::new();
        let (handle, mut rx) = registry.subscribe();
        registry.unsubscribe(handle);

        registry.send_to(handle, snapshot_event());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clear_drops_all_listeners() {
        let mut registry = ListenerRegistry::new();
        let (_h1, _rx1) = registry.subscribe();
        let (_h2, _rx2) = registry.subscribe();
        registry.clear();
        assert!(registry.is_empty());
    }
}
