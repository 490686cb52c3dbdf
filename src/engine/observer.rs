//! Route Observer: turns host change signals into reconciliation events.
//!
//! Registration happens once per lifecycle activation, not once per
//! listener. No business logic lives here: every firing is forwarded to
//! the serialized engine worker, which re-queries OS truth itself.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::backend::{HostError, HostSignalListener, RouteHost, SignalGuard};
use super::core::EngineMsg;

/// Holds the host signal subscription for one engine activation.
/// Dropping it deregisters the subscription.
pub(crate) struct RouteObserver {
    _guard: Box<dyn SignalGuard>,
}

impl RouteObserver {
    /// Subscribe to the host's change sources, posting each firing to the
    /// engine worker.
    pub fn register(
        host: &Arc<dyn RouteHost>,
        events_tx: mpsc::UnboundedSender<EngineMsg>,
    ) -> Result<Self, HostError> {
        let listener: HostSignalListener = Arc::new(move |signal| {
            // The worker may already be gone during shutdown; nothing to do
            let _ = events_tx.send(EngineMsg::Signal(signal));
        });
        let guard = host.start_signals(listener)?;
        Ok(Self { _guard: guard })
    }
}
