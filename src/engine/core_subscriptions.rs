use futures::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::api::{RouteEvent, RouteSnapshot};
use crate::error::RouteError;

use super::{EngineShared, RouteEngine};

impl RouteEngine {
    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    /// Subscribe and wrap the listener in an async stream. The first item
    /// is the current snapshot; the listener is evicted automatically when
    /// the stream is dropped.
    pub async fn route_events_stream(
        &self,
    ) -> Result<impl Stream<Item = RouteEvent> + Unpin, RouteError> {
        let (_handle, rx) = self.subscribe()?;
        Ok(UnboundedReceiverStream::new(rx))
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Whether at least one owner holds the engine (best effort).
    pub fn is_active(&self) -> bool {
        self.shared
            .lock_state()
            .map(|state| state.owners > 0)
            .unwrap_or(false)
    }

    /// Number of owners currently holding the engine.
    pub fn owner_count(&self) -> usize {
        self.shared
            .lock_state()
            .map(|state| state.owners)
            .unwrap_or(0)
    }

    /// The route state as of the last completed reconciliation.
    pub fn current_snapshot(&self) -> Result<RouteSnapshot, RouteError> {
        let state = self.shared.lock_state()?;
        Ok(EngineShared::compose_snapshot(&state))
    }
}
