use futures::Stream;

use crate::error::RouteError;

use super::{RouteEvent, ROUTE_ENGINE};

/// Stream of route events
///
/// The first item is always the current snapshot, so a new subscriber is
/// never left without initial state. Subsequent items are emitted once per
/// observed state transition, plus out-of-band `routingError` events when
/// a verified route change fails. Dropping the stream unsubscribes the
/// listener.
#[flutter_rust_bridge::frb(ignore)]
pub async fn route_events_stream() -> Result<impl Stream<Item = RouteEvent> + Unpin, RouteError> {
    ROUTE_ENGINE.route_events_stream().await
}
