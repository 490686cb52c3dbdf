// Focused managers owned by the route engine

mod listener_registry;

pub use listener_registry::{ListenerHandle, ListenerRegistry};
