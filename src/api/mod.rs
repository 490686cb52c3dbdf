// Public API for flutter_rust_bridge integration
// This module provides FFI functions for the host app to control audio routing

#![allow(dead_code)] // FFI functions are called from Dart, not detected by Rust analyzer

mod streams;
mod types;


pub use streams::route_events_stream;
pub use types::{RouteEvent, RouteSnapshot};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::config::RouterConfig;
use crate::device::{AudioDevice, FilterProfile};
use crate::engine::backend::RouteHost;
use crate::engine::RouteEngine;
use crate::error::RouteError;

// Re-export error code constants for FFI exposure
pub use crate::error::RouteErrorCodes;

/// Global RouteEngine instance
///
/// The engine itself is an explicit, injectable value (see
/// [crate::engine::RouteEngine]); this static is only the thin FFI binding
/// to one process-wide instance, shared by every plugin owner. Lifecycle
/// remains reference-counted inside the engine.
static ROUTE_ENGINE: Lazy<RouteEngine> = Lazy::new(|| {
    let config = load_platform_config();
    let host = create_host(&config);
    RouteEngine::new(host, config)
});

fn load_platform_config() -> RouterConfig {
    #[cfg(target_os = "android")]
    {
        RouterConfig::load_android()
    }

    #[cfg(not(target_os = "android"))]
    {
        RouterConfig::load()
    }
}

#[cfg(target_os = "android")]
fn create_host(config: &RouterConfig) -> Arc<dyn RouteHost> {
    use crate::engine::backend::AndroidRouteHost;
    Arc::new(AndroidRouteHost::new(Duration::from_millis(
        config.signals.poll_interval_ms,
    )))
}

#[cfg(not(target_os = "android"))]
fn create_host(config: &RouterConfig) -> Arc<dyn RouteHost> {
    use crate::engine::backend::CpalRouteHost;
    Arc::new(CpalRouteHost::new(Duration::from_millis(
        config.signals.poll_interval_ms,
    )))
}

/// Get the version of the audio router core
#[flutter_rust_bridge::frb(sync)]
pub fn get_version() -> Result<String> {
    Ok(env!("CARGO_PKG_VERSION").to_string())
}

/// Register a plugin owner with the routing engine
///
/// The first acquire performs one-time setup: OS change notifications are
/// subscribed and route state is built from OS truth. Subsequent acquires
/// only bump the owner count, so multiple plugin instances can share the
/// engine safely.
///
/// # Returns
/// * `Ok(())` - Owner registered
/// * `Err(RouteError)` - Setup failed (signal subscription, lock poisoning)
#[flutter_rust_bridge::frb]
pub fn acquire_router() -> Result<(), RouteError> {
    ROUTE_ENGINE.acquire()
}

/// Deregister a plugin owner
///
/// The last release tears the engine down: notifications are unsubscribed,
/// listeners are cleared and any speakerphone override the engine applied
/// is restored. Releasing with no owners is a safe no-op.
#[flutter_rust_bridge::frb]
pub fn release_router() -> Result<(), RouteError> {
    ROUTE_ENGINE.release()
}

/// Request a route change to the device with the given id
///
/// Built-in ids (`builtin_speaker`, `builtin_receiver`) are always valid
/// targets; any other id must be present in the current enumeration.
/// The change is verified asynchronously: if the platform did not apply
/// it, a `routingError` event reaches every listener and the state falls
/// back to OS truth.
///
/// # Errors
/// - `NotInitialized` - no owner has acquired the engine
/// - `InvalidDevice` - id unknown or not currently connected
/// - `AudioManager` - the platform call failed
#[flutter_rust_bridge::frb]
pub fn request_device(device_id: String) -> Result<(), RouteError> {
    ROUTE_ENGINE.request_device(&device_id)
}

/// List currently available output devices
///
/// Always contains the two built-in devices first. The filter profile
/// governs which raw OS device types are surfaced (`communication`
/// excludes media-only paths such as Bluetooth A2DP).
#[flutter_rust_bridge::frb(sync)]
pub fn list_available_devices(filter: FilterProfile) -> Result<Vec<AudioDevice>, RouteError> {
    ROUTE_ENGINE.list_available_devices(filter)
}

/// Get the route state as of the last completed reconciliation
#[flutter_rust_bridge::frb(sync)]
pub fn current_route() -> Result<RouteSnapshot, RouteError> {
    ROUTE_ENGINE.current_snapshot()
}

/// Get RouteErrorCodes as a structured object with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_route_error_codes() -> RouteErrorCodes {
    RouteErrorCodes {}
}
