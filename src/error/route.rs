// Routing error types and constants

use crate::error::ErrorCode;
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Routing error code constants exposed to Dart via FFI
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and Dart. The flutter_rust_bridge will automatically
/// generate corresponding Dart constants.
///
/// Error code range: 2001-2004
#[frb(unignore)]
pub struct RouteErrorCodes {}

#[frb]
impl RouteErrorCodes {
    /// Operation attempted while the engine has no active owners
    pub const NOT_INITIALIZED: i32 = 2001;

    /// Requested device id is unknown or not currently connected
    pub const INVALID_DEVICE: i32 = 2002;

    /// Underlying platform audio-manager call failed
    pub const AUDIO_MANAGER: i32 = 2003;

    /// Mutex guarding shared route state was poisoned
    pub const LOCK_POISONED: i32 = 2004;

    // Getter methods for FFI exposure (flutter_rust_bridge requires methods not const)

    /// Get NOT_INITIALIZED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn not_initialized() -> i32 {
        Self::NOT_INITIALIZED
    }

    /// Get INVALID_DEVICE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn invalid_device() -> i32 {
        Self::INVALID_DEVICE
    }

    /// Get AUDIO_MANAGER error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn audio_manager() -> i32 {
        Self::AUDIO_MANAGER
    }

    /// Get LOCK_POISONED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn lock_poisoned() -> i32 {
        Self::LOCK_POISONED
    }
}

/// Log a routing error with structured context
///
/// Logs routing errors with the numeric error code, the component where the
/// error occurred and the human-readable message. Non-blocking and will not
/// panic on failure.
pub fn log_route_error(err: &RouteError, context: &str) {
    error!(
        "Routing error in {}: code={}, component=RouteEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Routing-related errors
///
/// These errors cover route-change requests, device enumeration and
/// engine lifecycle operations.
///
/// Error code range: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum RouteError {
    /// Operation attempted while the engine has no active owners
    NotInitialized,

    /// Requested device id is unknown or not currently connected
    InvalidDevice { device_id: String },

    /// Underlying platform audio-manager call failed
    AudioManager { details: String },

    /// Mutex guarding shared route state was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for RouteError {
    fn code(&self) -> i32 {
        match self {
            RouteError::NotInitialized => RouteErrorCodes::NOT_INITIALIZED,
            RouteError::InvalidDevice { .. } => RouteErrorCodes::INVALID_DEVICE,
            RouteError::AudioManager { .. } => RouteErrorCodes::AUDIO_MANAGER,
            RouteError::LockPoisoned { .. } => RouteErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            RouteError::NotInitialized => {
                "Route engine not initialized. Call acquire() first.".to_string()
            }
            RouteError::InvalidDevice { device_id } => {
                format!("Unknown or disconnected audio device: {}", device_id)
            }
            RouteError::AudioManager { details } => {
                format!("Audio manager call failed: {}", details)
            }
            RouteError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RouteError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RouteError {}
