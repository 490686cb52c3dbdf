// Error types for the audio router
//
// This module defines custom error types for routing operations, providing
// structured error handling with error codes suitable for FFI communication.

mod route;

pub use route::{log_route_error, RouteError, RouteErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
