//! Backend abstractions for the route reconciliation core.
//!
//! Every platform implements the same small primitive set {enumerate,
//! active_output, set_active, clear_active} plus a change-signal
//! subscription; the reconciliation policy itself lives in one place and
//! treats these primitives as the only source of truth.

use std::fmt;
use std::sync::Arc;

use crate::device::RawOutputKind;

/// An output path as reported by the platform, before classification.
///
/// Built-in paths are not enumerated here; the Device Enumerator prepends
/// the two reserved built-in devices itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub id: String,
    pub kind: RawOutputKind,
}

impl RawOutput {
    pub fn new(id: impl Into<String>, kind: RawOutputKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// The built-in loudspeaker as an active-route report.
    pub fn builtin_speaker() -> Self {
        Self::new(crate::device::BUILTIN_SPEAKER_ID, RawOutputKind::BuiltinSpeaker)
    }

    /// The built-in earpiece as an active-route report.
    pub fn builtin_earpiece() -> Self {
        Self::new(crate::device::BUILTIN_RECEIVER_ID, RawOutputKind::BuiltinEarpiece)
    }
}

/// Routing primitive handed to the platform when applying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Force the built-in loudspeaker.
    Speakerphone,
    /// Select a specific enumerated output path by id.
    Output(String),
}

/// Change notification from the platform.
///
/// Signals are triggers only. The reconciliation engine re-queries host
/// truth on every firing instead of trusting the payload, because
/// OS-delivered payloads race with query calls in practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    DevicesAdded(Vec<String>),
    DevicesRemoved(Vec<String>),
    RouteChanged,
    InterruptionBegan,
    InterruptionEnded,
    CallStateChanged,
}

/// Callback invoked by a host for each change signal.
pub type HostSignalListener = Arc<dyn Fn(HostSignal) + Send + Sync>;

/// Keeps a host signal registration alive; dropping it deregisters.
pub trait SignalGuard: Send {}

/// Error raised by a platform host primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The platform rejected or failed the call.
    Platform(String),
    /// The primitive is not supported on this platform.
    Unsupported(&'static str),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Platform(details) => write!(f, "{}", details),
            HostError::Unsupported(what) => write!(f, "{} is not supported on this platform", what),
        }
    }
}

impl std::error::Error for HostError {}

/// Trait implemented by platform-specific routing hosts.
///
/// All methods are synchronous and expected to return quickly; the engine
/// calls them from inside its serialized mutation domain.
pub trait RouteHost: Send + Sync {
    /// Enumerate externally reachable output paths, in OS order.
    fn enumerate(&self) -> Result<Vec<RawOutput>, HostError>;

    /// The output path the OS currently routes to, if it reports one.
    /// `None` means the implicit default (the earpiece/receiver).
    fn active_output(&self) -> Result<Option<RawOutput>, HostError>;

    /// Apply a routing primitive.
    fn set_active(&self, target: &RouteTarget) -> Result<(), HostError>;

    /// Drop any override applied through [RouteHost::set_active], returning
    /// routing control to the OS default policy.
    fn clear_active(&self) -> Result<(), HostError>;

    /// Register the change-signal listener. At most one registration is
    /// active per host; the returned guard deregisters on drop.
    fn start_signals(&self, listener: HostSignalListener) -> Result<Box<dyn SignalGuard>, HostError>;
}

#[cfg(target_os = "android")]
mod android;
#[cfg(target_os = "android")]
pub use android::AndroidRouteHost;

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use cpal::CpalRouteHost;

mod stub;
pub use stub::{sco_output, wired_output, StubRouteHost};
