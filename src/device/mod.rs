// Device model: canonical kinds, raw-output classification and enumeration

mod enumerator;
mod kind;

pub use enumerator::DeviceEnumerator;
pub use kind::{classify, classify_active, DeviceKind, FilterProfile, RawOutputKind};

use serde::{Deserialize, Serialize};

/// Reserved id for the built-in loudspeaker, always present.
pub const BUILTIN_SPEAKER_ID: &str = "builtin_speaker";

/// Reserved id for the built-in earpiece/receiver, always present.
pub const BUILTIN_RECEIVER_ID: &str = "builtin_receiver";

/// A routable audio output device as exposed over the wire.
///
/// Ids are OS-assigned and stable only within a connection session, except
/// for the two reserved built-in ids which are always considered present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub kind: DeviceKind,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// The built-in loudspeaker device.
    pub fn builtin_speaker() -> Self {
        Self::new(BUILTIN_SPEAKER_ID, DeviceKind::BuiltinSpeaker)
    }

    /// The built-in earpiece/receiver device.
    pub fn builtin_receiver() -> Self {
        Self::new(BUILTIN_RECEIVER_ID, DeviceKind::BuiltinReceiver)
    }

    /// Whether this device is one of the two reserved built-ins.
    pub fn is_builtin(&self) -> bool {
        self.id == BUILTIN_SPEAKER_ID || self.id == BUILTIN_RECEIVER_ID
    }
}
