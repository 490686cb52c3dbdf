//! Device Enumerator: canonical availability view over host enumeration.
//!
//! A read-only, idempotent query layer. The two reserved built-in devices
//! are always prepended; host-reported paths are classified through the
//! fixed table in [crate::device::kind] and de-duplicated by id.

use std::sync::Arc;

use log::debug;

use crate::device::{classify, AudioDevice, FilterProfile};
use crate::engine::backend::{RawOutput, RouteHost};
use crate::error::RouteError;

/// Queries the host for currently known output devices.
pub struct DeviceEnumerator {
    host: Arc<dyn RouteHost>,
}

impl DeviceEnumerator {
    pub fn new(host: Arc<dyn RouteHost>) -> Self {
        Self { host }
    }

    /// List currently available devices under a filter profile.
    ///
    /// Side-effect-free; repeated calls with no intervening OS change yield
    /// identical results.
    pub fn list(&self, filter: FilterProfile) -> Result<Vec<AudioDevice>, RouteError> {
        let outputs = self.host.enumerate().map_err(|err| {
            debug!("[DeviceEnumerator] host enumeration failed: {}", err);
            RouteError::AudioManager {
                details: err.to_string(),
            }
        })?;
        Ok(Self::available_from(&outputs, filter))
    }

    /// Build the canonical availability list from a host snapshot.
    ///
    /// Built-ins first, then classified external paths in OS enumeration
    /// order; entries the profile excludes or the table cannot name are
    /// dropped, and ids are de-duplicated (first occurrence wins).
    pub fn available_from(outputs: &[RawOutput], filter: FilterProfile) -> Vec<AudioDevice> {
        let mut devices = vec![AudioDevice::builtin_speaker(), AudioDevice::builtin_receiver()];

        for output in outputs {
            let Some(kind) = classify(output.kind, filter) else {
                continue;
            };
            if kind.is_builtin() {
                // Reserved ids are already present
                continue;
            }
            if devices.iter().any(|device| device.id == output.id) {
                continue;
            }
            devices.push(AudioDevice::new(output.id.clone(), kind));
        }

        devices
    }

    /// First externally connected, non-built-in device under the profile,
    /// in OS enumeration order.
    pub fn first_external(outputs: &[RawOutput], filter: FilterProfile) -> Option<AudioDevice> {
        outputs.iter().find_map(|output| {
            let kind = classify(output.kind, filter)?;
            if kind.is_builtin() {
                None
            } else {
                Some(AudioDevice::new(output.id.clone(), kind))
            }
        })
    }
}
