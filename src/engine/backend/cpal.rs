//! Desktop routing host backed by cpal.
//!
//! Desktop platforms expose enumeration and the current default output but
//! no supported primitive for moving the route from inside a process, so
//! the mutation half of the trait reports unsupported. Change signals are
//! synthesized by a watcher thread that diffs the device set.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use log::{debug, warn};

use super::{
    HostError, HostSignal, HostSignalListener, RawOutput, RouteHost, RouteTarget, SignalGuard,
};
use crate::device::RawOutputKind;

/// [RouteHost] implementation for non-Android targets.
pub struct CpalRouteHost {
    poll_interval: Duration,
}

impl CpalRouteHost {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn output_names() -> Result<Vec<String>, HostError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|err| HostError::Platform(format!("output enumeration failed: {}", err)))?;

        let mut names = Vec::new();
        for device in devices {
            match device.name() {
                Ok(name) => names.push(name),
                Err(err) => debug!("[CpalRouteHost] unnamed output device skipped: {}", err),
            }
        }
        Ok(names)
    }

    fn default_output_name() -> Option<String> {
        cpal::default_host()
            .default_output_device()
            .and_then(|device| device.name().ok())
    }
}

impl Default for CpalRouteHost {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

/// Best-effort raw classification from a desktop device name.
fn raw_kind_for_name(name: &str) -> RawOutputKind {
    let lower = name.to_ascii_lowercase();
    if lower.contains("airplay") {
        RawOutputKind::Airplay
    } else if lower.contains("sco") || lower.contains("hands-free") || lower.contains("hfp") {
        RawOutputKind::BluetoothSco
    } else if lower.contains("bluetooth") || lower.contains("a2dp") {
        RawOutputKind::BluetoothA2dp
    } else if lower.contains("usb") && lower.contains("headset") {
        RawOutputKind::UsbHeadset
    } else if lower.contains("usb") {
        RawOutputKind::UsbDevice
    } else if lower.contains("headset") {
        RawOutputKind::WiredHeadset
    } else if lower.contains("headphone") {
        RawOutputKind::WiredHeadphones
    } else if lower.contains("hdmi") || lower.contains("displayport") {
        RawOutputKind::Hdmi
    } else if lower.contains("car") {
        RawOutputKind::CarAudio
    } else if lower.contains("speaker") {
        RawOutputKind::BuiltinSpeaker
    } else {
        RawOutputKind::Other
    }
}

impl RouteHost for CpalRouteHost {
    fn enumerate(&self) -> Result<Vec<RawOutput>, HostError> {
        let names = Self::output_names()?;
        Ok(names
            .into_iter()
            .map(|name| {
                let kind = raw_kind_for_name(&name);
                RawOutput::new(name, kind)
            })
            // Built-ins are prepended by the enumerator, not reported here
            .filter(|output| output.kind != RawOutputKind::BuiltinSpeaker)
            .collect())
    }

    fn active_output(&self) -> Result<Option<RawOutput>, HostError> {
        Ok(Self::default_output_name().map(|name| {
            let kind = raw_kind_for_name(&name);
            RawOutput::new(name, kind)
        }))
    }

    fn set_active(&self, _target: &RouteTarget) -> Result<(), HostError> {
        Err(HostError::Unsupported("output selection"))
    }

    fn clear_active(&self) -> Result<(), HostError> {
        Err(HostError::Unsupported("output selection"))
    }

    fn start_signals(&self, listener: HostSignalListener) -> Result<Box<dyn SignalGuard>, HostError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let poll_interval = self.poll_interval;

        thread::spawn(move || {
            let mut known: BTreeSet<String> = match Self::output_names() {
                Ok(names) => names.into_iter().collect(),
                Err(err) => {
                    warn!("[CpalRouteHost] initial enumeration failed: {}", err);
                    BTreeSet::new()
                }
            };
            let mut default_name = Self::default_output_name();

            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(poll_interval);
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                let current: BTreeSet<String> = match Self::output_names() {
                    Ok(names) => names.into_iter().collect(),
                    Err(err) => {
                        debug!("[CpalRouteHost] enumeration failed during poll: {}", err);
                        continue;
                    }
                };

                let added: Vec<String> = current.difference(&known).cloned().collect();
                let removed: Vec<String> = known.difference(&current).cloned().collect();
                if !added.is_empty() {
                    listener(HostSignal::DevicesAdded(added));
                }
                if !removed.is_empty() {
                    listener(HostSignal::DevicesRemoved(removed));
                }
                known = current;

                let default_now = Self::default_output_name();
                if default_now != default_name {
                    listener(HostSignal::RouteChanged);
                    default_name = default_now;
                }
            }
            debug!("[CpalRouteHost] device watcher stopped");
        });

        Ok(Box::new(PollSignalGuard { stop }))
    }
}

struct PollSignalGuard {
    stop: Arc<AtomicBool>,
}

impl SignalGuard for PollSignalGuard {}

impl Drop for PollSignalGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_classification() {
        assert_eq!(
            raw_kind_for_name("WH-1000XM4 Bluetooth"),
            RawOutputKind::BluetoothA2dp
        );
        assert_eq!(
            raw_kind_for_name("Jabra USB Headset"),
            RawOutputKind::UsbHeadset
        );
        assert_eq!(raw_kind_for_name("HDMI Output"), RawOutputKind::Hdmi);
        assert_eq!(
            raw_kind_for_name("Built-in Speakers"),
            RawOutputKind::BuiltinSpeaker
        );
        assert_eq!(raw_kind_for_name("HDA Intel PCH"), RawOutputKind::Other);
    }
}
