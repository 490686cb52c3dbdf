//! Wire types shared with the transport layer.
//!
//! Field names and the device id/kind strings are part of the wire
//! contract and must remain stable.

use serde::{Deserialize, Serialize};

use crate::device::AudioDevice;

/// A consistent view of the route state at one reconciliation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSnapshot {
    pub available_devices: Vec<AudioDevice>,
    pub selected_device: Option<AudioDevice>,
}

/// Event delivered to route listeners.
///
/// `RoutingError` is out-of-band: it reports a verified route-change
/// failure discovered asynchronously, distinct from state snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RouteEvent {
    #[serde(rename_all = "camelCase")]
    Snapshot { state: RouteSnapshot },
    #[serde(rename_all = "camelCase")]
    RoutingError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = RouteSnapshot {
            available_devices: vec![
                AudioDevice::builtin_speaker(),
                AudioDevice::new("bt-1", DeviceKind::Bluetooth),
            ],
            selected_device: Some(AudioDevice::new("bt-1", DeviceKind::Bluetooth)),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["availableDevices"][0]["id"], "builtin_speaker");
        assert_eq!(json["availableDevices"][1]["kind"], "bluetooth");
        assert_eq!(json["selectedDevice"]["id"], "bt-1");
    }

    #[test]
    fn test_empty_selection_serializes_as_null() {
        let snapshot = RouteSnapshot {
            available_devices: vec![],
            selected_device: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["selectedDevice"].is_null());
    }

    #[test]
    fn test_routing_error_is_tagged() {
        let event = RouteEvent::RoutingError {
            message: "route change to 'bt-1' was not applied".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "routingError");
        assert!(json["message"].as_str().unwrap().contains("bt-1"));
    }
}
