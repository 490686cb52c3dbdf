//! Canonical device kinds and the raw-output classification table.
//!
//! Classification is a pure function of an OS-reported raw type plus the
//! active filter profile; it never depends on history. The kind strings are
//! part of the wire contract with the transport layer and must not change.

use serde::{Deserialize, Serialize};

/// Canonical kind of an output device (closed enumeration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "builtin_speaker")]
    BuiltinSpeaker,
    #[serde(rename = "builtin_receiver")]
    BuiltinReceiver,
    #[serde(rename = "bluetooth")]
    Bluetooth,
    #[serde(rename = "wiredHeadset")]
    WiredHeadset,
    #[serde(rename = "usb")]
    Usb,
    #[serde(rename = "carAudio")]
    CarAudio,
    #[serde(rename = "airplay")]
    Airplay,
    #[serde(rename = "unknown")]
    Unknown,
}

impl DeviceKind {
    /// Stable wire string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::BuiltinSpeaker => "builtin_speaker",
            DeviceKind::BuiltinReceiver => "builtin_receiver",
            DeviceKind::Bluetooth => "bluetooth",
            DeviceKind::WiredHeadset => "wiredHeadset",
            DeviceKind::Usb => "usb",
            DeviceKind::CarAudio => "carAudio",
            DeviceKind::Airplay => "airplay",
            DeviceKind::Unknown => "unknown",
        }
    }

    /// Whether this kind is one of the two built-in sinks.
    pub fn is_builtin(&self) -> bool {
        matches!(self, DeviceKind::BuiltinSpeaker | DeviceKind::BuiltinReceiver)
    }
}

/// Raw output path type as reported by the platform, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawOutputKind {
    BuiltinSpeaker,
    BuiltinEarpiece,
    /// Bluetooth SCO (hands-free / telephony profile)
    BluetoothSco,
    /// Bluetooth A2DP (media profile)
    BluetoothA2dp,
    WiredHeadset,
    WiredHeadphones,
    UsbHeadset,
    UsbDevice,
    CarAudio,
    Airplay,
    Hdmi,
    LineOut,
    Other,
}

/// Governs which raw OS device types the enumerator surfaces.
///
/// Coverage is strictly nested: `All` ⊇ `Media` ⊇ `Communication` for any
/// given OS snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterProfile {
    /// Devices usable for two-way call audio (SCO, wired, USB headsets, car).
    Communication,
    /// Everything in `Communication` plus media-only sinks (A2DP, AirPlay).
    Media,
    /// Every raw type that maps to a canonical kind.
    All,
}

/// Map a raw output type to its canonical kind under a filter profile.
///
/// Returns `None` when the raw type is excluded by the profile or has no
/// canonical kind; such entries are dropped from availability snapshots
/// rather than surfaced as `unknown`.
pub fn classify(raw: RawOutputKind, filter: FilterProfile) -> Option<DeviceKind> {
    use FilterProfile::*;
    use RawOutputKind::*;

    match raw {
        BuiltinSpeaker => Some(DeviceKind::BuiltinSpeaker),
        BuiltinEarpiece => Some(DeviceKind::BuiltinReceiver),
        BluetoothSco => Some(DeviceKind::Bluetooth),
        // A2DP is a media-only profile: selectable for playback routing but
        // excluded from call routing under the communication filter.
        BluetoothA2dp => match filter {
            Communication => None,
            Media | All => Some(DeviceKind::Bluetooth),
        },
        WiredHeadset | WiredHeadphones => Some(DeviceKind::WiredHeadset),
        UsbHeadset => Some(DeviceKind::Usb),
        UsbDevice => match filter {
            Communication => None,
            Media | All => Some(DeviceKind::Usb),
        },
        CarAudio => Some(DeviceKind::CarAudio),
        Airplay => match filter {
            Communication => None,
            Media | All => Some(DeviceKind::Airplay),
        },
        // Known to the OS but with no canonical kind; hidden from
        // availability under every profile.
        Hdmi | LineOut | Other => None,
    }
}

/// Classify the currently active output path.
///
/// Unlike [classify], this is total: an active route the table cannot name
/// is surfaced as [DeviceKind::Unknown], so `selected` is never silently
/// empty while the OS reports some active route.
pub fn classify_active(raw: RawOutputKind) -> DeviceKind {
    classify(raw, FilterProfile::All).unwrap_or(DeviceKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_RAW: [RawOutputKind; 13] = [
        RawOutputKind::BuiltinSpeaker,
        RawOutputKind::BuiltinEarpiece,
        RawOutputKind::BluetoothSco,
        RawOutputKind::BluetoothA2dp,
        RawOutputKind::WiredHeadset,
        RawOutputKind::WiredHeadphones,
        RawOutputKind::UsbHeadset,
        RawOutputKind::UsbDevice,
        RawOutputKind::CarAudio,
        RawOutputKind::Airplay,
        RawOutputKind::Hdmi,
        RawOutputKind::LineOut,
        RawOutputKind::Other,
    ];

    #[test]
    fn test_wire_strings_are_stable() {
        assert_eq!(DeviceKind::BuiltinSpeaker.as_str(), "builtin_speaker");
        assert_eq!(DeviceKind::BuiltinReceiver.as_str(), "builtin_receiver");
        assert_eq!(DeviceKind::Bluetooth.as_str(), "bluetooth");
        assert_eq!(DeviceKind::WiredHeadset.as_str(), "wiredHeadset");
        assert_eq!(DeviceKind::Usb.as_str(), "usb");
        assert_eq!(DeviceKind::CarAudio.as_str(), "carAudio");
        assert_eq!(DeviceKind::Airplay.as_str(), "airplay");
        assert_eq!(DeviceKind::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_serde_matches_wire_strings() {
        for kind in [
            DeviceKind::BuiltinSpeaker,
            DeviceKind::BuiltinReceiver,
            DeviceKind::Bluetooth,
            DeviceKind::WiredHeadset,
            DeviceKind::Usb,
            DeviceKind::CarAudio,
            DeviceKind::Airplay,
            DeviceKind::Unknown,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_a2dp_excluded_from_communication() {
        assert_eq!(
            classify(RawOutputKind::BluetoothA2dp, FilterProfile::Communication),
            None
        );
        assert_eq!(
            classify(RawOutputKind::BluetoothA2dp, FilterProfile::Media),
            Some(DeviceKind::Bluetooth)
        );
        assert_eq!(
            classify(RawOutputKind::BluetoothA2dp, FilterProfile::All),
            Some(DeviceKind::Bluetooth)
        );
    }

    #[test]
    fn test_sco_included_in_all_profiles() {
        for filter in [
            FilterProfile::Communication,
            FilterProfile::Media,
            FilterProfile::All,
        ] {
            assert_eq!(
                classify(RawOutputKind::BluetoothSco, filter),
                Some(DeviceKind::Bluetooth)
            );
        }
    }

    #[test]
    fn test_profile_coverage_is_nested() {
        // all ⊇ media ⊇ communication, per raw type
        for raw in ALL_RAW {
            let comm = classify(raw, FilterProfile::Communication);
            let media = classify(raw, FilterProfile::Media);
            let all = classify(raw, FilterProfile::All);

            if comm.is_some() {
                assert!(media.is_some(), "{:?} in communication but not media", raw);
            }
            if media.is_some() {
                assert!(all.is_some(), "{:?} in media but not all", raw);
            }
        }
    }

    #[test]
    fn test_classification_is_pure() {
        // Same inputs, same outputs, regardless of call order
        let first = classify(RawOutputKind::UsbDevice, FilterProfile::Media);
        let _ = classify(RawOutputKind::BluetoothA2dp, FilterProfile::Communication);
        let second = classify(RawOutputKind::UsbDevice, FilterProfile::Media);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unmappable_raw_types_are_dropped() {
        for raw in [RawOutputKind::Hdmi, RawOutputKind::LineOut, RawOutputKind::Other] {
            assert_eq!(classify(raw, FilterProfile::All), None);
        }
    }

    #[test]
    fn test_classify_active_is_total() {
        for raw in ALL_RAW {
            // Never panics, and falls back to Unknown for unmappable types
            let kind = classify_active(raw);
            if classify(raw, FilterProfile::All).is_none() {
                assert_eq!(kind, DeviceKind::Unknown);
            }
        }
    }
}
