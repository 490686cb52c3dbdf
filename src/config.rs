//! Configuration management for routing behavior tuning
//!
//! Runtime configuration loading from JSON files, enabling adjustment of
//! the verification delay, default filter profile and desktop watcher poll
//! interval without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::device::FilterProfile;

/// Complete router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub routing: RoutingConfig,
    pub signals: SignalConfig,
}

/// Route request and reconciliation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Delay before a requested route change is verified against OS truth,
    /// in milliseconds. Tuned to typical route-settle latency.
    pub verify_delay_ms: u64,
    /// Filter profile governing availability snapshots and routing policy.
    pub filter_profile: FilterProfile,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            verify_delay_ms: 120,
            filter_profile: FilterProfile::Communication,
        }
    }
}

/// Change-signal source parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Poll interval of the device watcher on hosts without push
    /// notifications, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl Default for RouterConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            signals: SignalConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from JSON file
    ///
    /// Falls back to defaults (with a logged warning) if the file does not
    /// exist or fails to parse.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "[Config] No config file at {:?}, using defaults",
                    path.as_ref()
                );
                Self::default()
            }
        }
    }

    /// Load configuration for desktop platforms
    ///
    /// Honors the AUDIO_ROUTER_CONFIG environment variable, then falls back
    /// to `audio_router.json` in the working directory.
    pub fn load() -> Self {
        let path = std::env::var("AUDIO_ROUTER_CONFIG")
            .unwrap_or_else(|_| "audio_router.json".to_string());
        Self::load_from_file(path)
    }

    /// Load configuration for Android
    ///
    /// The plugin ships no config file on device; defaults apply.
    pub fn load_android() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RouterConfig::default();
        assert_eq!(config.routing.verify_delay_ms, 120);
        assert_eq!(config.routing.filter_profile, FilterProfile::Communication);
        assert_eq!(config.signals.poll_interval_ms, 1000);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = RouterConfig::load_from_file("/nonexistent/audio_router.json");
        assert_eq!(config.routing.verify_delay_ms, 120);
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let mut path = std::env::temp_dir();
        path.push(format!("audio_router_config_{}.json", std::process::id()));

        let mut config = RouterConfig::default();
        config.routing.verify_delay_ms = 250;
        config.routing.filter_profile = FilterProfile::Media;
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = RouterConfig::load_from_file(&path);
        assert_eq!(loaded.routing.verify_delay_ms, 250);
        assert_eq!(loaded.routing.filter_profile, FilterProfile::Media);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_json_falls_back_to_defaults() {
        let mut path = std::env::temp_dir();
        path.push(format!("audio_router_bad_{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();

        let config = RouterConfig::load_from_file(&path);
        assert_eq!(config.routing.verify_delay_ms, 120);

        let _ = fs::remove_file(&path);
    }
}
