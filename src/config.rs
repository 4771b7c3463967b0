// SPDX-License-Identifier: GPL-3.0-only

//! User configuration handling
//!
//! Configuration is stored as JSON under the platform config directory and
//! validated on load: out-of-range values are clamped rather than
//! rejected, so a hand-edited file never prevents startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backends::manager::DevicePolicy;
use crate::constants::{capture, timing, tween};
use crate::errors::{ScanError, ScanResult};

/// Directory name under the platform config directory
const CONFIG_DIR: &str = "scancam";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Minimum interval between recognition calls, in milliseconds
    pub detection_interval_ms: u64,
    /// Exponential smoothing factor applied per render tick
    pub tween_alpha: f32,
    /// Window after which an unseen overlay is removed, in milliseconds
    pub overlay_inactivity_ms: u64,
    /// Default device selection policy
    pub device_policy: DevicePolicy,
    /// When set, only detections of these formats are processed
    pub format_allowlist: Option<Vec<String>>,
    /// Frame rate for the synthetic and file sources
    pub source_fps: u32,
    /// Device the last session streamed from, re-preferred on startup
    pub last_device_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection_interval_ms: timing::DETECTION_INTERVAL_MS,
            tween_alpha: tween::SMOOTHING_ALPHA,
            overlay_inactivity_ms: tween::INACTIVITY_WINDOW_MS,
            device_policy: DevicePolicy::default(),
            format_allowlist: None,
            source_fps: capture::DEFAULT_SOURCE_FPS,
            last_device_id: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory available; using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Config>(&contents) {
                Ok(config) => config.sanitized(),
                Err(err) => {
                    warn!(path = %path.display(), %err, "Ignoring malformed config");
                    Self::default()
                }
            },
            Err(err) => {
                debug!(path = %path.display(), %err, "No config file; using defaults");
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> ScanResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| ScanError::Config("no config directory available".into()))?;
        self.save_to(&path)
    }

    /// Save to an explicit path
    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| ScanError::Config(err.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|err| ScanError::Config(err.to_string()))?;
        std::fs::write(path, contents).map_err(|err| ScanError::Config(err.to_string()))?;
        debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Clamp all values into their valid ranges
    pub fn sanitized(mut self) -> Self {
        self.detection_interval_ms = self.detection_interval_ms.clamp(
            timing::DETECTION_INTERVAL_MIN_MS,
            timing::DETECTION_INTERVAL_MAX_MS,
        );
        self.tween_alpha = self.tween_alpha.clamp(tween::ALPHA_MIN, tween::ALPHA_MAX);
        self.overlay_inactivity_ms = self.overlay_inactivity_ms.clamp(
            tween::INACTIVITY_WINDOW_MIN_MS,
            tween::INACTIVITY_WINDOW_MAX_MS,
        );
        self.source_fps = self
            .source_fps
            .clamp(capture::SOURCE_FPS_MIN, capture::SOURCE_FPS_MAX);
        self
    }

    /// Detection interval as a duration
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    /// Overlay inactivity window as a duration
    pub fn overlay_inactivity(&self) -> Duration {
        Duration::from_millis(self.overlay_inactivity_ms)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clamps_out_of_range_values() {
        let config = Config {
            detection_interval_ms: 7,
            tween_alpha: 3.0,
            overlay_inactivity_ms: 60_000,
            source_fps: 500,
            ..Config::default()
        }
        .sanitized();

        assert_eq!(config.detection_interval_ms, timing::DETECTION_INTERVAL_MIN_MS);
        assert_eq!(config.tween_alpha, tween::ALPHA_MAX);
        assert_eq!(config.overlay_inactivity_ms, tween::INACTIVITY_WINDOW_MAX_MS);
        assert_eq!(config.source_fps, capture::SOURCE_FPS_MAX);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
