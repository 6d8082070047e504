// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::rendering::SPHERE_COUNT;
use crate::constants::signaling::{DEFAULT_PEER_ADDRESS, REQUEST_TIMEOUT};
use crate::constants::timing::FRAME_CALLBACK_INTERVAL;
use crate::errors::{AppError, AppResult};
use crate::presets::ViewerOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user config dir
const CONFIG_DIR_NAME: &str = "rgbd-stream";
const CONFIG_FILE_NAME: &str = "config.json";
const PRESETS_FILE_NAME: &str = "presets.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Devices to stream from (one video each)
    pub peer_addresses: Vec<String>,
    /// Options panel state applied at startup
    pub rendering: ViewerOptions,
    /// Per-request timeout for signaling calls
    pub request_timeout_ms: u64,
    /// Minimum spacing of the throttled per-frame callback
    pub frame_callback_interval_ms: u64,
    /// Instance count in sphere mode
    pub sphere_count: usize,
    /// Preset store location (default: next to the config file)
    pub presets_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer_addresses: vec![with_scheme(DEFAULT_PEER_ADDRESS)],
            rendering: ViewerOptions::default(),
            request_timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
            frame_callback_interval_ms: FRAME_CALLBACK_INTERVAL.as_millis() as u64,
            sphere_count: SPHERE_COUNT,
            presets_path: None,
        }
    }
}

impl Config {
    /// `$CONFIG_DIR/rgbd-stream`, or the working directory without one
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(CONFIG_FILE_NAME)
    }

    /// Load the user config, falling back to defaults when there is none
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to encode config: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| AppError::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn frame_callback_interval(&self) -> Duration {
        Duration::from_millis(self.frame_callback_interval_ms)
    }

    pub fn presets_path(&self) -> PathBuf {
        self.presets_path
            .clone()
            .unwrap_or_else(|| Self::default_dir().join(PRESETS_FILE_NAME))
    }
}

/// Parse a comma separated address list
///
/// Empty entries are dropped; entries without a scheme get `http://`.
pub fn parse_peer_addresses(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(with_scheme)
        .collect()
}

fn with_scheme(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peer_addresses() {
        assert_eq!(
            parse_peer_addresses("192.168.0.18, ,10.0.0.2,https://cam.local,"),
            vec![
                "http://192.168.0.18".to_string(),
                "http://10.0.0.2".to_string(),
                "https://cam.local".to_string(),
            ]
        );
        assert!(parse_peer_addresses(" , ").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.peer_addresses, vec!["http://192.168.0.18".to_string()]);
        assert_eq!(config.frame_callback_interval(), Duration::from_secs(1));
        assert_eq!(config.sphere_count, 1000);
    }
}
