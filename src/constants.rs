// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Calibration payload compatibility constants
///
/// Devices that do not report the resolution their intrinsic matrix was
/// calibrated against use one of two known calibration heights. Which one is
/// picked by comparing a raw matrix element against the smaller height. These
/// literals must stay unchanged to read existing calibration payloads.
pub mod calibration {
    /// Raw-matrix threshold selecting the small calibration baseline
    pub const BASELINE_THRESHOLD: f32 = 256.0;
    /// Calibration height used when the raw element is below the threshold
    pub const SMALL_BASELINE_HEIGHT: f32 = 256.0;
    /// Calibration height used otherwise
    pub const LARGE_BASELINE_HEIGHT: f32 = 640.0;
    /// Raw payload element inspected by the heuristic
    pub const BASELINE_PROBE_INDEX: usize = 5;
}

/// Hue-encoded depth contract shared with the stream encoder and the shader
pub mod depth {
    /// Number of hue cycles the encoder wraps depth over
    pub const HUE_DEPTH_CYCLES: f32 = 3.0;
    /// Scale applied to decoded depth before unprojecting a point
    pub const POINT_DEPTH_SCALE: f32 = 2.0;
    /// Guards the hue division when chroma is zero
    pub const HUE_EPSILON: f32 = 1.0e-10;
    /// Byte offset of the red channel inside a captured 4-byte pixel
    pub const CAPTURE_CHANNEL_OFFSET: usize = 1;
}

/// Discovery / signaling HTTP endpoints
pub mod signaling {
    use std::time::Duration;

    pub const OFFER_PATH: &str = "/getOffer";
    pub const ANSWER_PATH: &str = "/answer";
    pub const METADATA_PATH: &str = "/metadata";
    /// Device address used when none is configured
    pub const DEFAULT_PEER_ADDRESS: &str = "192.168.0.18";
    /// Per-request timeout for signaling calls
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Frame loop timing
pub mod timing {
    use std::time::Duration;

    /// Minimum spacing between per-frame callbacks
    pub const FRAME_CALLBACK_INTERVAL: Duration = Duration::from_secs(1);
    /// Polling interval for tracks that do not notify on new frames
    pub const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(16);
}

/// Renderable defaults
pub mod rendering {
    /// Number of instances in sphere mode
    pub const SPHERE_COUNT: usize = 1000;
    /// Radius of each instanced sphere
    pub const SPHERE_RADIUS: f32 = 0.01;
    /// Orbit target is kept inside [-PAN_LIMIT, PAN_LIMIT] on every axis
    pub const PAN_LIMIT: f32 = 2.0;
    /// Upper bound on a single noise seed
    pub const MAX_NOISE_SEED: f32 = 0.1;
}

/// Preset persistence
pub mod presets {
    /// Key the preset list is stored under
    pub const STORAGE_KEY: &str = "bb-gui-presets";
    /// Entry shown first in preset pickers
    pub const NONE_PRESET: &str = "None";
}

/// Recorded-video embedded metadata marker
pub const EMBEDDED_METADATA_MARKER: &[u8] = b"{\"intrinsic";

/// Timeout used by the CLI when waiting for the first frame
pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_baselines_are_ordered() {
        assert!(calibration::SMALL_BASELINE_HEIGHT < calibration::LARGE_BASELINE_HEIGHT);
        assert_eq!(calibration::BASELINE_THRESHOLD, calibration::SMALL_BASELINE_HEIGHT);
    }

    #[test]
    fn test_version_is_set() {
        assert!(!app_info::version().is_empty());
    }
}
