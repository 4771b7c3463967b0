// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Render tick period (~60 Hz driver pulse)
    pub const RENDER_TICK: Duration = Duration::from_millis(16);

    /// Default minimum interval between recognition calls
    pub const DETECTION_INTERVAL_MS: u64 = 500;

    /// Lower bound for the configurable detection interval
    pub const DETECTION_INTERVAL_MIN_MS: u64 = 100;

    /// Upper bound for the configurable detection interval
    pub const DETECTION_INTERVAL_MAX_MS: u64 = 5_000;
}

/// Overlay tweening constants
pub mod tween {
    /// Default exponential smoothing factor per render tick
    pub const SMOOTHING_ALPHA: f32 = 0.15;

    /// Lower bound for the configurable smoothing factor
    pub const ALPHA_MIN: f32 = 0.05;

    /// Upper bound for the configurable smoothing factor
    pub const ALPHA_MAX: f32 = 0.5;

    /// Default window after which an unseen overlay is removed.
    ///
    /// Long enough to tolerate a single missed detection cycle without a
    /// visible pop, short enough that stale overlays do not linger.
    pub const INACTIVITY_WINDOW_MS: u64 = 1_000;

    /// Lower bound for the configurable inactivity window
    pub const INACTIVITY_WINDOW_MIN_MS: u64 = 100;

    /// Upper bound for the configurable inactivity window
    pub const INACTIVITY_WINDOW_MAX_MS: u64 = 10_000;
}

/// Overlay drawing constants
pub mod overlay {
    /// Vertical offset of the value label below a marker, in frame pixels
    pub const LABEL_OFFSET_Y: f32 = 30.0;
}

/// Capture source constants
pub mod capture {
    use std::time::Duration;

    /// Frame delivery channel capacity (kept small for low latency)
    pub const FRAME_CHANNEL_CAPACITY: usize = 10;

    /// Default frame rate for the synthetic and file sources
    pub const DEFAULT_SOURCE_FPS: u32 = 30;

    /// Bounds for the configurable source frame rate
    pub const SOURCE_FPS_MIN: u32 = 1;
    pub const SOURCE_FPS_MAX: u32 = 120;

    /// Default synthetic frame dimensions
    pub const SYNTHETIC_WIDTH: u32 = 320;
    pub const SYNTHETIC_HEIGHT: u32 = 240;

    /// Label substrings that identify a rear-facing camera
    pub const REAR_LABEL_HINTS: &[&str] = &["back", "rear", "environment"];

    /// Duration of one frame at the given rate
    pub fn frame_duration(fps: u32) -> Duration {
        Duration::from_millis(1_000 / fps.max(1) as u64)
    }
}

/// Detection format identifiers
pub mod formats {
    /// Format string emitted by the QR recognition engine
    pub const QR_CODE: &str = "qr_code";
}

/// Supported file formats for the image-directory capture source
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("png"));
        assert!(file_formats::is_image_extension("JPG"));
        assert!(!file_formats::is_image_extension("mp4"));
    }

    #[test]
    fn test_frame_duration() {
        assert_eq!(capture::frame_duration(30).as_millis(), 33);
        // Zero fps must not divide by zero
        assert_eq!(capture::frame_duration(0).as_millis(), 1000);
    }
}
