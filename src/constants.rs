// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Input size of the classifier (matches the images the model was built from)
pub const MODEL_IMAGE_WIDTH: u32 = 224;
pub const MODEL_IMAGE_HEIGHT: u32 = 224;

/// Capture and result texts shown on the display surface
pub mod texts {
    /// Shown while a capture cycle is in flight
    pub const PROCESSING: &str = "Hold on...";

    /// Shown when the classifier has no confident label
    pub const NO_RESULT: &str = "I don't understand what I see";

    /// Shown once initialization finished
    pub const READY: &str = "Press the button or tap the screen";

    /// Shown before the first frame arrives
    pub const WAITING_FOR_CAPTURE: &str = "No picture yet";
}

/// Category labels, in LED index order
pub mod labels {
    pub const PAPER: &str = "paper";
    pub const METAL: &str = "metal";
    pub const PLASTIC: &str = "plastic";

    pub const ALL: [&str; 3] = [PAPER, METAL, PLASTIC];
}

/// Camera defaults
pub mod camera {
    /// Default V4L2 device
    pub const DEFAULT_DEVICE: &str = "/dev/video0";

    /// Capture resolution requested from the sensor
    pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
    pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

    /// Frames dropped after stream-on while auto exposure settles
    pub const DEFAULT_WARMUP_FRAMES: u32 = 2;

    /// Number of mmap buffers per capture stream
    pub const STREAM_BUFFERS: u32 = 2;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// How long an indicator LED stays lit
    pub const LED_PULSE: Duration = Duration::from_secs(1);

    /// Button input line polling interval
    pub const BUTTON_POLL: Duration = Duration::from_millis(10);

    /// Minimum stable time before a button edge is accepted
    pub const BUTTON_DEBOUNCE: Duration = Duration::from_millis(30);

    /// How long shutdown waits for the worker to answer
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Terminal UI event poll interval
    pub const UI_POLL: Duration = Duration::from_millis(16);

    /// Headless event loop tick
    pub const HEADLESS_TICK: Duration = Duration::from_millis(50);
}

/// Linux sysfs locations
pub mod sysfs {
    /// Default sysfs GPIO root
    pub const GPIO_ROOT: &str = "/sys/class/gpio";

    /// Device tree model string, used to pick a board preset
    pub const DEVICE_TREE_MODEL: &str = "/proc/device-tree/model";
}

/// Supported still-image file formats
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Application directory name under config/cache dirs
    pub const APP_DIR: &str = "material-sorter";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions_case_insensitive() {
        assert!(file_formats::is_image_extension("JPG"));
        assert!(file_formats::is_image_extension("png"));
        assert!(!file_formats::is_image_extension("mp4"));
    }

    #[test]
    fn test_model_image_is_square() {
        assert_eq!(MODEL_IMAGE_WIDTH, MODEL_IMAGE_HEIGHT);
    }
}
