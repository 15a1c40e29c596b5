// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the sorter
//!
//! Only camera, model and configuration errors abort startup. Everything the
//! peripherals raise is logged where it happens and swallowed.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera or GPIO could not be opened/configured
    DeviceUnavailable(String),
    /// Classifier model could not be loaded
    ModelLoad(ModelLoadError),
    /// A capture failed or delivered a malformed frame
    Capture(CaptureError),
    /// GPIO write failure while pulsing an indicator
    IndicatorIo(String),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Capture errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// `take_picture` was called before `initialize` (or after `shutdown`)
    NotInitialized,
    /// The device failed to deliver a frame
    Device(String),
    /// The frame arrived but does not match its declared geometry
    Malformed(String),
}

/// Model loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadError {
    /// Model file could not be read
    Io(String),
    /// Model file is not valid JSON for the expected schema
    Parse(String),
    /// Model parsed but its contents are unusable
    Invalid(String),
}

/// GPIO errors raised by sysfs lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioError {
    /// Export or direction setup failed
    Open { line: u32, reason: String },
    /// Writing or reading `value` failed
    Io { line: u32, reason: String },
    /// Line used after `close`
    Closed { line: u32 },
}

impl GpioError {
    pub fn line(&self) -> u32 {
        match self {
            GpioError::Open { line, .. }
            | GpioError::Io { line, .. }
            | GpioError::Closed { line } => *line,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            AppError::ModelLoad(e) => write!(f, "Model load error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::IndicatorIo(msg) => write!(f, "Indicator I/O error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotInitialized => write!(f, "Capture device not initialized"),
            CaptureError::Device(msg) => write!(f, "Device failed to deliver a frame: {}", msg),
            CaptureError::Malformed(msg) => write!(f, "Malformed frame: {}", msg),
        }
    }
}

impl fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLoadError::Io(msg) => write!(f, "Cannot read model: {}", msg),
            ModelLoadError::Parse(msg) => write!(f, "Cannot parse model: {}", msg),
            ModelLoadError::Invalid(msg) => write!(f, "Invalid model: {}", msg),
        }
    }
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::Open { line, reason } => write!(f, "Cannot open GPIO {}: {}", line, reason),
            GpioError::Io { line, reason } => write!(f, "GPIO {} I/O failed: {}", line, reason),
            GpioError::Closed { line } => write!(f, "GPIO {} is closed", line),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for ModelLoadError {}
impl std::error::Error for GpioError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<ModelLoadError> for AppError {
    fn from(err: ModelLoadError) -> Self {
        AppError::ModelLoad(err)
    }
}

impl From<GpioError> for AppError {
    fn from(err: GpioError) -> Self {
        match err {
            GpioError::Open { .. } => AppError::DeviceUnavailable(err.to_string()),
            GpioError::Io { .. } | GpioError::Closed { .. } => {
                AppError::IndicatorIo(err.to_string())
            }
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for ModelLoadError {
    fn from(err: serde_json::Error) -> Self {
        ModelLoadError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ModelLoadError {
    fn from(err: std::io::Error) -> Self {
        ModelLoadError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_open_failure_is_device_unavailable() {
        let err: AppError = GpioError::Open {
            line: 6,
            reason: "permission denied".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::DeviceUnavailable(_)));
        assert!(err.to_string().contains("GPIO 6"));
    }

    #[test]
    fn test_gpio_write_failure_is_indicator_io() {
        let err: AppError = GpioError::Io {
            line: 19,
            reason: "EIO".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::IndicatorIo(_)));
    }
}
