// SPDX-License-Identifier: GPL-3.0-only

use crate::board::BoardOverrides;
use crate::constants::{app_info, camera, sysfs, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    /// V4L2 capture node
    V4l2 { device: String },
    /// Image file or directory of images
    Still { path: PathBuf },
}

impl Default for CameraSource {
    fn default() -> Self {
        Self::V4l2 {
            device: camera::DEFAULT_DEVICE.to_string(),
        }
    }
}

impl std::fmt::Display for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4l2 { device } => write!(f, "V4L2 {}", device),
            Self::Still { path } => write!(f, "still images at {}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame source
    pub camera: CameraSource,
    /// Capture resolution requested from the sensor
    pub capture_width: u32,
    pub capture_height: u32,
    /// Frames dropped at each stream start
    pub warmup_frames: u32,
    /// Classifier model file; searched in the data directories when unset
    pub model_path: Option<PathBuf>,
    /// Board pin table overrides
    pub board: BoardOverrides,
    /// sysfs GPIO root
    pub gpio_root: PathBuf,
    /// Device-tree model file used for board detection
    pub device_tree_model: PathBuf,
    /// How long an indicator LED stays lit
    pub led_pulse_ms: u64,
    pub button_poll_ms: u64,
    pub button_debounce_ms: u64,
    /// How long shutdown waits for a stuck capture cycle
    pub shutdown_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraSource::default(),
            capture_width: camera::DEFAULT_CAPTURE_WIDTH,
            capture_height: camera::DEFAULT_CAPTURE_HEIGHT,
            warmup_frames: camera::DEFAULT_WARMUP_FRAMES,
            model_path: None,
            board: BoardOverrides::default(),
            gpio_root: PathBuf::from(sysfs::GPIO_ROOT),
            device_tree_model: PathBuf::from(sysfs::DEVICE_TREE_MODEL),
            led_pulse_ms: timing::LED_PULSE.as_millis() as u64,
            button_poll_ms: timing::BUTTON_POLL.as_millis() as u64,
            button_debounce_ms: timing::BUTTON_DEBOUNCE.as_millis() as u64,
            shutdown_timeout_ms: timing::SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Default config file location (`$XDG_CONFIG_HOME/material-sorter/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR).join("config.json"))
    }

    /// Load from `path`, or from the default location if it exists, or defaults
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        info!(path = %path.display(), "Loading config");
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(AppError::Config(format!(
                "capture size {}x{} is empty",
                self.capture_width, self.capture_height
            )));
        }
        if self.button_poll_ms == 0 {
            return Err(AppError::Config("button_poll_ms must be positive".to_string()));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(AppError::Config(
                "shutdown_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Explicit model path, else the first bundled model found
    pub fn resolve_model_path(&self) -> PathBuf {
        if let Some(path) = &self.model_path {
            return path.clone();
        }
        let candidates = model_search_path();
        candidates
            .iter()
            .find(|p| p.exists())
            .or(candidates.last())
            .cloned()
            .unwrap_or_else(|| PathBuf::from("model.json"))
    }

    pub fn led_pulse(&self) -> Duration {
        Duration::from_millis(self.led_pulse_ms)
    }

    pub fn button_poll(&self) -> Duration {
        Duration::from_millis(self.button_poll_ms)
    }

    pub fn button_debounce(&self) -> Duration {
        Duration::from_millis(self.button_debounce_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn model_search_path() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(data) = dirs::data_dir() {
        paths.push(data.join(app_info::APP_DIR).join("model.json"));
    }
    paths.push(PathBuf::from("/usr/share").join(app_info::APP_DIR).join("model.json"));
    paths.push(Path::new(env!("CARGO_MANIFEST_DIR")).join("res/model.json"));
    paths
}
