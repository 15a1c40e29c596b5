// SPDX-License-Identifier: GPL-3.0-only

//! Hardware the orchestrator is wired to
//!
//! The orchestrator only sees this trait; tests substitute fakes.

use crate::backends::camera::{CaptureDevice, FrameSize, StillImageCamera, V4l2Camera};
use crate::backends::gpio::{InputLine, SysfsGpio};
use crate::board::BoardConfig;
use crate::classifier::{CentroidClassifier, Classifier};
use crate::config::{CameraSource, Config};
use crate::errors::{AppResult, ModelLoadError};
use crate::indicator::{Category, LedSet};
use tracing::info;

/// Factory for the devices a session needs
///
/// Called on the worker thread during initialization, except
/// [`open_button`](Self::open_button) which runs on the caller's thread.
pub trait Platform: Send {
    /// Build (not yet open) the capture device
    fn open_camera(&mut self) -> AppResult<Box<dyn CaptureDevice>>;

    fn load_classifier(&mut self) -> Result<Box<dyn Classifier>, ModelLoadError>;

    /// Open the three indicator lines
    fn open_indicators(&mut self) -> AppResult<LedSet>;

    /// Open the push-button line, `Ok(None)` if the board has none
    fn open_button(&mut self) -> AppResult<Option<Box<dyn InputLine>>>;
}

/// Linux devices described by the configuration and board table
pub struct LinuxPlatform {
    config: Config,
    board: BoardConfig,
    gpio: SysfsGpio,
}

impl LinuxPlatform {
    pub fn new(config: Config, board: BoardConfig) -> Self {
        let gpio = SysfsGpio::new(&config.gpio_root);
        Self {
            config,
            board,
            gpio,
        }
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }
}

impl Platform for LinuxPlatform {
    fn open_camera(&mut self) -> AppResult<Box<dyn CaptureDevice>> {
        info!(source = %self.config.camera, "Using camera source");
        Ok(match &self.config.camera {
            CameraSource::V4l2 { device } => Box::new(V4l2Camera::new(
                device,
                FrameSize::new(self.config.capture_width, self.config.capture_height),
                self.config.warmup_frames,
            )),
            CameraSource::Still { path } => Box::new(StillImageCamera::new(path)),
        })
    }

    fn load_classifier(&mut self) -> Result<Box<dyn Classifier>, ModelLoadError> {
        let path = self.config.resolve_model_path();
        Ok(Box::new(CentroidClassifier::from_file(&path)?))
    }

    fn open_indicators(&mut self) -> AppResult<LedSet> {
        // Lines opened before a failure are released by their Drop
        let paper = self
            .gpio
            .open_output(self.board.led_line(Category::Paper), false)?;
        let metal = self
            .gpio
            .open_output(self.board.led_line(Category::Metal), false)?;
        let plastic = self
            .gpio
            .open_output(self.board.led_line(Category::Plastic), false)?;
        Ok(LedSet::new(
            Box::new(paper),
            Box::new(metal),
            Box::new(plastic),
        ))
    }

    fn open_button(&mut self) -> AppResult<Option<Box<dyn InputLine>>> {
        let Some(line) = self.board.button_line() else {
            info!("Board has no push-button");
            return Ok(None);
        };
        let input = self.gpio.open_input(line, self.board.button_active_low)?;
        Ok(Some(Box::new(input)))
    }
}
