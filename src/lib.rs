// SPDX-License-Identifier: GPL-3.0-only

//! Material sorter - camera, classifier and indicator LEDs on one board
//!
//! Press the button (or tap the screen), a frame is captured, classified as
//! paper, metal or plastic, the label is shown and the matching LED lights.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Orchestrator, readiness gate and worker-owned session
//! - [`backends`]: Camera capture, sysfs GPIO and the push-button driver
//! - [`media`]: Sensor frame decoding and conversion to the model input
//! - [`classifier`]: The image classifier
//! - [`indicator`]: Category LEDs
//! - [`board`]: Board pin tables
//! - [`config`]: User configuration handling
//! - [`terminal`]: Terminal display surface
//! - [`worker`]: Serial background worker thread
//!
//! # Example
//!
//! ```ignore
//! // Typically run on the device via:
//! // material-sorter run
//! ```

pub mod app;
pub mod backends;
pub mod board;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod errors;
pub mod indicator;
pub mod media;
pub mod terminal;
pub mod worker;

// Re-export commonly used types
pub use app::{Orchestrator, OrchestratorSettings, UiUpdate};
pub use classifier::ClassificationResult;
pub use config::Config;
pub use errors::{AppError, AppResult};
