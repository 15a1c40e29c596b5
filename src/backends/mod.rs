// SPDX-License-Identifier: GPL-3.0-only

//! Hardware access layer
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Orchestrator (app)             │
//! └──────────┬──────────────────────┬───────────┘
//!            │                      │
//! ┌──────────┴──────────┐ ┌─────────┴───────────┐
//! │       Camera        │ │        GPIO         │
//! │  V4L2 / still image │ │ LEDs + push-button  │
//! └─────────────────────┘ └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Capture devices and the capture controller
//! - [`gpio`]: sysfs GPIO input and output lines
//! - [`button`]: Debounced push-button polling thread

pub mod button;
pub mod camera;
pub mod gpio;
