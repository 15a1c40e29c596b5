// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline stage and UI messages

use crate::classifier::ClassificationResult;
use crate::media::ModelBitmap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Where the capture cycle currently is (diagnostics only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing = 0,
    Ready = 1,
    Capturing = 2,
    Classifying = 3,
    Indicating = 4,
    ShutDown = 5,
}

impl Stage {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Ready,
            2 => Self::Capturing,
            3 => Self::Classifying,
            4 => Self::Indicating,
            5 => Self::ShutDown,
            _ => Self::Initializing,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Capturing => "capturing",
            Self::Classifying => "classifying",
            Self::Indicating => "indicating",
            Self::ShutDown => "shut down",
        };
        write!(f, "{}", name)
    }
}

/// Shared atomic stage
#[derive(Debug, Clone)]
pub struct StageCell {
    stage: Arc<AtomicU8>,
}

impl Default for StageCell {
    fn default() -> Self {
        Self {
            stage: Arc::new(AtomicU8::new(Stage::Initializing as u8)),
        }
    }
}

impl StageCell {
    pub fn get(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Move to `stage`; once shut down the cell never changes again
    pub fn set(&self, stage: Stage) {
        let _ = self
            .stage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != Stage::ShutDown as u8).then_some(stage as u8)
            });
    }

    /// Move to `to` only if still at `from`
    pub fn transition(&self, from: Stage, to: Stage) -> bool {
        self.stage
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Message for the display surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    /// Result-line text while no result is shown ("Hold on...")
    Status(String),
    /// Bitmap that is being classified
    Preview(ModelBitmap),
    /// Classification outcome
    Result(ClassificationResult),
}

/// Sending side of the UI channel
#[derive(Debug, Clone)]
pub struct UiPublisher {
    sender: mpsc::UnboundedSender<UiUpdate>,
}

impl UiPublisher {
    pub fn send(&self, update: UiUpdate) {
        if self.sender.send(update).is_err() {
            debug!("Display surface gone, update dropped");
        }
    }

    pub fn status(&self, text: &str) {
        self.send(UiUpdate::Status(text.to_string()));
    }
}

/// Create the UI channel
pub fn ui_channel() -> (UiPublisher, mpsc::UnboundedReceiver<UiUpdate>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (UiPublisher { sender }, receiver)
}
