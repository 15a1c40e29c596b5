// SPDX-License-Identifier: GPL-3.0-only

//! Capture devices and the capture controller
//!
//! ```text
//! ┌──────────────────────┐
//! │  Orchestrator (app)  │
//! └──────────┬───────────┘
//!            │ take_picture()
//!            ▼
//! ┌──────────────────────┐        RawFrame posted to the
//! │  CaptureController   │ ─────► worker queue (on_frame)
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureDevice trait  │
//! └──────────┬───────────┘
//!       ┌────┴─────┐
//!       ▼          ▼
//!    ┌──────┐  ┌───────┐
//!    │ V4L2 │  │ Still │
//!    └──────┘  └───────┘
//! ```

pub mod still;
pub mod types;
pub mod v4l2;

pub use still::StillImageCamera;
pub use types::*;
pub use v4l2::V4l2Camera;

use crate::errors::{AppError, AppResult, CaptureError};
use crate::worker::WorkerHandle;
use tracing::{debug, info, warn};

/// A camera that can be opened once and asked for single frames
///
/// Implementations do blocking I/O; they are only driven from the worker
/// thread.
pub trait CaptureDevice: Send {
    /// Human readable device name for logs
    fn name(&self) -> String;

    /// Open and configure the device
    ///
    /// `target` is the resolution the pipeline ultimately needs; the device
    /// picks a capture resolution compatible with it and returns what it
    /// negotiated.
    ///
    /// # Returns
    /// * `Ok(FrameSize)` - Negotiated capture resolution
    /// * `Err(AppError::DeviceUnavailable)` - Device missing or not configurable
    fn open(&mut self, target: FrameSize) -> AppResult<FrameSize>;

    /// Capture one frame (blocking)
    fn capture(&mut self) -> Result<RawFrame, CaptureError>;

    /// Formats the device advertises (diagnostics only)
    fn supported_formats(&self) -> Vec<CaptureFormat>;

    /// Release the device
    fn close(&mut self) -> AppResult<()>;
}

/// Callback invoked on the worker context with each delivered frame
pub type FrameCallback<S> = fn(&mut S, RawFrame);

struct Delivery<S: 'static> {
    context: WorkerHandle<S>,
    on_frame: FrameCallback<S>,
}

/// Owns the camera and turns each `take_picture` into one frame delivery
///
/// The controller does not guard against overlapping requests; the readiness
/// gate upstream does.
pub struct CaptureController<S: 'static> {
    device: Option<Box<dyn CaptureDevice>>,
    dimensions: Option<FrameSize>,
    delivery: Option<Delivery<S>>,
}

impl<S: 'static> Default for CaptureController<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> CaptureController<S> {
    /// Create an uninitialized controller
    pub fn new() -> Self {
        Self {
            device: None,
            dimensions: None,
            delivery: None,
        }
    }

    /// Open `device` for frames compatible with `target`
    ///
    /// Frames captured later are posted to `context` and handed to
    /// `on_frame` there.
    ///
    /// # Returns
    /// * `Ok(FrameSize)` - Negotiated capture resolution
    /// * `Err(AppError::DeviceUnavailable)` - Device could not be opened, or
    ///   negotiated a resolution smaller than `target`
    pub fn initialize(
        &mut self,
        mut device: Box<dyn CaptureDevice>,
        target: FrameSize,
        context: WorkerHandle<S>,
        on_frame: FrameCallback<S>,
    ) -> AppResult<FrameSize> {
        if self.device.is_some() {
            warn!("Capture controller already initialized, reopening");
            self.shutdown();
        }

        let name = device.name();
        info!(device = %name, target = %target, "Opening capture device");

        let negotiated = match device.open(target) {
            Ok(size) => size,
            Err(AppError::DeviceUnavailable(msg)) => {
                return Err(AppError::DeviceUnavailable(msg));
            }
            Err(e) => return Err(AppError::DeviceUnavailable(e.to_string())),
        };

        if !negotiated.covers(target) {
            if let Err(e) = device.close() {
                warn!(device = %name, error = %e, "Failed to close undersized device");
            }
            return Err(AppError::DeviceUnavailable(format!(
                "{} negotiated {} which is smaller than {}",
                name, negotiated, target
            )));
        }

        info!(device = %name, resolution = %negotiated, "Capture device ready");

        self.device = Some(device);
        self.dimensions = Some(negotiated);
        self.delivery = Some(Delivery { context, on_frame });
        Ok(negotiated)
    }

    /// Request a single capture
    ///
    /// On success the frame is queued for `on_frame` on the worker context.
    /// On failure nothing is delivered and the error is returned to the
    /// caller.
    pub fn take_picture(&mut self) -> Result<(), CaptureError> {
        let frame = self.capture_validated()?;

        let Some(delivery) = self.delivery.as_ref() else {
            return Err(CaptureError::NotInitialized);
        };
        debug!(
            width = frame.width,
            height = frame.height,
            format = %frame.format,
            "Frame captured, delivering to worker"
        );
        let on_frame = delivery.on_frame;
        if !delivery.context.post(move |state| on_frame(state, frame)) {
            return Err(CaptureError::Device("worker stopped".to_string()));
        }
        Ok(())
    }

    fn capture_validated(&mut self) -> Result<RawFrame, CaptureError> {
        let (Some(device), Some(expected)) = (self.device.as_mut(), self.dimensions) else {
            return Err(CaptureError::NotInitialized);
        };

        let frame = device.capture()?;

        if frame.size() != expected {
            return Err(CaptureError::Malformed(format!(
                "frame is {}, session negotiated {}",
                frame.size(),
                expected
            )));
        }
        frame.validate().map_err(CaptureError::Malformed)?;
        Ok(frame)
    }

    /// Negotiated raw capture resolution, fixed after `initialize`
    pub fn dimensions(&self) -> Option<FrameSize> {
        self.dimensions
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    /// Formats advertised by the open device
    pub fn supported_formats(&self) -> Vec<CaptureFormat> {
        self.device
            .as_ref()
            .map(|d| d.supported_formats())
            .unwrap_or_default()
    }

    /// Release the device
    ///
    /// Idempotent, and a no-op if `initialize` never succeeded.
    pub fn shutdown(&mut self) {
        self.delivery = None;
        self.dimensions = None;
        if let Some(mut device) = self.device.take() {
            let name = device.name();
            match device.close() {
                Ok(()) => info!(device = %name, "Capture device closed"),
                Err(e) => warn!(device = %name, error = %e, "Failed to close capture device"),
            }
        }
    }
}

impl<S: 'static> Drop for CaptureController<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
