// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 single-frame capture
//!
//! Uses the v4l crate to negotiate a raw (uncompressed) pixel format and
//! grab one frame per request through a short-lived memory-mapped stream.

use super::types::*;
use super::CaptureDevice;
use crate::constants::camera as camera_defaults;
use crate::errors::{AppError, AppResult, CaptureError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Negotiated stream parameters
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    format: PixelFormat,
    size: FrameSize,
    stride: u32,
}

/// A V4L2 video capture node such as `/dev/video0`
pub struct V4l2Camera {
    path: String,
    requested: FrameSize,
    warmup_frames: u32,
    device: Option<Device>,
    negotiated: Option<Negotiated>,
    card: Option<String>,
}

impl V4l2Camera {
    /// # Arguments
    /// * `path` - Device node
    /// * `requested` - Capture resolution to ask the driver for
    /// * `warmup_frames` - Frames discarded after each stream start
    pub fn new(path: &str, requested: FrameSize, warmup_frames: u32) -> Self {
        Self {
            path: path.to_string(),
            requested,
            warmup_frames,
            device: None,
            negotiated: None,
            card: None,
        }
    }

    /// Open the node just long enough to list its formats
    pub fn probe_formats(path: &str) -> AppResult<Vec<CaptureFormat>> {
        let dev = Device::with_path(path).map_err(|e| {
            AppError::DeviceUnavailable(format!("Failed to open V4L2 device {}: {}", path, e))
        })?;
        Ok(list_formats(&dev))
    }

    fn pick_format(dev: &Device) -> AppResult<PixelFormat> {
        let descriptions = dev.enum_formats().map_err(|e| {
            AppError::DeviceUnavailable(format!("Failed to enumerate formats: {}", e))
        })?;

        let offered: Vec<[u8; 4]> = descriptions.iter().map(|d| d.fourcc.repr).collect();
        debug!(
            offered = ?descriptions.iter().map(|d| d.fourcc.to_string()).collect::<Vec<_>>(),
            "Device pixel formats"
        );

        PixelFormat::V4L2_PREFERENCE
            .into_iter()
            .find(|format| offered.contains(&format.fourcc()))
            .ok_or_else(|| {
                AppError::DeviceUnavailable(
                    "Device offers no uncompressed pixel format the converter can decode"
                        .to_string(),
                )
            })
    }
}

impl CaptureDevice for V4l2Camera {
    fn name(&self) -> String {
        match &self.card {
            Some(card) => format!("{} ({})", card, self.path),
            None => self.path.clone(),
        }
    }

    fn open(&mut self, target: FrameSize) -> AppResult<FrameSize> {
        info!(device_path = %self.path, "Opening V4L2 device");

        let dev = Device::with_path(&self.path).map_err(|e| {
            AppError::DeviceUnavailable(format!("Failed to open V4L2 device {}: {}", self.path, e))
        })?;

        if let Ok(caps) = dev.query_caps() {
            info!(card = %caps.card, driver = %caps.driver, "V4L2 capabilities");
            self.card = Some(caps.card);
        }

        let pixel_format = Self::pick_format(&dev)?;

        // Never ask for less than the model needs
        let request = FrameSize::new(
            self.requested.width.max(target.width),
            self.requested.height.max(target.height),
        );

        let wanted = v4l::Format::new(
            request.width,
            request.height,
            v4l::FourCC::new(&pixel_format.fourcc()),
        );
        let applied = dev
            .set_format(&wanted)
            .map_err(|e| AppError::DeviceUnavailable(format!("Failed to set format: {}", e)))?;

        // Drivers may substitute another format; accept it only if decodable
        let format = PixelFormat::from_fourcc(&applied.fourcc.repr).ok_or_else(|| {
            AppError::DeviceUnavailable(format!(
                "Driver switched to unsupported format {}",
                applied.fourcc
            ))
        })?;
        if format != pixel_format {
            warn!(requested = %pixel_format, applied = %format, "Driver changed pixel format");
        }

        let size = FrameSize::new(applied.width, applied.height);
        let stride = if applied.stride == 0 {
            format.min_stride(size.width)
        } else {
            applied.stride
        };

        info!(
            requested = %request,
            negotiated = %size,
            format = %format,
            stride,
            "Set V4L2 format"
        );

        self.negotiated = Some(Negotiated {
            format,
            size,
            stride,
        });
        self.device = Some(dev);
        Ok(size)
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        let (Some(dev), Some(negotiated)) = (self.device.as_ref(), self.negotiated) else {
            return Err(CaptureError::NotInitialized);
        };

        let mut stream =
            MmapStream::with_buffers(dev, Type::VideoCapture, camera_defaults::STREAM_BUFFERS)
                .map_err(|e| {
                    CaptureError::Device(format!("Failed to create buffer stream: {}", e))
                })?;

        for skipped in 0..self.warmup_frames {
            if let Err(e) = stream.next() {
                return Err(CaptureError::Device(format!(
                    "Warm-up frame {} failed: {}",
                    skipped, e
                )));
            }
        }

        let frame_start = Instant::now();
        let (buf, meta) = stream
            .next()
            .map_err(|e| CaptureError::Device(format!("Failed to dequeue frame: {}", e)))?;

        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };

        debug!(
            sequence = meta.sequence,
            bytes = used,
            elapsed_us = frame_start.elapsed().as_micros() as u64,
            "V4L2 frame dequeued"
        );

        Ok(RawFrame {
            width: negotiated.size.width,
            height: negotiated.size.height,
            stride: negotiated.stride,
            format: negotiated.format,
            data: Arc::from(&buf[..used]),
            captured_at: frame_start,
            sequence: Some(meta.sequence),
        })
    }

    fn supported_formats(&self) -> Vec<CaptureFormat> {
        self.device.as_ref().map(list_formats).unwrap_or_default()
    }

    fn close(&mut self) -> AppResult<()> {
        self.negotiated = None;
        if self.device.take().is_some() {
            info!(device_path = %self.path, "V4L2 device released");
        }
        Ok(())
    }
}

fn list_formats(dev: &Device) -> Vec<CaptureFormat> {
    let descriptions = match dev.enum_formats() {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate formats");
            return Vec::new();
        }
    };

    descriptions
        .into_iter()
        .map(|desc| {
            let sizes = dev
                .enum_framesizes(desc.fourcc)
                .unwrap_or_default()
                .into_iter()
                .flat_map(|fs| match fs.size {
                    FrameSizeEnum::Discrete(d) => vec![FrameSize::new(d.width, d.height)],
                    FrameSizeEnum::Stepwise(s) => vec![
                        FrameSize::new(s.min_width, s.min_height),
                        FrameSize::new(s.max_width, s.max_height),
                    ],
                })
                .collect();

            CaptureFormat {
                fourcc: desc.fourcc.to_string(),
                pixel_format: PixelFormat::from_fourcc(&desc.fourcc.repr),
                description: desc.description,
                sizes,
            }
        })
        .collect()
}

impl Default for V4l2Camera {
    fn default() -> Self {
        Self::new(
            camera_defaults::DEFAULT_DEVICE,
            FrameSize::new(
                camera_defaults::DEFAULT_CAPTURE_WIDTH,
                camera_defaults::DEFAULT_CAPTURE_HEIGHT,
            ),
            camera_defaults::DEFAULT_WARMUP_FRAMES,
        )
    }
}
