// SPDX-License-Identifier: GPL-3.0-only

//! Sensor frame to model bitmap conversion
//!
//! The largest centred region with the target aspect ratio is cut out of the
//! frame and scaled to the target size with bilinear sampling. Source pixels
//! are decoded while sampling; the output bitmap is the only allocation.

use super::bitmap::ModelBitmap;
use super::decode::sample_rgb;
use crate::backends::camera::{FrameSize, RawFrame};
use crate::errors::CaptureError;
use image::RgbImage;
use tracing::debug;

/// Region of the source frame that is scaled to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centred crop of `source` with the aspect ratio of `target`
pub fn center_crop(source: FrameSize, target: FrameSize) -> CropRect {
    let (sw, sh) = (source.width as u64, source.height as u64);
    let (tw, th) = (target.width as u64, target.height as u64);

    let (width, height) = if sw * th > tw * sh {
        // Source is wider than the target
        let width = ((sh * tw + th / 2) / th).clamp(1, sw);
        (width, sh)
    } else {
        let height = ((sw * th + tw / 2) / tw).clamp(1, sh);
        (sw, height)
    };

    CropRect {
        x: ((sw - width) / 2) as u32,
        y: ((sh - height) / 2) as u32,
        width: width as u32,
        height: height as u32,
    }
}

/// Converts frames of one fixed source size into model bitmaps
#[derive(Debug, Clone, Copy)]
pub struct FrameConverter {
    source: FrameSize,
    target: FrameSize,
}

impl FrameConverter {
    pub fn new(source: FrameSize, target: FrameSize) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> FrameSize {
        self.source
    }

    pub fn target(&self) -> FrameSize {
        self.target
    }

    /// Convert one frame; the frame is consumed
    ///
    /// # Errors
    /// `CaptureError::Malformed` if the frame size differs from the size this
    /// converter was built for, or the buffer is too short.
    pub fn convert(&self, frame: RawFrame) -> Result<ModelBitmap, CaptureError> {
        if frame.size() != self.source {
            return Err(CaptureError::Malformed(format!(
                "converter expects {}, got {}",
                self.source,
                frame.size()
            )));
        }
        if self.target.width == 0 || self.target.height == 0 {
            return Err(CaptureError::Malformed(format!("empty target size {}", self.target)));
        }
        frame.validate().map_err(CaptureError::Malformed)?;

        let crop = center_crop(self.source, self.target);
        let scale_x = crop.width as f32 / self.target.width as f32;
        let scale_y = crop.height as f32 / self.target.height as f32;
        let max_x = (crop.x + crop.width - 1) as f32;
        let max_y = (crop.y + crop.height - 1) as f32;

        let mut output = RgbImage::new(self.target.width, self.target.height);

        for (ox, oy, pixel) in output.enumerate_pixels_mut() {
            // Pixel centres map to pixel centres
            let sx =
                (crop.x as f32 + (ox as f32 + 0.5) * scale_x - 0.5).clamp(crop.x as f32, max_x);
            let sy =
                (crop.y as f32 + (oy as f32 + 0.5) * scale_y - 0.5).clamp(crop.y as f32, max_y);

            let x0 = sx.floor() as u32;
            let y0 = sy.floor() as u32;
            let x1 = (x0 + 1).min(max_x as u32);
            let y1 = (y0 + 1).min(max_y as u32);
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let p00 = sample_rgb(&frame, x0, y0);
            let p10 = sample_rgb(&frame, x1, y0);
            let p01 = sample_rgb(&frame, x0, y1);
            let p11 = sample_rgb(&frame, x1, y1);

            for c in 0..3 {
                let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                pixel.0[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
            }
        }

        debug!(
            source = %self.source,
            format = %frame.format,
            crop_x = crop.x,
            crop_y = crop.y,
            crop_width = crop.width,
            crop_height = crop.height,
            "Frame converted"
        );

        Ok(ModelBitmap::new(output))
    }
}
