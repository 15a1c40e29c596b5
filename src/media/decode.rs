// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel decoding of sensor encodings
//!
//! Pixels are decoded on demand so conversion never materialises a full
//! capture-resolution RGB copy. Callers validate the frame first; reads past
//! the buffer return black instead of panicking.

use crate::backends::camera::{PixelFormat, RawFrame};

/// BT.601 YCbCr to RGB (full range)
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).round().clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).round().clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).round().clamp(0.0, 255.0) as u8;

    [r, g, b]
}

#[inline]
fn byte(data: &[u8], idx: usize) -> u8 {
    data.get(idx).copied().unwrap_or(0)
}

/// Decode the pixel at (`x`, `y`) to RGB
///
/// Coordinates outside the frame are clamped to the nearest edge pixel.
pub fn sample_rgb(frame: &RawFrame, x: u32, y: u32) -> [u8; 3] {
    let x = x.min(frame.width.saturating_sub(1)) as usize;
    let y = y.min(frame.height.saturating_sub(1)) as usize;
    let stride = frame.stride as usize;
    let height = frame.height as usize;
    let data: &[u8] = &frame.data;

    match frame.format {
        PixelFormat::RGB24 => {
            let idx = y * stride + x * 3;
            [byte(data, idx), byte(data, idx + 1), byte(data, idx + 2)]
        }
        PixelFormat::RGBA => {
            let idx = y * stride + x * 4;
            [byte(data, idx), byte(data, idx + 1), byte(data, idx + 2)]
        }
        PixelFormat::BGRA => {
            let idx = y * stride + x * 4;
            [byte(data, idx + 2), byte(data, idx + 1), byte(data, idx)]
        }
        PixelFormat::Gray8 => {
            let v = byte(data, y * stride + x);
            [v, v, v]
        }
        PixelFormat::YUYV | PixelFormat::UYVY => {
            // One 4-byte macropixel per horizontal pixel pair
            let base = y * stride + (x / 2) * 4;
            let odd = x % 2 == 1;
            let (luma, u, v) = if frame.format == PixelFormat::YUYV {
                let luma = if odd { base + 2 } else { base };
                (byte(data, luma), byte(data, base + 1), byte(data, base + 3))
            } else {
                let luma = if odd { base + 3 } else { base + 1 };
                (byte(data, luma), byte(data, base), byte(data, base + 2))
            };
            yuv_to_rgb(luma, u, v)
        }
        PixelFormat::NV12 | PixelFormat::NV21 => {
            let luma = byte(data, y * stride + x);
            let uv_idx = stride * height + (y / 2) * stride + (x & !1);
            let (u, v) = if frame.format == PixelFormat::NV12 {
                (byte(data, uv_idx), byte(data, uv_idx + 1))
            } else {
                (byte(data, uv_idx + 1), byte(data, uv_idx))
            };
            yuv_to_rgb(luma, u, v)
        }
        PixelFormat::I420 => {
            let luma = byte(data, y * stride + x);
            let chroma_stride = stride.div_ceil(2);
            let chroma_rows = height.div_ceil(2);
            let u_plane = stride * height;
            let v_plane = u_plane + chroma_stride * chroma_rows;
            let offset = (y / 2) * chroma_stride + x / 2;
            yuv_to_rgb(luma, byte(data, u_plane + offset), byte(data, v_plane + offset))
        }
    }
}
