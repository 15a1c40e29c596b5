// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture devices

use std::sync::Arc;
use std::time::Instant;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True if both dimensions are at least those of `other`
    pub fn covers(&self, other: FrameSize) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel encodings a sensor may deliver
///
/// These are the formats the frame converter knows how to decode. Compressed
/// formats (MJPEG, H264) are never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// NV21 - Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    NV21,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
}

impl PixelFormat {
    /// Formats tried against a V4L2 device, most preferred first
    pub const V4L2_PREFERENCE: [PixelFormat; 7] = [
        PixelFormat::YUYV,
        PixelFormat::UYVY,
        PixelFormat::NV12,
        PixelFormat::NV21,
        PixelFormat::I420,
        PixelFormat::RGB24,
        PixelFormat::Gray8,
    ];

    /// Check if this format is a YUV format
    pub fn is_yuv(&self) -> bool {
        matches!(
            self,
            Self::YUYV | Self::UYVY | Self::NV12 | Self::NV21 | Self::I420
        )
    }

    /// Check if the chroma planes follow the luma plane in the same buffer
    pub fn is_planar(&self) -> bool {
        matches!(self, Self::NV12 | Self::NV21 | Self::I420)
    }

    /// Bytes per pixel in the first (or only) plane
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA | Self::BGRA => 4,
            Self::RGB24 => 3,
            Self::YUYV | Self::UYVY => 2,
            Self::Gray8 | Self::NV12 | Self::NV21 | Self::I420 => 1,
        }
    }

    /// Smallest stride that fits a row of `width` pixels
    pub fn min_stride(&self, width: u32) -> u32 {
        match self {
            // Packed 4:2:2 rows always hold whole pixel pairs
            Self::YUYV | Self::UYVY => width.div_ceil(2) * 4,
            _ => width * self.bytes_per_pixel(),
        }
    }

    /// Minimum buffer length for a frame with this geometry
    ///
    /// Planar formats assume the chroma planes are packed right after the
    /// luma plane, with half the luma stride for I420.
    pub fn min_buffer_len(&self, stride: u32, height: u32) -> usize {
        let luma = stride as usize * height as usize;
        let chroma_rows = height.div_ceil(2) as usize;
        match self {
            Self::NV12 | Self::NV21 => luma + stride as usize * chroma_rows,
            Self::I420 => luma + 2 * (stride.div_ceil(2) as usize * chroma_rows),
            _ => luma,
        }
    }

    /// V4L2 FourCC code
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::RGB24 => *b"RGB3",
            Self::RGBA => *b"AB24",
            Self::BGRA => *b"AR24",
            Self::Gray8 => *b"GREY",
            Self::YUYV => *b"YUYV",
            Self::UYVY => *b"UYVY",
            Self::NV12 => *b"NV12",
            Self::NV21 => *b"NV21",
            Self::I420 => *b"YU12",
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"RGB3" => Some(Self::RGB24),
            b"AB24" => Some(Self::RGBA),
            b"AR24" => Some(Self::BGRA),
            b"GREY" | b"Y800" => Some(Self::Gray8),
            b"YUYV" | b"YUY2" => Some(Self::YUYV),
            b"UYVY" => Some(Self::UYVY),
            b"NV12" => Some(Self::NV12),
            b"NV21" => Some(Self::NV21),
            b"YU12" | b"I420" => Some(Self::I420),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

/// One pixel format / resolution pair a device advertises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Raw FourCC as reported by the driver
    pub fourcc: String,
    /// Parsed format, `None` if the converter cannot decode it
    pub pixel_format: Option<PixelFormat>,
    /// Human readable description from the driver
    pub description: String,
    /// Discrete frame sizes (stepwise ranges are reported as their bounds)
    pub sizes: Vec<FrameSize>,
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes: Vec<String> = self.sizes.iter().map(|s| s.to_string()).collect();
        let support = if self.pixel_format.is_some() {
            ""
        } else {
            " (unsupported)"
        };
        write!(
            f,
            "{} {}{}: {}",
            self.fourcc,
            self.description,
            support,
            sizes.join(", ")
        )
    }
}

/// A single frame from the sensor, in its native encoding
///
/// The frame is moved from the capture controller to the frame converter and
/// dropped right after conversion.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride of the first plane in bytes (may include padding)
    pub stride: u32,
    /// Pixel encoding of `data`
    pub format: PixelFormat,
    /// All planes, contiguous
    pub data: Arc<[u8]>,
    /// Timestamp when the frame was dequeued
    pub captured_at: Instant,
    /// Driver sequence number, if the backend has one
    pub sequence: Option<u32>,
}

impl RawFrame {
    /// Build a frame with the tightest stride for its format
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: format.min_stride(width),
            format,
            data: Arc::from(data.into_boxed_slice()),
            captured_at: Instant::now(),
            sequence: None,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Check that the buffer is large enough for the declared geometry
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("empty frame {}x{}", self.width, self.height));
        }
        if self.stride < self.format.min_stride(self.width) {
            return Err(format!(
                "stride {} too small for {} px of {}",
                self.stride, self.width, self.format
            ));
        }
        let needed = self.format.min_buffer_len(self.stride, self.height);
        if self.data.len() < needed {
            return Err(format!(
                "buffer holds {} bytes, {} {}x{} needs {}",
                self.data.len(),
                self.format,
                self.width,
                self.height,
                needed
            ));
        }
        Ok(())
    }
}
