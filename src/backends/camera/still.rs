// SPDX-License-Identifier: GPL-3.0-only

//! Still-image capture device
//!
//! Serves image files as if they came from a sensor, so the sorter can run
//! (and be tested) without camera hardware. A directory is served round
//! robin in file-name order.

use super::types::*;
use super::CaptureDevice;
use crate::constants::file_formats;
use crate::errors::{AppError, AppResult, CaptureError};
use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Frames read from an image file or a directory of images
pub struct StillImageCamera {
    source: PathBuf,
    images: Vec<PathBuf>,
    next_index: usize,
    size: Option<FrameSize>,
}

impl StillImageCamera {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            images: Vec::new(),
            next_index: 0,
            size: None,
        }
    }

    fn collect_images(source: &Path) -> AppResult<Vec<PathBuf>> {
        if source.is_file() {
            return Ok(vec![source.to_path_buf()]);
        }

        let entries = std::fs::read_dir(source).map_err(|e| {
            AppError::DeviceUnavailable(format!(
                "Cannot read image source '{}': {}",
                source.display(),
                e
            ))
        })?;

        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        images.sort();

        if images.is_empty() {
            return Err(AppError::DeviceUnavailable(format!(
                "No images found in '{}'",
                source.display()
            )));
        }
        Ok(images)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(file_formats::is_image_extension)
        .unwrap_or(false)
}

/// Load an image file as packed RGB
pub fn load_rgb(path: &Path) -> AppResult<RgbImage> {
    let img = image::open(path).map_err(|e| {
        AppError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;
    Ok(img.to_rgb8())
}

impl CaptureDevice for StillImageCamera {
    fn name(&self) -> String {
        format!("still image {}", self.source.display())
    }

    fn open(&mut self, _target: FrameSize) -> AppResult<FrameSize> {
        let images = Self::collect_images(&self.source)?;

        // The first image fixes the session resolution
        let first = load_rgb(&images[0])
            .map_err(|e| AppError::DeviceUnavailable(e.to_string()))?;
        let size = FrameSize::new(first.width(), first.height());

        info!(
            source = %self.source.display(),
            images = images.len(),
            resolution = %size,
            "Still image source opened"
        );

        self.images = images;
        self.next_index = 0;
        self.size = Some(size);
        Ok(size)
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        let Some(size) = self.size else {
            return Err(CaptureError::NotInitialized);
        };
        if self.images.is_empty() {
            return Err(CaptureError::NotInitialized);
        }

        let path = &self.images[self.next_index % self.images.len()];
        self.next_index = (self.next_index + 1) % self.images.len();

        let mut rgb = load_rgb(path).map_err(|e| CaptureError::Device(e.to_string()))?;
        if rgb.width() != size.width || rgb.height() != size.height {
            warn!(
                path = %path.display(),
                from = %FrameSize::new(rgb.width(), rgb.height()),
                to = %size,
                "Resizing image to session resolution"
            );
            rgb = image::imageops::resize(&rgb, size.width, size.height, FilterType::Triangle);
        }

        debug!(path = %path.display(), "Still frame served");
        Ok(RawFrame::packed(
            size.width,
            size.height,
            PixelFormat::RGB24,
            rgb.into_raw(),
        ))
    }

    fn supported_formats(&self) -> Vec<CaptureFormat> {
        self.size
            .map(|size| {
                vec![CaptureFormat {
                    fourcc: PixelFormat::RGB24.to_string(),
                    pixel_format: Some(PixelFormat::RGB24),
                    description: "Still image".to_string(),
                    sizes: vec![size],
                }]
            })
            .unwrap_or_default()
    }

    fn close(&mut self) -> AppResult<()> {
        self.images.clear();
        self.size = None;
        Ok(())
    }
}
