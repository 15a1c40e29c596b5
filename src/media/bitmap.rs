// SPDX-License-Identifier: GPL-3.0-only

use image::RgbImage;
use std::sync::Arc;

/// Fixed-size RGB image handed to the classifier
///
/// Immutable; clones share the same pixels so the preview and the classifier
/// can hold it at the same time.
#[derive(Debug, Clone)]
pub struct ModelBitmap {
    image: Arc<RgbImage>,
}

impl ModelBitmap {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    /// Packed RGB bytes, row major
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

impl PartialEq for ModelBitmap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
            || (self.image.dimensions() == other.image.dimensions()
                && self.image.as_raw() == other.image.as_raw())
    }
}

impl Eq for ModelBitmap {}
