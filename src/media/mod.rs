// SPDX-License-Identifier: GPL-3.0-only

//! Frame preprocessing
//!
//! Sensor frames arrive at capture resolution in whatever encoding the
//! device negotiated (YUYV, NV12, RGB...). The classifier takes a fixed
//! 224x224 RGB bitmap.
//!
//! # Modules
//!
//! - [`decode`]: Per-pixel decoding of sensor encodings (BT.601 for YUV)
//! - [`converter`]: Centre crop and bilinear scale to the model size
//! - [`bitmap`]: The shared, immutable model input

pub mod bitmap;
pub mod converter;
pub mod decode;

pub use bitmap::ModelBitmap;
pub use converter::FrameConverter;
