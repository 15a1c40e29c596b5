// SPDX-License-Identifier: GPL-3.0-only

//! Nearest-centroid colour classifier
//!
//! Each bitmap is reduced to six features: the mean and standard deviation
//! of the red, green and blue channels, scaled to [0, 1]. Every label has a
//! centroid in that space. Scores are a softmax over the negative squared
//! distances divided by the model temperature.
//!
//! Model file (JSON):
//!
//! ```json
//! {
//!   "name": "colour-centroids",
//!   "input_width": 224,
//!   "input_height": 224,
//!   "temperature": 0.02,
//!   "confidence_threshold": 0.5,
//!   "classes": [
//!     { "label": "paper", "centroid": [0.8, 0.78, 0.74, 0.1, 0.1, 0.11] }
//!   ]
//! }
//! ```

use super::{ClassificationResult, Classifier};
use crate::constants::{MODEL_IMAGE_HEIGHT, MODEL_IMAGE_WIDTH};
use crate::errors::ModelLoadError;
use crate::media::ModelBitmap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Length of the feature vector
pub const FEATURE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCentroid {
    pub label: String,
    pub centroid: Vec<f32>,
}

/// Parsed and validated model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    #[serde(default)]
    pub name: String,
    pub input_width: u32,
    pub input_height: u32,
    pub temperature: f32,
    pub confidence_threshold: f32,
    pub classes: Vec<ClassCentroid>,
}

impl CentroidModel {
    /// Load and validate a model file
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ModelLoadError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        let model: CentroidModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        if self.input_width != MODEL_IMAGE_WIDTH || self.input_height != MODEL_IMAGE_HEIGHT {
            return Err(ModelLoadError::Invalid(format!(
                "model input is {}x{}, expected {}x{}",
                self.input_width, self.input_height, MODEL_IMAGE_WIDTH, MODEL_IMAGE_HEIGHT
            )));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(ModelLoadError::Invalid(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ModelLoadError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.classes.is_empty() {
            return Err(ModelLoadError::Invalid("model has no classes".to_string()));
        }

        let mut seen = HashSet::new();
        for class in &self.classes {
            if class.label.is_empty() {
                return Err(ModelLoadError::Invalid("empty class label".to_string()));
            }
            if !seen.insert(class.label.as_str()) {
                return Err(ModelLoadError::Invalid(format!(
                    "duplicate class label {:?}",
                    class.label
                )));
            }
            if class.centroid.len() != FEATURE_LEN {
                return Err(ModelLoadError::Invalid(format!(
                    "centroid for {:?} has {} values, expected {}",
                    class.label,
                    class.centroid.len(),
                    FEATURE_LEN
                )));
            }
            if class.centroid.iter().any(|v| !v.is_finite()) {
                return Err(ModelLoadError::Invalid(format!(
                    "centroid for {:?} contains a non-finite value",
                    class.label
                )));
            }
        }
        Ok(())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.label.as_str())
    }

    /// Softmax scores per class, in model order
    pub fn scores(&self, features: &[f32; FEATURE_LEN]) -> Vec<f32> {
        let logits: Vec<f32> = self
            .classes
            .iter()
            .map(|class| {
                let distance: f32 = class
                    .centroid
                    .iter()
                    .zip(features)
                    .map(|(c, f)| (c - f) * (c - f))
                    .sum();
                -distance / self.temperature
            })
            .collect();

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}

/// Per-channel mean and standard deviation, scaled to [0, 1]
pub fn extract_features(bitmap: &ModelBitmap) -> [f32; FEATURE_LEN] {
    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    let mut count = 0f64;

    for pixel in bitmap.as_raw().chunks_exact(3) {
        for c in 0..3 {
            let v = pixel[c] as f64 / 255.0;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
        count += 1.0;
    }

    let mut features = [0f32; FEATURE_LEN];
    if count == 0.0 {
        return features;
    }
    for c in 0..3 {
        let mean = sum[c] / count;
        let variance = (sum_sq[c] / count - mean * mean).max(0.0);
        features[c] = mean as f32;
        features[c + 3] = variance.sqrt() as f32;
    }
    features
}

/// Classifier backed by a [`CentroidModel`]
pub struct CentroidClassifier {
    model: Option<CentroidModel>,
}

impl CentroidClassifier {
    pub fn new(model: CentroidModel) -> Self {
        info!(
            name = %model.name,
            classes = ?model.labels().collect::<Vec<_>>(),
            threshold = model.confidence_threshold,
            "Classifier model loaded"
        );
        Self { model: Some(model) }
    }

    /// Load the model at `path`
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        info!(path = %path.display(), "Loading classifier model");
        Ok(Self::new(CentroidModel::load(path)?))
    }

    pub fn is_open(&self) -> bool {
        self.model.is_some()
    }
}

impl Classifier for CentroidClassifier {
    fn classify(&mut self, bitmap: &ModelBitmap) -> ClassificationResult {
        let Some(model) = self.model.as_ref() else {
            warn!("classify called after close");
            return ClassificationResult::NoResult;
        };

        if bitmap.width() != model.input_width || bitmap.height() != model.input_height {
            warn!(
                width = bitmap.width(),
                height = bitmap.height(),
                "Bitmap does not match model input size"
            );
            return ClassificationResult::NoResult;
        }

        let features = extract_features(bitmap);
        let scores = model.scores(&features);

        let Some((best, score)) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return ClassificationResult::NoResult;
        };

        let label = &model.classes[best].label;
        debug!(?features, ?scores, best = %label, score, "Classified bitmap");

        if score >= model.confidence_threshold {
            ClassificationResult::from_label(label)
        } else {
            debug!(
                score,
                threshold = model.confidence_threshold,
                "Best score below threshold"
            );
            ClassificationResult::NoResult
        }
    }

    fn close(&mut self) {
        if self.model.take().is_some() {
            info!("Classifier closed");
        }
    }
}
