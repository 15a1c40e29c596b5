// SPDX-License-Identifier: GPL-3.0-only

//! Image classification
//!
//! The pipeline treats the classifier as "bitmap in, label out". The
//! bundled implementation is a nearest-centroid model over colour
//! statistics, see [`centroid`].

pub mod centroid;

pub use centroid::{CentroidClassifier, CentroidModel};

use crate::constants::texts;
use crate::media::ModelBitmap;

/// Outcome of one classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    Label(String),
    NoResult,
}

impl ClassificationResult {
    /// An empty label means the classifier had nothing to say
    pub fn from_label(label: &str) -> Self {
        if label.is_empty() {
            Self::NoResult
        } else {
            Self::Label(label.to_string())
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Label(label) => Some(label),
            Self::NoResult => None,
        }
    }

    /// Text for the result line of the display
    pub fn display_text(&self) -> &str {
        self.label().unwrap_or(texts::NO_RESULT)
    }
}

/// Synchronous image classifier
pub trait Classifier: Send {
    /// Classify a model-size bitmap
    fn classify(&mut self, bitmap: &ModelBitmap) -> ClassificationResult;

    /// Release model resources
    ///
    /// Idempotent. Later `classify` calls return `NoResult`.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_label_is_no_result() {
        assert_eq!(
            ClassificationResult::from_label(""),
            ClassificationResult::NoResult
        );
        assert_eq!(
            ClassificationResult::from_label("metal").label(),
            Some("metal")
        );
    }

    #[test]
    fn test_no_result_shows_fallback_text() {
        assert_eq!(
            ClassificationResult::NoResult.display_text(),
            "I don't understand what I see"
        );
        assert_eq!(
            ClassificationResult::Label("paper".into()).display_text(),
            "paper"
        );
    }
}
