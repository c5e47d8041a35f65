use std::path::Path;

use ndarray::ArrayView3;

use crate::{
    error::BoxError,
    result::{DetectionRecord, DetectionSet},
};

/// Text detection and recognition over an RGB `(height, width, 3)` pixel array.
///
/// Implementations may be slow; the pipeline runs them on a blocking thread.
pub trait Recognizer: Send + Sync + 'static {
    fn recognize(&self, pixels: ArrayView3<u8>) -> Result<DetectionSet, BoxError>;
}

impl<F> Recognizer for F
where
    F: Fn(ArrayView3<u8>) -> Result<DetectionSet, BoxError> + Send + Sync + 'static,
{
    fn recognize(&self, pixels: ArrayView3<u8>) -> Result<DetectionSet, BoxError> {
        self(pixels)
    }
}

/// Returns the same detections for every image, e.g. the saved output of an
/// earlier OCR run.
#[derive(Debug, Clone, Default)]
pub struct ReplayRecognizer {
    detections: DetectionSet,
}

impl ReplayRecognizer {
    pub fn new(detections: DetectionSet) -> Self {
        Self { detections }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let records: Vec<DetectionRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records.into_iter().map(Into::into).collect()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoxError> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

impl Recognizer for ReplayRecognizer {
    fn recognize(&self, _pixels: ArrayView3<u8>) -> Result<DetectionSet, BoxError> {
        Ok(self.detections.clone())
    }
}
