use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// A single recognized word or line.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub region: Polygon<f32>,
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(
        points: impl IntoIterator<Item = (f32, f32)>,
        text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        let points = points
            .into_iter()
            .map(|(x, y)| Coord { x, y })
            .collect::<Vec<_>>();
        Self {
            region: Polygon::new(LineString::new(points), vec![]),
            text: text.into(),
            confidence,
        }
    }
}

/// Detections in the order the recognizer returned them.
pub type DetectionSet = Vec<Detection>;

/// Serialized form of a [`Detection`], a polygon as a list of `[x, y]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub region: Vec<[f32; 2]>,
    pub text: String,
    pub confidence: f32,
}

impl From<DetectionRecord> for Detection {
    fn from(record: DetectionRecord) -> Self {
        Detection::new(
            record.region.into_iter().map(|[x, y]| (x, y)),
            record.text,
            record.confidence,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordCrop {
    /// Inline data URI of the cropped region.
    pub image: String,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedResult {
    /// Inline data URI of the highlighted overview image.
    pub overview: String,
    pub words: Vec<WordCrop>,
}
