use std::{io::Cursor, path::PathBuf, sync::Arc, time::Duration};

pub mod annotate;
mod cache;
pub mod codec;
pub mod config;
mod error;
pub mod hasher;
mod recognizer;
mod result;
pub mod util;

use ab_glyph::FontArc;
use annotate::{AnnotationEngine, AnnotationStyle};
pub use cache::ResultCache;
use codec::ImageCodec;
use config::{BuildError, PipelineConfig};
pub use error::*;
use image::DynamicImage;
pub use recognizer::*;
pub use result::*;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use util::to_pixel_array;

pub struct PipelineBuilder {
    recognizer: Option<Arc<dyn Recognizer>>,
    cache: Option<Arc<ResultCache>>,
    media_types: Vec<String>,
    recognition_timeout: Option<Duration>,
    style: AnnotationStyle,
    font_path: Option<PathBuf>,
    cache_size: Option<std::num::NonZeroUsize>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            media_types: config.media_types.clone(),
            recognition_timeout: config.recognition_timeout(),
            style: config.annotation.style(),
            font_path: config.annotation.font_path.clone(),
            cache_size: config.cache.max_entries,
            ..Self::default()
        }
    }

    pub fn recognizer(mut self, recognizer: impl Recognizer) -> Self {
        self.recognizer = Some(Arc::new(recognizer));
        self
    }

    pub fn shared_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Share a cache between pipelines. Overrides any configured cache size.
    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn media_types<S: Into<String>>(mut self, media_types: impl IntoIterator<Item = S>) -> Self {
        self.media_types = media_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn recognition_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recognition_timeout = timeout;
        self
    }

    pub fn style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn label_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    #[instrument(level = "debug", skip(self))]
    fn load_font(&self) -> Result<Option<FontArc>, BuildError> {
        let Some(path) = &self.font_path else {
            return Ok(None);
        };
        let data = std::fs::read(path).map_err(|source| BuildError::Io {
            path: path.clone(),
            source,
        })?;
        FontArc::try_from_vec(data)
            .map(Some)
            .map_err(|source| BuildError::Font {
                path: path.clone(),
                source,
            })
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<Pipeline, BuildError> {
        let font = self.load_font()?;
        let recognizer = self.recognizer.ok_or(BuildError::MissingRecognizer)?;
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(match self.cache_size {
                Some(size) => ResultCache::bounded(size),
                None => ResultCache::new(),
            })
        });
        let mut annotator = AnnotationEngine::new(self.style);
        if let Some(font) = font {
            annotator = annotator.with_font(font);
        }
        let media_types = self
            .media_types
            .iter()
            .map(|media_type| normalize_media_type(media_type))
            .collect::<Vec<_>>();
        Ok(Pipeline {
            recognizer,
            cache,
            codec: ImageCodec::for_media_types(&media_types),
            annotator,
            media_types,
            recognition_timeout: self.recognition_timeout,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            recognizer: None,
            cache: None,
            recognition_timeout: config.recognition_timeout(),
            media_types: config.media_types,
            style: AnnotationStyle::default(),
            font_path: None,
            cache_size: None,
        }
    }
}

/// Turns an uploaded image into highlighted overview and per-word crops,
/// reusing recognition results for images it has seen before.
pub struct Pipeline {
    recognizer: Arc<dyn Recognizer>,
    cache: Arc<ResultCache>,
    codec: ImageCodec,
    annotator: AnnotationEngine,
    media_types: Vec<String>,
    recognition_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn codec(&self) -> &ImageCodec {
        &self.codec
    }

    /// Runs the whole pipeline over one upload. Either outcome is final; no
    /// partial result is returned on failure.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn process(&self, bytes: &[u8], content_type: &str) -> Result<AnnotatedResult, Failure> {
        self.try_process(bytes, content_type).await.map_err(|err| {
            warn!(kind = ?err.kind(), "Failed to process image: {err}");
            Failure::from(err)
        })
    }

    async fn try_process(&self, bytes: &[u8], content_type: &str) -> Result<AnnotatedResult> {
        self.check_media_type(content_type)?;

        let mut reader = Cursor::new(bytes);
        let digest = hasher::digest(&mut reader)?;
        let (detections, recognized) = match self.cache.lookup(&digest) {
            Some(detections) => {
                debug!(%digest, "Cache hit");
                (detections, false)
            }
            None => {
                debug!(%digest, "Cache miss");
                let image = self.codec.decode(reader.get_ref())?;
                (Arc::new(self.recognize(&image).await?), true)
            }
        };

        let image = self.codec.decode(reader.get_ref())?;
        let result = self
            .annotator
            .produce_annotations(&self.codec, &image, &detections)?;
        // only successful requests populate the cache
        if recognized {
            self.cache.store(digest, detections);
        }
        Ok(result)
    }

    fn check_media_type(&self, content_type: &str) -> Result<()> {
        let media_type = normalize_media_type(content_type);
        if self.media_types.contains(&media_type) {
            Ok(())
        } else {
            Err(Error::UnsupportedMedia(content_type.to_string()))
        }
    }

    #[instrument(level = "debug", skip_all)]
    async fn recognize(&self, image: &DynamicImage) -> Result<DetectionSet> {
        let pixels = to_pixel_array(image);
        let recognizer = self.recognizer.clone();
        let start = Instant::now();
        let task = tokio::task::spawn_blocking(move || recognizer.recognize(pixels.view()));

        let joined = match self.recognition_timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| Error::RecognitionTimeout(limit))?,
            None => task.await,
        };
        let detections = joined
            .map_err(|err| Error::Recognition(format!("recognizer task failed: {err}")))?
            .map_err(|err| Error::Recognition(err.to_string()))?;
        debug!(
            detections = detections.len(),
            elapsed = ?start.elapsed(),
            "Recognition finished"
        );

        validate(&detections)?;
        Ok(detections)
    }
}

fn normalize_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn validate(detections: &[Detection]) -> Result<()> {
    for (i, detection) in detections.iter().enumerate() {
        let coords = &detection.region.exterior().0;
        if coords.is_empty() {
            return Err(Error::Recognition(format!("detection {i} has an empty region")));
        }
        if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::Recognition(format!(
                "detection {i} has non-finite coordinates"
            )));
        }
        if !(0.0..=1.0).contains(&detection.confidence) {
            return Err(Error::Recognition(format!(
                "detection {i} has confidence {} outside [0, 1]",
                detection.confidence
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_parameters_are_ignored() {
        assert_eq!(normalize_media_type("Image/PNG; charset=binary"), "image/png");
        assert_eq!(normalize_media_type(" image/jpeg "), "image/jpeg");
    }

    #[test]
    fn malformed_detections_are_rejected() {
        let ok = Detection::new([(0.0, 0.0), (1.0, 1.0)], "ok", 1.0);
        assert!(validate(&[ok.clone()]).is_ok());

        let empty = Detection::new([], "empty", 0.5);
        let nan = Detection::new([(f32::NAN, 0.0)], "nan", 0.5);
        let too_sure = Detection::new([(0.0, 0.0)], "sure", 1.5);
        let unsure = Detection::new([(0.0, 0.0)], "unsure", f32::NAN);
        for bad in [empty, nan, too_sure, unsure] {
            let err = validate(&[ok.clone(), bad]).unwrap_err();
            assert_eq!(err.kind(), FailureKind::RecognitionFailure);
        }
    }

    #[test]
    fn builder_requires_recognizer() {
        assert!(matches!(
            Pipeline::builder().build(),
            Err(BuildError::MissingRecognizer)
        ));
    }

    #[test]
    fn builder_reports_missing_font() {
        let result = Pipeline::builder()
            .recognizer(ReplayRecognizer::default())
            .label_font("/nonexistent/font.ttf")
            .build();
        assert!(matches!(result, Err(BuildError::Io { .. })));
    }

    #[test]
    fn builder_rejects_invalid_font() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not a font").unwrap();
        let result = Pipeline::builder()
            .recognizer(ReplayRecognizer::default())
            .label_font(file.path())
            .build();
        assert!(matches!(result, Err(BuildError::Font { .. })));
    }
}
