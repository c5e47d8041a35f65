//! Pipeline configuration
//!
//! Settings are stored in TOML; every field has a default so an empty file is
//! a valid configuration.

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use image::Rgba;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotate::AnnotationStyle;

/// Errors raised while building a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("invalid label font {path}: {source}")]
    Font {
        path: PathBuf,
        #[source]
        source: ab_glyph::InvalidFont,
    },
    #[error("no recognizer configured")]
    MissingRecognizer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Declared content types accepted for uploads
    pub media_types: Vec<String>,
    /// Recognition timeout in milliseconds, `0` waits indefinitely
    pub recognition_timeout_ms: Option<u64>,
    pub cache: CacheConfig,
    pub annotation: AnnotationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            media_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
            recognition_timeout_ms: Some(30_000),
            cache: CacheConfig::default(),
            annotation: AnnotationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self, BuildError> {
        Ok(toml::from_str(toml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let toml = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&toml)
    }

    pub fn recognition_timeout(&self) -> Option<Duration> {
        self.recognition_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results; unbounded when unset
    pub max_entries: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// RGBA color of region outlines
    pub outline_color: [u8; 4],
    /// RGBA color of text labels
    pub label_color: [u8; 4],
    /// Outline thickness in pixels
    pub line_width: u32,
    /// Label glyph height in pixels
    pub label_scale: f32,
    /// TrueType/OpenType font for labels, replacing the bundled DejaVu Sans Mono
    pub font_path: Option<PathBuf>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        let style = AnnotationStyle::default();
        Self {
            outline_color: style.outline_color.0,
            label_color: style.label_color.0,
            line_width: style.line_width,
            label_scale: style.label_scale,
            font_path: None,
        }
    }
}

impl AnnotationConfig {
    pub fn style(&self) -> AnnotationStyle {
        AnnotationStyle {
            outline_color: Rgba(self.outline_color),
            label_color: Rgba(self.label_color),
            line_width: self.line_width,
            label_scale: self.label_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.recognition_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.annotation.style(), AnnotationStyle::default());
    }

    #[test]
    fn partial_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            media_types = ["image/png"]

            [cache]
            max_entries = 16

            [annotation]
            line_width = 4
            outline_color = [0, 255, 0, 255]
            "#,
        )
        .unwrap();
        assert_eq!(config.media_types, ["image/png"]);
        assert_eq!(config.cache.max_entries, NonZeroUsize::new(16));
        assert_eq!(config.annotation.line_width, 4);
        assert_eq!(config.annotation.style().outline_color, Rgba([0, 255, 0, 255]));
        assert_eq!(config.annotation.label_scale, 16.0);
    }

    #[test]
    fn zero_cache_size_is_rejected() {
        let err = PipelineConfig::from_toml_str("[cache]\nmax_entries = 0").unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "recognition_timeout_ms = 1500").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.recognition_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = PipelineConfig::from_toml_str("recognition_timeout_ms = 0").unwrap();
        assert_eq!(config.recognition_timeout(), None);
    }

    #[test]
    fn missing_file() {
        let err = PipelineConfig::load("/nonexistent/ocrlens.toml").unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
