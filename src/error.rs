use std::{fmt, io, time::Duration};

use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by recognizers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported media type `{0}`")]
    UnsupportedMedia(String),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to read image: {0}")]
    Read(#[from] io::Error),
    #[error("text recognition failed: {0}")]
    Recognition(String),
    #[error("text recognition timed out after {0:?}")]
    RecognitionTimeout(Duration),
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::UnsupportedMedia(_) => FailureKind::UnsupportedMedia,
            Error::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            Error::Decode(_) => FailureKind::DecodeError,
            Error::Read(_) => FailureKind::ReadFailure,
            Error::Recognition(_) => FailureKind::RecognitionFailure,
            Error::RecognitionTimeout(_) => FailureKind::RecognitionTimeout,
            Error::Encode(_) => FailureKind::EncodeError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedMedia,
    UnsupportedFormat,
    DecodeError,
    ReadFailure,
    RecognitionFailure,
    RecognitionTimeout,
    EncodeError,
}

/// The failure half of a pipeline outcome, ready to be shown by a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    /// Single message for views that don't distinguish failure kinds.
    pub fn generic_message(&self) -> &'static str {
        "The uploaded image could not be processed."
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for Failure {}
