use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use tracing::instrument;

use crate::error::{Error, Result};

const INLINE_FORMAT: ImageFormat = ImageFormat::Png;

/// Decodes uploads into pixels and encodes pixels into inline data URIs.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    formats: Vec<ImageFormat>,
}

impl ImageCodec {
    pub fn new(formats: impl IntoIterator<Item = ImageFormat>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
        }
    }

    /// Codec accepting the structural formats behind the given MIME types.
    /// Types the `image` crate doesn't know are ignored.
    pub fn for_media_types<S: AsRef<str>>(media_types: &[S]) -> Self {
        let mut formats = Vec::new();
        for media_type in media_types {
            match ImageFormat::from_mime_type(media_type.as_ref()) {
                Some(format) if !formats.contains(&format) => formats.push(format),
                Some(_) => {}
                None => log::debug!("No image format for media type {:?}", media_type.as_ref()),
            }
        }
        Self { formats }
    }

    pub fn formats(&self) -> &[ImageFormat] {
        &self.formats
    }

    #[instrument(level = "debug", skip_all, fields(len = bytes.len()))]
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        let format = image::guess_format(bytes)
            .map_err(|_| Error::UnsupportedFormat("unrecognized image data".to_string()))?;
        if !self.formats.contains(&format) {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
        let image = image::load_from_memory_with_format(bytes, format).map_err(Error::Decode)?;
        log::trace!(
            "Decoded {format:?} image (w: {}, h: {})",
            image.width(),
            image.height()
        );
        Ok(image)
    }

    /// PNG-encodes `image` into a `data:` URI. Lossless, so the URI decodes back
    /// to the exact same pixels.
    #[instrument(level = "trace", skip_all)]
    pub fn encode_as_inline(&self, image: &DynamicImage) -> Result<String> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), INLINE_FORMAT)
            .map_err(Error::Encode)?;
        Ok(format!(
            "data:{};base64,{}",
            INLINE_FORMAT.to_mime_type(),
            STANDARD.encode(buf)
        ))
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new([ImageFormat::Jpeg, ImageFormat::Png])
    }
}

/// Reverses [`ImageCodec::encode_as_inline`].
pub fn decode_inline(uri: &str) -> Result<DynamicImage> {
    let payload = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| Error::UnsupportedFormat("not a base64 data URI".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| Error::UnsupportedFormat(format!("invalid base64 payload: {err}")))?;
    image::load_from_memory(&bytes).map_err(Error::Decode)
}
