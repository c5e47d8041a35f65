//! Overview highlighting and per-word crops.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use geo::{BoundingRect, Polygon};
use image::{DynamicImage, Rgba};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use tracing::instrument;

use crate::{
    codec::ImageCodec,
    error::Result,
    util::{clamped_bounds, part_image},
    AnnotatedResult, Detection, WordCrop,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationStyle {
    pub outline_color: Rgba<u8>,
    pub label_color: Rgba<u8>,
    pub line_width: u32,
    pub label_scale: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            outline_color: Rgba([255, 0, 0, 255]),
            label_color: Rgba([255, 0, 0, 255]),
            line_width: 2,
            label_scale: 16.0,
        }
    }
}

/// DejaVu Sans Mono, see `fonts/LICENSE`.
static DEFAULT_FONT: &[u8] = include_bytes!("../fonts/DejaVuSansMono.ttf");

/// The label font bundled with the crate.
pub fn default_font() -> FontArc {
    FontArc::try_from_slice(DEFAULT_FONT).expect("bundled font is a valid TrueType file")
}

#[derive(Clone)]
pub struct AnnotationEngine {
    style: AnnotationStyle,
    font: FontArc,
}

impl Default for AnnotationEngine {
    fn default() -> Self {
        Self::new(AnnotationStyle::default())
    }
}

impl AnnotationEngine {
    pub fn new(style: AnnotationStyle) -> Self {
        Self {
            style,
            font: default_font(),
        }
    }

    /// Replaces the bundled label font.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = font;
        self
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Draws every region, in order, on a copy of `image`.
    #[instrument(level = "debug", skip_all, fields(detections = detections.len()))]
    pub fn render_overview(&self, image: &DynamicImage, detections: &[Detection]) -> DynamicImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_outline(&mut canvas, &detection.region);
            self.draw_label(&mut canvas, detection);
        }
        canvas
    }

    pub fn crop_region(&self, image: &DynamicImage, region: &Polygon<f32>) -> DynamicImage {
        part_image(image, region)
    }

    #[instrument(level = "debug", skip_all, fields(detections = detections.len()))]
    pub fn produce_annotations(
        &self,
        codec: &ImageCodec,
        image: &DynamicImage,
        detections: &[Detection],
    ) -> Result<AnnotatedResult> {
        let words = detections
            .iter()
            .enumerate()
            .map(|(_i, detection)| {
                let crop = self.crop_region(image, &detection.region);
                #[cfg(feature = "debug")]
                {
                    if let Err(err) = std::fs::create_dir_all("part_images") {
                        log::debug!("Failed to create part_images: {err}");
                    }
                    if let Err(err) = crop.save(format!("part_images/{_i}.png")) {
                        log::debug!("Failed to save part image {_i}: {err}");
                    }
                }
                Ok(WordCrop {
                    image: codec.encode_as_inline(&crop)?,
                    text: detection.text.clone(),
                    confidence: detection.confidence,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let overview = self.render_overview(image, detections);
        Ok(AnnotatedResult {
            overview: codec.encode_as_inline(&overview)?,
            words,
        })
    }

    fn draw_outline(&self, canvas: &mut DynamicImage, region: &Polygon<f32>) {
        let width = self.style.line_width.max(1);
        let spread = (width - 1) as f32 / 2.0;
        for line in region.exterior().lines() {
            let (start, end) = ((line.start.x, line.start.y), (line.end.x, line.end.y));
            for step in 0..width {
                let offset = step as f32 - spread;
                draw_line_segment_mut(
                    canvas,
                    (start.0 + offset, start.1),
                    (end.0 + offset, end.1),
                    self.style.outline_color,
                );
                draw_line_segment_mut(
                    canvas,
                    (start.0, start.1 + offset),
                    (end.0, end.1 + offset),
                    self.style.outline_color,
                );
            }
        }
    }

    fn draw_label(&self, canvas: &mut DynamicImage, detection: &Detection) {
        if detection.text.is_empty() || detection.region.bounding_rect().is_none() {
            return;
        }
        let scale = PxScale::from(self.style.label_scale);
        // full line height, so descenders stay clear of the box too
        let line_height = self.font.as_scaled(scale).height().ceil() as u32;
        let (x, y, _, _) = clamped_bounds(&detection.region, canvas.width(), canvas.height());

        // above the box when there's room, otherwise just inside its top edge
        let gap = self.style.line_width + 1;
        let y = match y.checked_sub(line_height + gap) {
            Some(above) => above,
            None => y + gap,
        };
        draw_text_mut(
            canvas,
            self.style.label_color,
            x as i32,
            y as i32,
            scale,
            &self.font,
            &detection.text,
        );
    }
}
