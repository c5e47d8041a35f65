use geo::{BoundingRect, Polygon};
use image::{DynamicImage, GenericImageView};
use ndarray::Array3;
use tracing::instrument;

/// Pixel rectangle `(x, y, width, height)` inside an image.
pub type PixelRect = (u32, u32, u32, u32);

/// RGB pixels as a `(height, width, 3)` array, the shape recognizers consume.
#[instrument(level = "debug", skip(image))]
pub fn to_pixel_array(image: &DynamicImage) -> Array3<u8> {
    let image = image.to_rgb8();
    Array3::<u8>::from_shape_fn(
        (image.height() as usize, image.width() as usize, 3),
        |(y, x, ch)| image.get_pixel(x as u32, y as u32).0[ch],
    )
}

/// Axis-aligned bounds of `region` clamped to an image of `width` x `height`.
///
/// Never narrower or shorter than one pixel unless the image itself is empty.
pub fn clamped_bounds(region: &Polygon<f32>, width: u32, height: u32) -> PixelRect {
    let Some(rect) = region.bounding_rect() else {
        return (0, 0, width.min(1), height.min(1));
    };
    let (min, max) = (rect.min(), rect.max());

    let x0 = clamp_floor(min.x, width.saturating_sub(1));
    let y0 = clamp_floor(min.y, height.saturating_sub(1));
    let x1 = clamp_ceil(max.x, width).max(x0 + 1).min(width);
    let y1 = clamp_ceil(max.y, height).max(y0 + 1).min(height);
    log::trace!("Clamped {rect:?} to ({x0}, {y0})..({x1}, {y1})");
    (x0, y0, x1 - x0, y1 - y0)
}

fn clamp_floor(value: f32, max: u32) -> u32 {
    (value.floor().max(0.0) as u32).min(max)
}

fn clamp_ceil(value: f32, max: u32) -> u32 {
    (value.ceil().max(0.0) as u32).min(max)
}

pub(crate) fn part_image(image: &DynamicImage, region: &Polygon<f32>) -> DynamicImage {
    let (width, height) = image.dimensions();
    let (x, y, w, h) = clamped_bounds(region, width, height);
    image.crop_imm(x, y, w, h)
}
