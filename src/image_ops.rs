//! Pixel-side counterparts of the label transforms.
//!
//! Rotations are built as `imageproc` projections from the same matrix the label geometry uses.
//! `Projection::rotate` is documented as clockwise because image rows grow downward; in that
//! y-down frame it is exactly the `[cos -sin; sin cos]` matrix applied to label points, so the
//! angle is passed through unchanged. Negating it here would mirror every label.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, Rgba};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use log::warn;
use std::path::Path;

use crate::error::{AugmentError, AugmentResult};
use crate::geometry::{is_full_turn, FlipAxis, TransformSpec};
use crate::types::ImageFrame;

/// Decode an image and report its frame. Absent and undecodable files are both `MissingImage`.
pub fn load_image(path: &Path) -> AugmentResult<(DynamicImage, ImageFrame)> {
    if !path.is_file() {
        return Err(AugmentError::MissingImage {
            path: path.to_path_buf(),
        });
    }
    let image = image::open(path).map_err(|e| {
        warn!("Cannot decode {}: {}", path.display(), e);
        AugmentError::MissingImage {
            path: path.to_path_buf(),
        }
    })?;
    let (width, height) = image.dimensions();
    Ok((image, ImageFrame::new(height, width)))
}

/// Encode an image, picking the codec from the file extension.
pub fn save_image(image: &DynamicImage, path: &Path) -> AugmentResult<()> {
    let is_jpeg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
    let result = if is_jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8()).save(path)
    } else {
        image.save(path)
    };
    result.map_err(|source| AugmentError::Image {
        path: path.to_path_buf(),
        source,
    })
}

pub fn frame_of(image: &DynamicImage) -> ImageFrame {
    ImageFrame::new(image.height(), image.width())
}

pub fn flip_image(image: &DynamicImage, axis: FlipAxis) -> DynamicImage {
    match axis {
        FlipAxis::Horizontal => image.fliph(),
        FlipAxis::Vertical => image.flipv(),
    }
}

/// Apply the pixel half of a [`TransformSpec`].
pub fn apply_transform(image: &DynamicImage, spec: &TransformSpec) -> AugmentResult<DynamicImage> {
    spec.validate(frame_of(image))?;
    Ok(match *spec {
        TransformSpec::FlipHorizontal => flip_image(image, FlipAxis::Horizontal),
        TransformSpec::FlipVertical => flip_image(image, FlipAxis::Vertical),
        TransformSpec::Rotate {
            angle_degrees,
            expand_canvas,
        } => rotate_image(image, angle_degrees, expand_canvas),
    })
}

/// Rotate an image by `angle_degrees` (same convention as the label geometry).
///
/// With `expand_canvas` the output grows to [`ImageFrame::expanded`] and the pixels are rotated
/// rigidly about the image center. Without it the canvas keeps its size and the rotation happens
/// in normalized coordinates, matching [`crate::geometry::rotate_fixed_canvas`] for any aspect
/// ratio. Uncovered areas are filled with black (transparent when the image has alpha).
pub fn rotate_image(image: &DynamicImage, angle_degrees: f64, expand_canvas: bool) -> DynamicImage {
    if is_full_turn(angle_degrees) {
        return image.clone();
    }
    let frame = frame_of(image);
    let target = if expand_canvas {
        frame.expanded(angle_degrees)
    } else {
        frame
    };
    let projection = rotation_projection(angle_degrees, frame, target, expand_canvas);

    if image.color().has_alpha() {
        let fill = Rgba([0, 0, 0, 0]);
        let mut out = ImageBuffer::from_pixel(target.width, target.height, fill);
        warp_into(&image.to_rgba8(), &projection, Interpolation::Bilinear, fill, &mut out);
        DynamicImage::ImageRgba8(out)
    } else {
        let fill = Rgb([0, 0, 0]);
        let mut out = ImageBuffer::from_pixel(target.width, target.height, fill);
        warp_into(&image.to_rgb8(), &projection, Interpolation::Bilinear, fill, &mut out);
        DynamicImage::ImageRgb8(out)
    }
}

/// Projection from source pixel indices to target pixel indices.
///
/// Pixel `i` covers `[i, i + 1)`, so its center sits at `i + 0.5` in the continuous frame the
/// label geometry works in; the half-pixel shifts below account for that.
fn rotation_projection(
    angle_degrees: f64,
    source: ImageFrame,
    target: ImageFrame,
    expand_canvas: bool,
) -> Projection {
    let theta = angle_degrees.to_radians() as f32;
    let (w, h) = (source.width as f32, source.height as f32);
    let (new_w, new_h) = (target.width as f32, target.height as f32);
    let to_center = Projection::translate(-(w - 1.0) / 2.0, -(h - 1.0) / 2.0);
    let from_center = Projection::translate((new_w - 1.0) / 2.0, (new_h - 1.0) / 2.0);

    if expand_canvas {
        from_center * Projection::rotate(theta) * to_center
    } else {
        from_center
            * Projection::scale(w, h)
            * Projection::rotate(theta)
            * Projection::scale(1.0 / w, 1.0 / h)
            * to_center
    }
}

/// Scale hue, saturation and value by factors in `[0, 2]`, clipping each channel to its range.
///
/// Hue is scaled on the 0-360 degree circle without wrapping, so `hue > 1` pushes colors toward
/// magenta rather than cycling.
pub fn adjust_hsv(image: &DynamicImage, hue: f32, saturation: f32, value: f32) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let (h, s, v) = rgb_to_hsv(r, g, b);
        let (r, g, b) = hsv_to_rgb(
            (h * hue).clamp(0.0, 360.0),
            (s * saturation).clamp(0.0, 1.0),
            (v * value).clamp(0.0, 1.0),
        );
        *pixel = Rgba([r, g, b, a]);
    }
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(rgba)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let sector = (h / 60.0).rem_euclid(6.0);
    let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_u8 = |channel: f32| ((channel + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r), to_u8(g), to_u8(b))
}

/// Target size of a zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomSpec {
    Size { width: u32, height: u32 },
    Ratio { x: f64, y: f64 },
}

impl ZoomSpec {
    pub fn target_frame(&self, frame: ImageFrame) -> AugmentResult<ImageFrame> {
        let target = match *self {
            ZoomSpec::Size { width, height } => ImageFrame::new(height, width),
            ZoomSpec::Ratio { x, y } => {
                if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
                    return Err(AugmentError::InvalidTransformSpec(format!(
                        "zoom ratios must be positive, got {x} x {y}"
                    )));
                }
                ImageFrame::new(
                    (frame.height as f64 * y).round() as u32,
                    (frame.width as f64 * x).round() as u32,
                )
            }
        };
        if !target.is_valid() {
            return Err(AugmentError::InvalidTransformSpec(format!(
                "zoom would produce an empty {}x{} image",
                target.width, target.height
            )));
        }
        Ok(target)
    }
}

/// Resize an image. Labels are normalized, so they carry over unchanged.
pub fn zoom_image(image: &DynamicImage, zoom: &ZoomSpec) -> AugmentResult<DynamicImage> {
    let frame = frame_of(image);
    let target = zoom.target_frame(frame)?;
    if target == frame {
        return Ok(image.clone());
    }
    Ok(image.resize_exact(target.width, target.height, FilterType::Triangle))
}
