//! Coordinate transforms for normalized YOLO geometry.
//!
//! Everything here is pure: functions take points or records and return fresh values, so they
//! can be called from any number of worker threads without coordination.
//!
//! Angles are in degrees, positive = counter-clockwise in the mathematical frame, and are applied
//! with the standard matrix `[cos -sin; sin cos]` to `(x, y)` image coordinates. Because image `y`
//! grows downward, a positive angle turns the picture clockwise as displayed. The image side
//! ([`crate::image_ops`]) uses the same matrix in the same pixel frame, so points and pixels agree.

use clap::ValueEnum;
use log::warn;

use crate::error::{AugmentError, AugmentResult};
use crate::types::{BoundingBox, ImageFrame, Keypoint, LabelRecord, NormalizedPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Mirror left-right: `x' = 1 - x`
    Horizontal,
    /// Mirror top-bottom: `y' = 1 - y`
    Vertical,
}

/// A single geometric operation applied to an image and its labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformSpec {
    FlipHorizontal,
    FlipVertical,
    Rotate {
        angle_degrees: f64,
        expand_canvas: bool,
    },
}

impl TransformSpec {
    /// Check this transform against the frame it will be applied to.
    pub fn validate(&self, frame: ImageFrame) -> AugmentResult<()> {
        match *self {
            TransformSpec::FlipHorizontal | TransformSpec::FlipVertical => Ok(()),
            TransformSpec::Rotate {
                angle_degrees,
                expand_canvas,
            } => {
                if !angle_degrees.is_finite() {
                    return Err(AugmentError::InvalidTransformSpec(format!(
                        "rotation angle must be finite, got {angle_degrees}"
                    )));
                }
                if expand_canvas && !frame.is_valid() {
                    return Err(AugmentError::InvalidTransformSpec(format!(
                        "expand-canvas rotation needs a non-empty frame, got {}x{}",
                        frame.width, frame.height
                    )));
                }
                Ok(())
            }
        }
    }

    /// The frame an image of `frame` size has after this transform.
    pub fn output_frame(&self, frame: ImageFrame) -> ImageFrame {
        match *self {
            TransformSpec::Rotate {
                angle_degrees,
                expand_canvas: true,
            } => frame.expanded(angle_degrees),
            _ => frame,
        }
    }
}

/// How the `cx cy w h` box of a pose record follows a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BoxRotation {
    /// Rotate the box center only; width and height pass through unchanged (they are
    /// re-normalized when the canvas grows).
    /// Not geometrically correct for angles that are not multiples of 90 degrees.
    #[default]
    CenterOnly,
    /// Rotate all four corners and take their axis-aligned bounds.
    Corners,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub box_rotation: BoxRotation,
    /// Keypoint permutation applied after a horizontal flip (the dataset's `flip_idx`)
    pub flip_idx: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub records: Vec<LabelRecord>,
    pub frame: ImageFrame,
}

pub(crate) fn is_full_turn(angle_degrees: f64) -> bool {
    angle_degrees % 360.0 == 0.0
}

impl ImageFrame {
    /// Canvas that holds an image of this size rotated by `angle_degrees` without cropping.
    ///
    /// Sizes are truncated toward zero. The image rotation in [`crate::image_ops`] calls this
    /// same function, so labels and pixels always agree on the new canvas.
    pub fn expanded(&self, angle_degrees: f64) -> ImageFrame {
        if is_full_turn(angle_degrees) {
            return *self;
        }
        let rad = angle_degrees.to_radians();
        let (cos_a, sin_a) = (rad.cos().abs(), rad.sin().abs());
        let (w, h) = (self.width as f64, self.height as f64);
        let new_width = (w * cos_a + h * sin_a) as u32;
        let new_height = (w * sin_a + h * cos_a) as u32;
        ImageFrame::new(new_height.max(1), new_width.max(1))
    }
}

/// Mirror every point across the given axis.
pub fn flip(points: &[NormalizedPoint], axis: FlipAxis) -> Vec<NormalizedPoint> {
    points.iter().map(|p| flip_point(*p, axis)).collect()
}

fn flip_point(p: NormalizedPoint, axis: FlipAxis) -> NormalizedPoint {
    match axis {
        FlipAxis::Horizontal => NormalizedPoint::new(1.0 - p.x, p.y),
        FlipAxis::Vertical => NormalizedPoint::new(p.x, 1.0 - p.y),
    }
}

/// Rotate points about `(0.5, 0.5)` in normalized space, then clip them to `[0, 1]`.
///
/// Points that leave the frame are pinned to its edge rather than dropped, so a polygon keeps
/// its vertex count; [`crate::filter::filter_valid`] removes what collapses.
pub fn rotate_fixed_canvas(points: &[NormalizedPoint], angle_degrees: f64) -> Vec<NormalizedPoint> {
    if is_full_turn(angle_degrees) {
        return points.to_vec();
    }
    let rotation = PointRotation::fixed(angle_degrees);
    points.iter().map(|p| rotation.apply(*p).clipped()).collect()
}

/// Rotate points onto the grown canvas used by an expand-mode image rotation.
///
/// Returns the rotated points, normalized and clipped against the new canvas, together with
/// that canvas.
pub fn rotate_expand_canvas(
    points: &[NormalizedPoint],
    angle_degrees: f64,
    original_frame: ImageFrame,
) -> AugmentResult<(Vec<NormalizedPoint>, ImageFrame)> {
    TransformSpec::Rotate {
        angle_degrees,
        expand_canvas: true,
    }
    .validate(original_frame)?;
    if is_full_turn(angle_degrees) {
        return Ok((points.to_vec(), original_frame));
    }
    let rotation = PointRotation::expanded(angle_degrees, original_frame);
    let rotated = points.iter().map(|p| rotation.apply(*p).clipped()).collect();
    Ok((rotated, rotation.target_frame(original_frame)))
}

/// Rotation of normalized points, before any clipping
#[derive(Debug, Clone, Copy)]
struct PointRotation {
    cos: f64,
    sin: f64,
    canvas: Canvas,
}

#[derive(Debug, Clone, Copy)]
enum Canvas {
    Fixed,
    Expanded { from: ImageFrame, to: ImageFrame },
}

impl PointRotation {
    fn fixed(angle_degrees: f64) -> Self {
        let rad = angle_degrees.to_radians();
        Self {
            cos: rad.cos(),
            sin: rad.sin(),
            canvas: Canvas::Fixed,
        }
    }

    fn expanded(angle_degrees: f64, from: ImageFrame) -> Self {
        let rad = angle_degrees.to_radians();
        Self {
            cos: rad.cos(),
            sin: rad.sin(),
            canvas: Canvas::Expanded {
                from,
                to: from.expanded(angle_degrees),
            },
        }
    }

    fn target_frame(&self, frame: ImageFrame) -> ImageFrame {
        match self.canvas {
            Canvas::Fixed => frame,
            Canvas::Expanded { to, .. } => to,
        }
    }

    fn rotate(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx * self.cos - dy * self.sin, dx * self.sin + dy * self.cos)
    }

    fn apply(&self, p: NormalizedPoint) -> NormalizedPoint {
        match self.canvas {
            Canvas::Fixed => {
                let (rx, ry) = self.rotate(p.x - 0.5, p.y - 0.5);
                NormalizedPoint::new(rx + 0.5, ry + 0.5)
            }
            Canvas::Expanded { from, to } => {
                let (w, h) = (from.width as f64, from.height as f64);
                let (new_w, new_h) = (to.width as f64, to.height as f64);
                let (rx, ry) = self.rotate(p.x * w - w / 2.0, p.y * h - h / 2.0);
                NormalizedPoint::new((rx + new_w / 2.0) / new_w, (ry + new_h / 2.0) / new_h)
            }
        }
    }

    /// Factors that carry a normalized length from the old canvas to the new one
    fn length_scale(&self) -> (f64, f64) {
        match self.canvas {
            Canvas::Fixed => (1.0, 1.0),
            Canvas::Expanded { from, to } => (
                from.width as f64 / to.width as f64,
                from.height as f64 / to.height as f64,
            ),
        }
    }
}

/// Apply one transform to every record of a label file.
///
/// `frame` is the size of the image the records belong to; the returned outcome carries the
/// frame they belong to afterwards. Polygon vertices are clipped; pose keypoints that end up
/// outside the new frame are also flagged invisible. No record is dropped here.
pub fn transform_records(
    records: Vec<LabelRecord>,
    spec: &TransformSpec,
    frame: ImageFrame,
    options: &TransformOptions,
) -> AugmentResult<TransformOutcome> {
    spec.validate(frame)?;

    let records = match *spec {
        TransformSpec::FlipHorizontal => flip_records(records, FlipAxis::Horizontal, options),
        TransformSpec::FlipVertical => flip_records(records, FlipAxis::Vertical, options),
        TransformSpec::Rotate { angle_degrees, .. } if is_full_turn(angle_degrees) => records,
        TransformSpec::Rotate {
            angle_degrees,
            expand_canvas,
        } => {
            let rotation = if expand_canvas {
                PointRotation::expanded(angle_degrees, frame)
            } else {
                PointRotation::fixed(angle_degrees)
            };
            records
                .into_iter()
                .map(|record| rotate_record(record, &rotation, options.box_rotation))
                .collect()
        }
    };

    Ok(TransformOutcome {
        records,
        frame: spec.output_frame(frame),
    })
}

fn flip_records(
    records: Vec<LabelRecord>,
    axis: FlipAxis,
    options: &TransformOptions,
) -> Vec<LabelRecord> {
    records
        .into_iter()
        .map(|record| match record {
            LabelRecord::Polygon { class_id, vertices } => LabelRecord::Polygon {
                class_id,
                vertices: flip(&vertices, axis),
            },
            LabelRecord::BoxKeypoint {
                class_id,
                bbox,
                keypoints,
            } => {
                let center = flip_point(NormalizedPoint::new(bbox.cx, bbox.cy), axis);
                let mut keypoints: Vec<Keypoint> = keypoints
                    .into_iter()
                    .map(|kp| {
                        let p = flip_point(kp.point(), axis);
                        Keypoint {
                            x: p.x,
                            y: p.y,
                            visibility: kp.visibility,
                        }
                    })
                    .collect();
                if axis == FlipAxis::Horizontal {
                    if let Some(flip_idx) = options.flip_idx.as_deref() {
                        keypoints = permute_keypoints(keypoints, flip_idx);
                    }
                }
                LabelRecord::BoxKeypoint {
                    class_id,
                    bbox: BoundingBox {
                        cx: center.x,
                        cy: center.y,
                        ..bbox
                    },
                    keypoints,
                }
            }
        })
        .collect()
}

fn permute_keypoints(keypoints: Vec<Keypoint>, flip_idx: &[usize]) -> Vec<Keypoint> {
    if flip_idx.len() != keypoints.len() || flip_idx.iter().any(|&i| i >= keypoints.len()) {
        warn!(
            "flip_idx has {} entries but record has {} keypoints; keeping keypoint order",
            flip_idx.len(),
            keypoints.len()
        );
        return keypoints;
    }
    flip_idx.iter().map(|&i| keypoints[i]).collect()
}

fn rotate_record(
    record: LabelRecord,
    rotation: &PointRotation,
    box_rotation: BoxRotation,
) -> LabelRecord {
    match record {
        LabelRecord::Polygon { class_id, vertices } => LabelRecord::Polygon {
            class_id,
            vertices: vertices
                .into_iter()
                .map(|v| rotation.apply(v).clipped())
                .collect(),
        },
        LabelRecord::BoxKeypoint {
            class_id,
            bbox,
            keypoints,
        } => LabelRecord::BoxKeypoint {
            class_id,
            bbox: rotate_box(bbox, rotation, box_rotation),
            keypoints: keypoints
                .into_iter()
                .map(|kp| rotate_keypoint(kp, rotation))
                .collect(),
        },
    }
}

fn rotate_keypoint(kp: Keypoint, rotation: &PointRotation) -> Keypoint {
    let rotated = rotation.apply(kp.point());
    let visibility = if rotated.is_inside_unit() {
        kp.visibility
    } else {
        0
    };
    let clipped = rotated.clipped();
    Keypoint {
        x: clipped.x,
        y: clipped.y,
        visibility,
    }
}

fn rotate_box(bbox: BoundingBox, rotation: &PointRotation, mode: BoxRotation) -> BoundingBox {
    match mode {
        BoxRotation::CenterOnly => {
            let center = rotation
                .apply(NormalizedPoint::new(bbox.cx, bbox.cy))
                .clipped();
            let (sx, sy) = rotation.length_scale();
            BoundingBox {
                cx: center.x,
                cy: center.y,
                w: bbox.w * sx,
                h: bbox.h * sy,
            }
        }
        BoxRotation::Corners => {
            let (hw, hh) = (bbox.w / 2.0, bbox.h / 2.0);
            let corners = [
                NormalizedPoint::new(bbox.cx - hw, bbox.cy - hh),
                NormalizedPoint::new(bbox.cx + hw, bbox.cy - hh),
                NormalizedPoint::new(bbox.cx + hw, bbox.cy + hh),
                NormalizedPoint::new(bbox.cx - hw, bbox.cy + hh),
            ];
            let (min_x, min_y, max_x, max_y) = corners
                .iter()
                .map(|c| rotation.apply(*c).clipped())
                .fold(
                    (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
                    |(min_x, min_y, max_x, max_y), p| {
                        (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
                    },
                );
            BoundingBox {
                cx: (min_x + max_x) / 2.0,
                cy: (min_y + max_y) / 2.0,
                w: max_x - min_x,
                h: max_y - min_y,
            }
        }
    }
}
