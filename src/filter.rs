use crate::types::{LabelRecord, NormalizedPoint};

/// Smallest polygon area kept after a transform, as a fraction of the image
pub const DEFAULT_MIN_AREA_RATIO: f64 = 0.001;

/// Area of a closed polygon in normalized units (shoelace formula).
pub fn polygon_area(vertices: &[NormalizedPoint]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let n = vertices.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice_area.abs() / 2.0
}

/// Drop polygons that a transform collapsed: fewer than 3 vertices, or an area below
/// `min_area_ratio` of the frame. Pose records always survive.
pub fn filter_valid(records: Vec<LabelRecord>, min_area_ratio: f64) -> Vec<LabelRecord> {
    records
        .into_iter()
        .filter(|record| match record {
            LabelRecord::BoxKeypoint { .. } => true,
            LabelRecord::Polygon { vertices, .. } => {
                vertices.len() >= 3 && polygon_area(vertices) >= min_area_ratio
            }
        })
        .collect()
}
