use crate::error::{AugmentError, AugmentResult};
use crate::types::{BoundingBox, Keypoint, LabelFormat, LabelRecord, NormalizedPoint};

/// Minimum number of coordinates after the class id for a polygon (three vertices)
pub const MIN_POLYGON_COORDS: usize = 6;
/// Number of values in a `cx cy w h` box
pub const BOX_COORDS: usize = 4;

/// Parse one label line, deciding between pose and polygon records from its shape.
pub fn parse(line: &str) -> AugmentResult<LabelRecord> {
    parse_as(line, LabelFormat::Auto)
}

/// Parse one label line as the given format.
///
/// With [`LabelFormat::Auto`] a line is read as a pose record when its value count fits
/// `cx cy w h` plus whole `x y v` triples with valid visibility flags, and as a polygon
/// otherwise.
/// Clipped polygons can fit both layouts, so whole files are settled with
/// [`crate::io::detect_format`] instead of per line.
pub fn parse_as(line: &str, format: LabelFormat) -> AugmentResult<LabelRecord> {
    let mut tokens = line.split_whitespace();
    let class_token = tokens
        .next()
        .ok_or_else(|| AugmentError::malformed("empty line"))?;
    let class_id = class_token.parse::<u32>().map_err(|_| {
        AugmentError::malformed(format!("class id {class_token:?} is not a non-negative integer"))
    })?;

    let values = tokens
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AugmentError::malformed(format!("{token:?} is not a number")))
        })
        .collect::<AugmentResult<Vec<f64>>>()?;

    match format {
        LabelFormat::Pose => parse_pose(class_id, &values),
        LabelFormat::Segment => parse_polygon(class_id, &values),
        LabelFormat::Auto => parse_pose(class_id, &values).or_else(|pose_err| {
            if values.len() % 2 == 0 && values.len() >= MIN_POLYGON_COORDS {
                parse_polygon(class_id, &values)
            } else {
                Err(pose_err)
            }
        }),
    }
}

fn parse_pose(class_id: u32, values: &[f64]) -> AugmentResult<LabelRecord> {
    if values.len() < BOX_COORDS {
        return Err(AugmentError::malformed(format!(
            "expected at least {BOX_COORDS} box values, found {}",
            values.len()
        )));
    }
    let (bbox, rest) = values.split_at(BOX_COORDS);
    if rest.len() % 3 != 0 {
        return Err(AugmentError::malformed(format!(
            "{} values after the box do not form x y v keypoint triples",
            rest.len()
        )));
    }
    let keypoints = rest
        .chunks_exact(3)
        .map(|kp| {
            let visibility = parse_visibility(kp[2])?;
            Ok(Keypoint {
                x: kp[0],
                y: kp[1],
                visibility,
            })
        })
        .collect::<AugmentResult<Vec<_>>>()?;

    Ok(LabelRecord::BoxKeypoint {
        class_id,
        bbox: BoundingBox {
            cx: bbox[0],
            cy: bbox[1],
            w: bbox[2],
            h: bbox[3],
        },
        keypoints,
    })
}

fn parse_visibility(value: f64) -> AugmentResult<u8> {
    match value {
        v if v == 0.0 => Ok(0),
        v if v == 1.0 => Ok(1),
        v if v == 2.0 => Ok(2),
        v => Err(AugmentError::malformed(format!(
            "keypoint visibility must be 0, 1 or 2, found {v}"
        ))),
    }
}

fn parse_polygon(class_id: u32, values: &[f64]) -> AugmentResult<LabelRecord> {
    if values.len() % 2 != 0 {
        return Err(AugmentError::malformed(format!(
            "odd number of polygon coordinates: {}",
            values.len()
        )));
    }
    if values.len() < MIN_POLYGON_COORDS {
        return Err(AugmentError::malformed(format!(
            "polygon needs at least 3 vertices, found {}",
            values.len() / 2
        )));
    }
    Ok(LabelRecord::Polygon {
        class_id,
        vertices: values
            .chunks_exact(2)
            .map(|xy| NormalizedPoint::new(xy[0], xy[1]))
            .collect(),
    })
}

/// Format a record as one label line (without the trailing newline).
///
/// Box and keypoint coordinates keep 2 decimals, polygon vertices 6.
pub fn serialize(record: &LabelRecord) -> String {
    match record {
        LabelRecord::BoxKeypoint {
            class_id,
            bbox,
            keypoints,
        } => {
            let mut line = String::with_capacity(24 + keypoints.len() * 12);
            line.push_str(&format!(
                "{} {:.2} {:.2} {:.2} {:.2}",
                class_id, bbox.cx, bbox.cy, bbox.w, bbox.h
            ));
            for kp in keypoints {
                line.push_str(&format!(" {:.2} {:.2} {}", kp.x, kp.y, kp.visibility));
            }
            line
        }
        LabelRecord::Polygon { class_id, vertices } => {
            let mut line = String::with_capacity(4 + vertices.len() * 18);
            line.push_str(&format!("{}", class_id));
            for v in vertices {
                line.push_str(&format!(" {:.6} {:.6}", v.x, v.y));
            }
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polygon_line() {
        let record = parse("0 0.1 0.1 0.9 0.1 0.5 0.9").unwrap();
        assert_eq!(
            record,
            LabelRecord::Polygon {
                class_id: 0,
                vertices: vec![
                    NormalizedPoint::new(0.1, 0.1),
                    NormalizedPoint::new(0.9, 0.1),
                    NormalizedPoint::new(0.5, 0.9),
                ],
            }
        );
    }

    #[test]
    fn test_parse_pose_line() {
        let record = parse("2 0.5 0.5 0.2 0.2 0.5 0.5 2").unwrap();
        assert_eq!(
            record,
            LabelRecord::BoxKeypoint {
                class_id: 2,
                bbox: BoundingBox {
                    cx: 0.5,
                    cy: 0.5,
                    w: 0.2,
                    h: 0.2
                },
                keypoints: vec![Keypoint {
                    x: 0.5,
                    y: 0.5,
                    visibility: 2
                }],
            }
        );
    }

    #[test]
    fn test_parse_box_without_keypoints() {
        let record = parse("1 0.5 0.4 0.3 0.2").unwrap();
        assert!(matches!(record, LabelRecord::BoxKeypoint { ref keypoints, .. } if keypoints.is_empty()));
    }

    #[test]
    fn test_auto_falls_back_to_polygon_when_visibility_is_invalid() {
        // 10 values fit both shapes; the would-be visibility 0.4 decides polygon
        let record = parse("0 0.1 0.1 0.2 0.1 0.3 0.35 0.4 0.2 0.5 0.6").unwrap();
        assert!(matches!(record, LabelRecord::Polygon { ref vertices, .. } if vertices.len() == 5));
    }

    #[test]
    fn test_forced_segment_reads_ambiguous_line_as_polygon() {
        let line = "0 0.0 0.0 1.0 0.0 1.0 1.0 0.0 1.0 0.5 1.0";
        assert!(matches!(parse(line).unwrap(), LabelRecord::BoxKeypoint { .. }));
        assert!(matches!(
            parse_as(line, LabelFormat::Segment).unwrap(),
            LabelRecord::Polygon { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in [
            "",
            "0 0.1 0.2",
            "0 0.1 0.2 0.3 0.4 0.5",
            "0 0.1 0.1 0.9 0.1 0.5 abc",
            "x 0.1 0.1 0.9 0.1 0.5 0.9",
            "-1 0.1 0.1 0.9 0.1 0.5 0.9",
            "0 0.1 0.1 0.9 0.1 0.5 0.9 0.2",
        ] {
            assert!(
                matches!(parse(line), Err(AugmentError::MalformedRecord { .. })),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_forced_pose_rejects_bad_visibility() {
        let result = parse_as("0 0.5 0.5 0.2 0.2 0.5 0.5 3", LabelFormat::Pose);
        assert!(matches!(result, Err(AugmentError::MalformedRecord { .. })));
    }

    #[test]
    fn test_serialize_precision() {
        let pose = parse("0 0.123 0.456 0.2 0.2 0.5 0.5 2").unwrap();
        assert_eq!(serialize(&pose), "0 0.12 0.46 0.20 0.20 0.50 0.50 2");

        let polygon = parse("3 0.1 0.1 0.9 0.1 0.5 0.9").unwrap();
        assert_eq!(
            serialize(&polygon),
            "3 0.100000 0.100000 0.900000 0.100000 0.500000 0.900000"
        );
    }

    #[test]
    fn test_serialize_then_parse_round_trip() {
        let records = [
            parse("4 0.25 0.75 0.5 0.125 0.1 0.9 1 0.3 0.3 0").unwrap(),
            parse("7 0.123456 0.654321 0.9 0.1 0.5 0.95 0.05 0.5").unwrap(),
        ];
        for record in &records {
            let reparsed = parse(&serialize(record)).unwrap();
            assert_eq!(reparsed.class_id(), record.class_id());
            match (&reparsed, record) {
                (
                    LabelRecord::BoxKeypoint { bbox: a, keypoints: ka, .. },
                    LabelRecord::BoxKeypoint { bbox: b, keypoints: kb, .. },
                ) => {
                    for (x, y) in [(a.cx, b.cx), (a.cy, b.cy), (a.w, b.w), (a.h, b.h)] {
                        assert!((x - y).abs() <= 0.005 + 1e-12);
                    }
                    assert_eq!(ka.len(), kb.len());
                    for (p, q) in ka.iter().zip(kb) {
                        assert!((p.x - q.x).abs() <= 0.005 + 1e-12);
                        assert!((p.y - q.y).abs() <= 0.005 + 1e-12);
                        assert_eq!(p.visibility, q.visibility);
                    }
                }
                (
                    LabelRecord::Polygon { vertices: a, .. },
                    LabelRecord::Polygon { vertices: b, .. },
                ) => {
                    assert_eq!(a.len(), b.len());
                    for (p, q) in a.iter().zip(b) {
                        assert!((p.x - q.x).abs() <= 5e-7);
                        assert!((p.y - q.y).abs() <= 5e-7);
                    }
                }
                _ => panic!("record variant changed across round trip"),
            }
        }
    }
}
