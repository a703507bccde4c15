use glob::glob;
use jwalk::WalkDir;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::conversion::{parse_as, serialize};
use crate::error::{AugmentError, AugmentResult};
use crate::types::{
    get_image_extensions_set, FilePair, LabelFormat, LabelRecord, SplitDirs, IMAGES_DIR_NAME,
    LABELS_DIR_NAME, LABEL_EXT, SPLIT_NAMES,
};
use crate::utils::ensure_directory;

/// Records read from one label file
#[derive(Debug, Default)]
pub struct ParsedLabels {
    pub records: Vec<LabelRecord>,
    /// One `MalformedRecord` per skipped line, carrying its 1-based line number
    pub malformed: Vec<AugmentError>,
    /// `false` when the label file does not exist (a valid, empty label set)
    pub present: bool,
}

/// Read every record of a label file.
///
/// A missing file yields zero records. Malformed lines are collected and skipped; the rest of
/// the file is still read. `Auto` is settled once for the whole file (see [`detect_format`]) so
/// every line of a file is read with the same layout.
pub fn parse_file(path: &Path, format: LabelFormat) -> AugmentResult<ParsedLabels> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ParsedLabels::default()),
        Err(e) => return Err(AugmentError::io(path, e)),
    };

    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    let format = match format {
        LabelFormat::Auto => detect_format(lines.iter().map(|(_, line)| *line)),
        other => other,
    };

    let mut parsed = ParsedLabels {
        present: true,
        ..ParsedLabels::default()
    };
    for (index, line) in lines {
        match parse_as(line, format) {
            Ok(record) => parsed.records.push(record),
            Err(e) => parsed.malformed.push(e.at_line(index + 1)),
        }
    }
    Ok(parsed)
}

/// Pick one layout for a set of label lines.
///
/// `Pose` only when every line that fits either layout fits the pose layout; otherwise
/// `Segment`. Lines that fit neither are malformed either way and do not vote. A file whose
/// lines all fit both layouts is read as pose; pass a dataset YAML or `--label_format` to
/// settle that case.
pub fn detect_format<'a>(lines: impl IntoIterator<Item = &'a str>) -> LabelFormat {
    let mut any_pose = false;
    for line in lines {
        let fits_pose = parse_as(line, LabelFormat::Pose).is_ok();
        if !fits_pose && parse_as(line, LabelFormat::Segment).is_ok() {
            return LabelFormat::Segment;
        }
        any_pose |= fits_pose;
    }
    if any_pose {
        LabelFormat::Pose
    } else {
        LabelFormat::Segment
    }
}

/// Write records to a label file, one line each. An empty slice writes an empty file.
pub fn save_file(path: &Path, records: &[LabelRecord]) -> AugmentResult<()> {
    let file = File::create(path).map_err(|e| AugmentError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, "{}", serialize(record)).map_err(|e| AugmentError::io(path, e))?;
    }
    writer.flush().map_err(|e| AugmentError::io(path, e))
}

/// Find the splits present under `input` and pair each with its place under `output`.
pub fn discover_splits(input: &Path, output: &Path) -> Vec<SplitDirs> {
    SPLIT_NAMES
        .iter()
        .filter_map(|name| {
            let images_dir = input.join(name).join(IMAGES_DIR_NAME);
            if !images_dir.is_dir() {
                debug!("No {} directory for split {}", IMAGES_DIR_NAME, name);
                return None;
            }
            Some(SplitDirs {
                name: name.to_string(),
                images_dir,
                labels_dir: input.join(name).join(LABELS_DIR_NAME),
                output_images_dir: output.join(name).join(IMAGES_DIR_NAME),
                output_labels_dir: output.join(name).join(LABELS_DIR_NAME),
            })
        })
        .collect()
}

/// Set up the output directory structure for every split
pub fn setup_output_directories(splits: &[SplitDirs]) -> AugmentResult<()> {
    for split in splits {
        ensure_directory(&split.output_images_dir)?;
        ensure_directory(&split.output_labels_dir)?;
    }
    Ok(())
}

/// List the images of a split with the label path each one maps to, sorted by file name.
pub fn collect_file_pairs(split: &SplitDirs) -> Vec<FilePair> {
    let extensions = get_image_extensions_set();
    let mut pairs: Vec<FilePair> = WalkDir::new(&split.images_dir)
        .max_depth(1)
        .skip_hidden(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
        })
        .filter_map(|image_path| {
            let mut label_name = image_path.file_stem()?.to_os_string();
            label_name.push(".");
            label_name.push(LABEL_EXT);
            let label_path = split.labels_dir.join(label_name);
            Some(FilePair {
                image_path,
                label_path,
            })
        })
        .collect();
    pairs.sort_by(|a, b| a.image_path.cmp(&b.image_path));
    pairs
}

/// Dataset description file (`data.yaml`) fields used by the augmentation tools
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetYaml {
    #[serde(default)]
    pub names: Option<serde_yaml::Value>,
    /// `[keypoints, dims]`, e.g. `[17, 3]`; present only for pose datasets
    #[serde(default)]
    pub kpt_shape: Option<Vec<usize>>,
    #[serde(default)]
    pub flip_idx: Option<Vec<usize>>,
}

impl DatasetYaml {
    pub fn keypoint_count(&self) -> Option<usize> {
        self.kpt_shape.as_ref().and_then(|shape| shape.first().copied())
    }

    pub fn class_count(&self) -> Option<usize> {
        match self.names.as_ref()? {
            serde_yaml::Value::Sequence(seq) => Some(seq.len()),
            serde_yaml::Value::Mapping(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Resolve `Auto` from the dataset: `Pose` when it declares `kpt_shape`, `Segment` otherwise.
    pub fn resolve_format(&self, requested: LabelFormat) -> LabelFormat {
        match requested {
            LabelFormat::Auto if self.kpt_shape.is_some() => LabelFormat::Pose,
            LabelFormat::Auto => LabelFormat::Segment,
            other => other,
        }
    }
}

/// `*.yaml` then `*.yml` files directly inside `dir`, sorted
pub fn find_yaml_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for ext in ["yaml", "yml"] {
        let pattern = dir.join(format!("*.{ext}"));
        let Some(pattern) = pattern.to_str() else {
            warn!("Skipping YAML lookup in non UTF-8 path {:?}", dir);
            return found;
        };
        match glob(pattern) {
            Ok(paths) => {
                let mut paths: Vec<PathBuf> = paths.filter_map(|entry| entry.ok()).collect();
                paths.sort();
                found.extend(paths);
            }
            Err(e) => warn!("Invalid YAML glob pattern {}: {}", pattern, e),
        }
    }
    found
}

pub fn load_dataset_yaml(path: &Path) -> AugmentResult<DatasetYaml> {
    let file = File::open(path).map_err(|e| AugmentError::io(path, e))?;
    serde_yaml::from_reader(file).map_err(|source| AugmentError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the first dataset YAML in `dir`, if any parses
pub fn find_dataset_yaml(dir: &Path) -> Option<DatasetYaml> {
    for path in find_yaml_files(dir) {
        match load_dataset_yaml(&path) {
            Ok(config) => {
                info!("Using dataset config {}", path.display());
                return Some(config);
            }
            Err(e) => warn!("Ignoring dataset config: {}", e),
        }
    }
    None
}

/// Copy the dataset YAML files of `input` into `output`; returns how many were copied.
pub fn copy_yaml_files(input: &Path, output: &Path) -> AugmentResult<usize> {
    ensure_directory(output)?;
    let mut copied = 0;
    for src in find_yaml_files(input) {
        let Some(file_name) = src.file_name() else {
            continue;
        };
        let dst = output.join(file_name);
        fs::copy(&src, &dst).map_err(|e| AugmentError::io(&src, e))?;
        info!("Copied {} to output directory", file_name.to_string_lossy());
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalizedPoint;

    #[test]
    fn test_parse_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let parsed = parse_file(&temp_dir.path().join("nope.txt"), LabelFormat::Auto).unwrap();
        assert!(!parsed.present);
        assert!(parsed.records.is_empty());
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn test_parse_file_skips_malformed_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("labels.txt");
        fs::write(
            &path,
            "0 0.1 0.1 0.9 0.1 0.5 0.9\n\n1 0.2 oops\n2 0.2 0.2 0.8 0.2 0.5 0.8\n",
        )
        .unwrap();

        let parsed = parse_file(&path, LabelFormat::Auto).unwrap();
        assert!(parsed.present);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.malformed.len(), 1);
        assert!(matches!(
            parsed.malformed[0],
            AugmentError::MalformedRecord { line: 3, .. }
        ));
    }

    #[test]
    fn test_border_polygon_is_not_read_as_pose() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("labels.txt");
        // 10 values with 0/1 in every third slot also fit `cx cy w h` plus two keypoints
        fs::write(
            &path,
            "0 0.2 0.2 0.8 0.2 0.9 0.5 1.0 0.8 0.3 1.0\n1 0.1 0.1 0.9 0.1 0.5 0.9\n",
        )
        .unwrap();

        let parsed = parse_file(&path, LabelFormat::Auto).unwrap();
        assert!(parsed.malformed.is_empty());
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed
            .records
            .iter()
            .all(|r| matches!(r, LabelRecord::Polygon { .. })));
        let LabelRecord::Polygon { vertices, .. } = &parsed.records[0] else {
            unreachable!()
        };
        assert_eq!(vertices.len(), 5);
    }

    #[test]
    fn test_detect_format_per_file() {
        let pose = "0 0.5 0.5 0.2 0.2 0.5 0.5 2";
        let border_polygon = "0 0.2 0.2 0.8 0.2 0.9 0.5 1.0 0.8 0.3 1.0";
        let triangle = "0 0.1 0.1 0.9 0.1 0.5 0.9";
        assert_eq!(detect_format([pose, "garbage"]), LabelFormat::Pose);
        assert_eq!(detect_format([border_polygon, triangle]), LabelFormat::Segment);
        assert_eq!(detect_format([triangle, pose]), LabelFormat::Segment);
        assert_eq!(detect_format(Vec::<&str>::new()), LabelFormat::Segment);
    }

    #[test]
    fn test_save_then_parse_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        let records = vec![LabelRecord::Polygon {
            class_id: 5,
            vertices: vec![
                NormalizedPoint::new(0.9, 0.1),
                NormalizedPoint::new(0.1, 0.1),
                NormalizedPoint::new(0.5, 0.9),
            ],
        }];
        save_file(&path, &records).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "5 0.900000 0.100000 0.100000 0.100000 0.500000 0.900000\n"
        );
        assert_eq!(parse_file(&path, LabelFormat::Auto).unwrap().records, records);
    }

    #[test]
    fn test_discover_splits_and_pairs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("ds");
        fs::create_dir_all(root.join("train/images")).unwrap();
        fs::create_dir_all(root.join("train/labels")).unwrap();
        fs::create_dir_all(root.join("test/labels")).unwrap();
        fs::write(root.join("train/images/b.PNG"), b"").unwrap();
        fs::write(root.join("train/images/a.jpg"), b"").unwrap();
        fs::write(root.join("train/images/c.v2.jpeg"), b"").unwrap();
        fs::write(root.join("train/images/notes.md"), b"").unwrap();

        let splits = discover_splits(&root, &temp_dir.path().join("out"));
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].name, "train");

        let pairs = collect_file_pairs(&splits[0]);
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].image_path.ends_with("a.jpg"));
        assert_eq!(pairs[0].label_path, root.join("train/labels/a.txt"));
        assert_eq!(pairs[1].label_path, root.join("train/labels/b.txt"));
        assert_eq!(pairs[2].label_path, root.join("train/labels/c.v2.txt"));
    }

    #[test]
    fn test_dataset_yaml_resolves_pose_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("data.yaml"),
            "names:\n  0: person\nkpt_shape: [17, 3]\nflip_idx: [0, 2, 1]\n",
        )
        .unwrap();

        let config = find_dataset_yaml(temp_dir.path()).unwrap();
        assert_eq!(config.keypoint_count(), Some(17));
        assert_eq!(config.class_count(), Some(1));
        assert_eq!(config.flip_idx, Some(vec![0, 2, 1]));
        assert_eq!(config.resolve_format(LabelFormat::Auto), LabelFormat::Pose);
        assert_eq!(
            config.resolve_format(LabelFormat::Segment),
            LabelFormat::Segment
        );
    }

    #[test]
    fn test_dataset_yaml_without_keypoints_resolves_segment() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("data.yaml"), "names: [thing]\n").unwrap();

        let config = find_dataset_yaml(temp_dir.path()).unwrap();
        assert_eq!(config.resolve_format(LabelFormat::Auto), LabelFormat::Segment);
        assert_eq!(config.resolve_format(LabelFormat::Pose), LabelFormat::Pose);
    }

    #[test]
    fn test_copy_yaml_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("data.yaml"), "names: [a]\n").unwrap();
        fs::write(input.join("extra.yml"), "x: 1\n").unwrap();
        fs::write(input.join("readme.txt"), "skip").unwrap();

        assert_eq!(copy_yaml_files(&input, &output).unwrap(), 2);
        assert!(output.join("data.yaml").is_file());
        assert!(output.join("extra.yml").is_file());
        assert!(!output.join("readme.txt").exists());
    }
}
