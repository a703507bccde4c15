use image::DynamicImage;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AugmentError, AugmentResult};
use crate::filter::filter_valid;
use crate::geometry::{transform_records, BoxRotation, TransformOptions, TransformSpec};
use crate::image_ops::{adjust_hsv, apply_transform, load_image, save_image, zoom_image, ZoomSpec};
use crate::io::{
    collect_file_pairs, copy_yaml_files, discover_splits, find_dataset_yaml, parse_file,
    save_file, setup_output_directories, DatasetYaml,
};
use crate::types::{
    FilePair, LabelFormat, LabelRecord, ProcessingStats, SplitDirs, StatsSnapshot, LABEL_EXT,
};
use crate::utils::{create_io_thread_pool, create_progress_bar, suffixed_file_name};

/// What a run does to every image/label pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Augmentation {
    /// Moves pixels, so labels are transformed with the same geometry
    Geometric {
        spec: TransformSpec,
        box_rotation: BoxRotation,
    },
    /// Color change only; labels are copied unchanged
    Hsv {
        hue: f32,
        saturation: f32,
        value: f32,
    },
    /// Resize; normalized labels are copied unchanged
    Zoom(ZoomSpec),
}

impl Augmentation {
    pub fn apply_image(&self, image: &DynamicImage) -> AugmentResult<DynamicImage> {
        match self {
            Augmentation::Geometric { spec, .. } => apply_transform(image, spec),
            Augmentation::Hsv {
                hue,
                saturation,
                value,
            } => Ok(adjust_hsv(image, *hue, *saturation, *value)),
            Augmentation::Zoom(zoom) => zoom_image(image, zoom),
        }
    }
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub suffix: String,
    pub workers: usize,
    pub label_format: LabelFormat,
    pub min_area_ratio: f64,
    pub augmentation: Augmentation,
}

/// Cooperative stop flag; pairs not yet started when it trips are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run settings that every pair shares
#[derive(Debug, Clone)]
pub struct PairContext<'a> {
    pub augmentation: &'a Augmentation,
    pub suffix: &'a str,
    pub label_format: LabelFormat,
    pub min_area_ratio: f64,
    pub options: TransformOptions,
    /// Keypoints per record declared by the dataset YAML
    pub expected_keypoints: Option<usize>,
}

/// Augment one image and its labels, writing both into the split's output directories.
///
/// Returns the paths written. A missing label file counts as an empty one; malformed label
/// lines are skipped and counted in `stats`.
pub fn process_pair(
    pair: &FilePair,
    split: &SplitDirs,
    ctx: &PairContext,
    stats: &ProcessingStats,
) -> AugmentResult<(PathBuf, PathBuf)> {
    let (image, frame) = load_image(&pair.image_path)?;

    let parsed = parse_file(&pair.label_path, ctx.label_format)?;
    if !parsed.present {
        debug!("No label file at {}", pair.label_path.display());
        stats.increment_missing_labels();
    }
    for e in &parsed.malformed {
        warn!("{}: {}", pair.label_path.display(), e);
    }
    stats.add_malformed_records(parsed.malformed.len());
    check_keypoint_count(&parsed.records, ctx.expected_keypoints, &pair.label_path);

    let records = match ctx.augmentation {
        Augmentation::Geometric { spec, .. } => {
            let outcome = transform_records(parsed.records, spec, frame, &ctx.options)?;
            let before = outcome.records.len();
            let kept = filter_valid(outcome.records, ctx.min_area_ratio);
            stats.add_dropped_records(before - kept.len());
            kept
        }
        Augmentation::Hsv { .. } | Augmentation::Zoom(_) => parsed.records,
    };
    let augmented = ctx.augmentation.apply_image(&image)?;

    let stem = pair
        .image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = pair
        .image_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image_out = split
        .output_images_dir
        .join(suffixed_file_name(&stem, ctx.suffix, &extension));
    let label_out = split
        .output_labels_dir
        .join(suffixed_file_name(&stem, ctx.suffix, LABEL_EXT));

    save_image(&augmented, &image_out)?;
    save_file(&label_out, &records)?;
    Ok((image_out, label_out))
}

fn check_keypoint_count(records: &[LabelRecord], expected: Option<usize>, label_path: &Path) {
    let Some(expected) = expected else {
        return;
    };
    let mismatched = records.iter().find_map(|record| match record {
        LabelRecord::BoxKeypoint { keypoints, .. } if keypoints.len() != expected => {
            Some(keypoints.len())
        }
        _ => None,
    });
    if let Some(found) = mismatched {
        warn!(
            "{}: record has {} keypoints but the dataset declares {}",
            label_path.display(),
            found,
            expected
        );
    }
}

/// Run an augmentation over every split of a dataset.
///
/// Per-pair problems never abort the run: they are logged and counted, and the returned
/// snapshot reports them. Only setup failures (unreadable input, output not writable, worker
/// pool) are returned as errors.
pub fn process_dataset(config: &AugmentConfig, cancel: &CancelToken) -> AugmentResult<StatsSnapshot> {
    if !config.input.is_dir() {
        return Err(AugmentError::io(
            &config.input,
            std::io::Error::new(ErrorKind::NotFound, "dataset directory does not exist"),
        ));
    }

    // Without a dataset YAML, `Auto` is settled per label file
    let (dataset_yaml, label_format) = match find_dataset_yaml(&config.input) {
        Some(yaml) => {
            let format = yaml.resolve_format(config.label_format);
            (yaml, format)
        }
        None => (DatasetYaml::default(), config.label_format),
    };
    debug!("Reading labels as {:?}", label_format);
    let box_rotation = match config.augmentation {
        Augmentation::Geometric { box_rotation, .. } => box_rotation,
        _ => BoxRotation::default(),
    };
    let ctx = PairContext {
        augmentation: &config.augmentation,
        suffix: &config.suffix,
        label_format,
        min_area_ratio: config.min_area_ratio,
        options: TransformOptions {
            box_rotation,
            flip_idx: dataset_yaml.flip_idx.clone(),
        },
        expected_keypoints: dataset_yaml.keypoint_count(),
    };
    if let Some(classes) = dataset_yaml.class_count() {
        info!("Dataset declares {} classes", classes);
    }

    let splits = discover_splits(&config.input, &config.output);
    if splits.is_empty() {
        warn!(
            "No train/valid/val/test splits with an images directory under {}",
            config.input.display()
        );
    }
    setup_output_directories(&splits)?;

    let pool = create_io_thread_pool(config.workers)?;
    let stats = ProcessingStats::new();

    for split in &splits {
        let pairs = collect_file_pairs(split);
        info!("Processing split '{}' ({} images)...", split.name, pairs.len());
        let pb = create_progress_bar(pairs.len() as u64, &split.name);

        pool.install(|| {
            pairs.par_iter().for_each(|pair| {
                stats.increment_total();
                if cancel.is_cancelled() {
                    stats.increment_cancelled();
                } else {
                    record_outcome(process_pair(pair, split, &ctx, &stats), pair, &stats);
                }
                pb.inc(1);
            });
        });
        pb.finish_with_message(format!("{} complete", split.name));
    }

    copy_yaml_files(&config.input, &config.output)?;
    if cancel.is_cancelled() {
        warn!("Run cancelled; output is incomplete");
    }
    stats.print_summary();
    Ok(stats.snapshot())
}

fn record_outcome(
    result: AugmentResult<(PathBuf, PathBuf)>,
    pair: &FilePair,
    stats: &ProcessingStats,
) {
    match result {
        Ok((image_out, _)) => {
            debug!("Wrote {}", image_out.display());
            stats.increment_successful();
        }
        Err(e @ AugmentError::MissingImage { .. }) => {
            warn!("Skipping pair: {}", e);
            stats.increment_skipped_missing_image();
        }
        Err(e @ AugmentError::InvalidTransformSpec(_)) => {
            warn!("Skipping {}: {}", pair.image_path.display(), e);
            stats.increment_skipped_invalid_transform();
        }
        Err(e) => {
            error!("Failed to process {}: {}", pair.image_path.display(), e);
            stats.increment_failed();
        }
    }
}
