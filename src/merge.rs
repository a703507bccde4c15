use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AugmentError, AugmentResult};
use crate::io::{collect_file_pairs, copy_yaml_files, discover_splits, setup_output_directories};
use crate::utils::{create_progress_bar, ensure_directory};

/// Counts reported by [`merge_datasets`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub copied_images: usize,
    pub copied_labels: usize,
    /// Images whose file name was already taken by an earlier input; the earlier one is kept
    pub name_collisions: usize,
}

/// Merge several datasets split by split into `output`.
///
/// Images (and their label files, when present) are copied under their own names. The first
/// input that provides a file name wins. Dataset YAML files come from the first input only.
pub fn merge_datasets(inputs: &[PathBuf], output: &Path) -> AugmentResult<MergeStats> {
    ensure_directory(output)?;
    let mut stats = MergeStats::default();

    if let Some(first) = inputs.first() {
        if copy_yaml_files(first, output)? == 0 {
            warn!(
                "No dataset YAML in {}; the merged dataset needs one written by hand",
                first.display()
            );
        }
    }

    for input in inputs {
        if !input.is_dir() {
            warn!("Skipping missing dataset {}", input.display());
            continue;
        }
        let splits = discover_splits(input, output);
        setup_output_directories(&splits)?;

        for split in &splits {
            let pairs = collect_file_pairs(split);
            info!(
                "Merging {} images from {}",
                pairs.len(),
                split.images_dir.display()
            );
            let pb = create_progress_bar(pairs.len() as u64, &split.name);
            for pair in &pairs {
                pb.inc(1);
                let Some(image_name) = pair.image_path.file_name() else {
                    continue;
                };
                let image_dst = split.output_images_dir.join(image_name);
                if image_dst.exists() {
                    warn!("{} already merged, skipping", image_dst.display());
                    stats.name_collisions += 1;
                    continue;
                }
                copy_file(&pair.image_path, &image_dst)?;
                stats.copied_images += 1;

                if let Some(label_name) = pair.label_path.file_name() {
                    if pair.label_path.is_file() {
                        copy_file(&pair.label_path, &split.output_labels_dir.join(label_name))?;
                        stats.copied_labels += 1;
                    }
                }
            }
            pb.finish_with_message(format!("{} merged", split.name));
        }
    }

    info!(
        "Merged {} images and {} labels into {}",
        stats.copied_images,
        stats.copied_labels,
        output.display()
    );
    Ok(stats)
}

fn copy_file(src: &Path, dst: &Path) -> AugmentResult<()> {
    fs::copy(src, dst).map_err(|e| AugmentError::io(src, e))?;
    Ok(())
}
