use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::CancelToken;
use crate::error::{AugmentError, AugmentResult};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create a directory (and its parents) if it is not there yet
pub fn ensure_directory(path: &Path) -> AugmentResult<PathBuf> {
    fs::create_dir_all(path).map_err(|e| AugmentError::io(path, e))?;
    Ok(path.to_path_buf())
}

/// Build the worker pool pairs are processed on. `0` lets rayon pick one thread per core.
pub fn create_io_thread_pool(workers: usize) -> AugmentResult<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("augment-worker-{i}"))
        .build()?;
    Ok(pool)
}

/// A token that trips on Ctrl+C, so in-flight pairs finish and the rest are skipped.
pub fn cancel_on_interrupt() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!("Failed to set Ctrl+C handler: {}", e);
    }
    token
}

/// `<stem>_<suffix>.<ext>`, with the stem and suffix made safe for the filesystem
pub fn suffixed_file_name(stem: &str, suffix: &str, extension: &str) -> String {
    let base = sanitize_filename::sanitize(format!("{stem}_{suffix}"));
    if extension.is_empty() {
        base
    } else {
        format!("{base}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed_file_name() {
        assert_eq!(suffixed_file_name("img_001", "flip", "jpg"), "img_001_flip.jpg");
        assert_eq!(suffixed_file_name("img", "rot_90_exp", "txt"), "img_rot_90_exp.txt");
        assert_eq!(suffixed_file_name("a", "b/c", "png"), "a_bc.png");
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("x/y/z");
        ensure_directory(&nested).unwrap();
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
