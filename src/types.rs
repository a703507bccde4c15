use clap::ValueEnum;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::OnceLock;

// Image formats the `image` codecs in this build can decode
pub const IMG_FORMATS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

// Split directories looked for under a dataset root, in processing order
pub const SPLIT_NAMES: &[&str] = &["train", "valid", "val", "test"];

pub const IMAGES_DIR_NAME: &str = "images";
pub const LABELS_DIR_NAME: &str = "labels";
pub const LABEL_EXT: &str = "txt";

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// A point relative to image width/height. Usually inside `[0, 1]`, but may leave that range
/// while a transform is being computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn clipped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    pub fn is_inside_unit(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Pixel dimensions of an image, stored in `(height, width)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFrame {
    pub height: u32,
    pub width: u32,
}

impl ImageFrame {
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn is_valid(&self) -> bool {
        self.height > 0 && self.width > 0
    }
}

/// YOLO box in normalized `cx cy w h` form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// 0 = absent/invisible, 1 = labelled but occluded, 2 = visible
    pub visibility: u8,
}

impl Keypoint {
    pub fn point(&self) -> NormalizedPoint {
        NormalizedPoint::new(self.x, self.y)
    }
}

/// One line of a YOLO label file.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelRecord {
    BoxKeypoint {
        class_id: u32,
        bbox: BoundingBox,
        keypoints: Vec<Keypoint>,
    },
    Polygon {
        class_id: u32,
        vertices: Vec<NormalizedPoint>,
    },
}

impl LabelRecord {
    pub fn class_id(&self) -> u32 {
        match self {
            LabelRecord::BoxKeypoint { class_id, .. } | LabelRecord::Polygon { class_id, .. } => {
                *class_id
            }
        }
    }
}

/// Which record shape a label file is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LabelFormat {
    /// Decide per line from the token count
    #[default]
    Auto,
    /// `class cx cy w h [x y v]*`
    Pose,
    /// `class x1 y1 ... xn yn`
    Segment,
}

// Input/output locations for one split
#[derive(Debug, Clone)]
pub struct SplitDirs {
    pub name: String,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_images_dir: PathBuf,
    pub output_labels_dir: PathBuf,
}

// One image and the label file that belongs to it (which may not exist)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

// Struct to hold processing statistics, shared across worker threads
#[derive(Debug, Default)]
pub struct ProcessingStats {
    total_pairs: AtomicUsize,
    successful_pairs: AtomicUsize,
    skipped_missing_image: AtomicUsize,
    skipped_invalid_transform: AtomicUsize,
    failed_pairs: AtomicUsize,
    cancelled_pairs: AtomicUsize,
    missing_labels: AtomicUsize,
    malformed_records: AtomicUsize,
    dropped_records: AtomicUsize,
}

/// Plain-number copy of [`ProcessingStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_pairs: usize,
    pub successful_pairs: usize,
    pub skipped_missing_image: usize,
    pub skipped_invalid_transform: usize,
    pub failed_pairs: usize,
    pub cancelled_pairs: usize,
    pub missing_labels: usize,
    pub malformed_records: usize,
    pub dropped_records: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total(&self) {
        self.total_pairs.fetch_add(1, Relaxed);
    }

    pub fn increment_successful(&self) {
        self.successful_pairs.fetch_add(1, Relaxed);
    }

    pub fn increment_skipped_missing_image(&self) {
        self.skipped_missing_image.fetch_add(1, Relaxed);
    }

    pub fn increment_skipped_invalid_transform(&self) {
        self.skipped_invalid_transform.fetch_add(1, Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed_pairs.fetch_add(1, Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.cancelled_pairs.fetch_add(1, Relaxed);
    }

    pub fn increment_missing_labels(&self) {
        self.missing_labels.fetch_add(1, Relaxed);
    }

    pub fn add_malformed_records(&self, count: usize) {
        self.malformed_records.fetch_add(count, Relaxed);
    }

    pub fn add_dropped_records(&self, count: usize) {
        self.dropped_records.fetch_add(count, Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_pairs: self.total_pairs.load(Relaxed),
            successful_pairs: self.successful_pairs.load(Relaxed),
            skipped_missing_image: self.skipped_missing_image.load(Relaxed),
            skipped_invalid_transform: self.skipped_invalid_transform.load(Relaxed),
            failed_pairs: self.failed_pairs.load(Relaxed),
            cancelled_pairs: self.cancelled_pairs.load(Relaxed),
            missing_labels: self.missing_labels.load(Relaxed),
            malformed_records: self.malformed_records.load(Relaxed),
            dropped_records: self.dropped_records.load(Relaxed),
        }
    }

    pub fn print_summary(&self) {
        let s = self.snapshot();
        log::info!("=== Processing Summary ===");
        log::info!("Total pairs processed: {}", s.total_pairs);
        log::info!("Successful pairs: {}", s.successful_pairs);
        log::info!("Label files missing (treated as empty): {}", s.missing_labels);
        log::info!("Malformed label lines skipped: {}", s.malformed_records);
        log::info!("Records dropped after transform: {}", s.dropped_records);
        log::info!("Failed pairs: {}", s.failed_pairs);

        let total_skipped = s.skipped_missing_image + s.skipped_invalid_transform + s.cancelled_pairs;
        if total_skipped > 0 {
            log::warn!(
                "Total skipped pairs: {} (missing image: {}, invalid transform: {}, cancelled: {})",
                total_skipped,
                s.skipped_missing_image,
                s.skipped_invalid_transform,
                s.cancelled_pairs
            );
        }
    }
}
