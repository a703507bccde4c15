//! Geometric and photometric augmentation for YOLO datasets
//!
//! Flips and rotates images together with their pose (`class cx cy w h [x y v]*`) or
//! segmentation (`class x1 y1 ... xn yn`) labels, keeping every coordinate consistent with the
//! transformed pixels. Color (HSV) and zoom augmentations copy labels unchanged, and augmented
//! copies can be merged back into one dataset.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod image_ops;
pub mod io;
pub mod merge;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{
    DatasetArgs, FlipArgs, FlipDirection, HsvArgs, MergeArgs, RotateArgs, ZoomArgs,
};
pub use conversion::{parse, parse_as, serialize};
pub use dataset::{process_dataset, process_pair, AugmentConfig, Augmentation, CancelToken};
pub use error::{AugmentError, AugmentResult};
pub use filter::{filter_valid, polygon_area, DEFAULT_MIN_AREA_RATIO};
pub use geometry::{
    flip, rotate_expand_canvas, rotate_fixed_canvas, transform_records, BoxRotation, FlipAxis,
    TransformOptions, TransformOutcome, TransformSpec,
};
pub use image_ops::ZoomSpec;
pub use merge::{merge_datasets, MergeStats};
pub use types::{
    BoundingBox, ImageFrame, Keypoint, LabelFormat, LabelRecord, NormalizedPoint, StatsSnapshot,
};
