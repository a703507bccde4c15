use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::dataset::{AugmentConfig, Augmentation};
use crate::filter::DEFAULT_MIN_AREA_RATIO;
use crate::geometry::{BoxRotation, TransformSpec};
use crate::image_ops::ZoomSpec;
use crate::types::LabelFormat;

/// Options shared by every augmentation tool.
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Dataset root containing `train/`, `valid/`, `val/` or `test/` splits
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output dataset root [default: <input>_<suffix>]
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Suffix appended to every output file stem
    #[arg(long = "suffix")]
    pub suffix: Option<String>,

    /// Worker threads (0 = one per core)
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,

    /// How label lines are interpreted; 'auto' also honors `kpt_shape` in the dataset YAML
    #[arg(long = "label_format", value_enum, default_value = "auto")]
    pub label_format: LabelFormat,

    /// Polygons smaller than this fraction of the image are dropped after the transform
    #[arg(long = "min_area_ratio", default_value_t = DEFAULT_MIN_AREA_RATIO, value_parser = validate_ratio)]
    pub min_area_ratio: f64,
}

impl DatasetArgs {
    /// Resolve the output root and suffix, falling back to `default_suffix`.
    pub fn into_config(self, augmentation: Augmentation, default_suffix: String) -> AugmentConfig {
        let suffix = self.suffix.unwrap_or(default_suffix);
        let output = self
            .output
            .unwrap_or_else(|| default_output_dir(&self.input, &suffix));
        AugmentConfig {
            input: self.input,
            output,
            suffix,
            workers: self.workers,
            label_format: self.label_format,
            min_area_ratio: self.min_area_ratio,
            augmentation,
        }
    }
}

/// `<input>_<suffix>` next to the input directory
pub fn default_output_dir(input: &std::path::Path, suffix: &str) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dataset".into());
    name.push("_");
    name.push(suffix);
    input.with_file_name(name)
}

/// Mirror every image and its labels.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct FlipArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Mirror axis
    #[arg(long = "direction", value_enum, default_value = "horizontal")]
    pub direction: FlipDirection,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
}

impl FlipArgs {
    pub fn into_config(self) -> AugmentConfig {
        let (spec, suffix) = match self.direction {
            FlipDirection::Horizontal => (TransformSpec::FlipHorizontal, "flip"),
            FlipDirection::Vertical => (TransformSpec::FlipVertical, "vflip"),
        };
        self.dataset.into_config(
            Augmentation::Geometric {
                spec,
                box_rotation: BoxRotation::default(),
            },
            suffix.to_string(),
        )
    }
}

/// Rotate every image and its labels about the image center.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct RotateArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Angle in degrees, positive = counter-clockwise in the y-down label frame
    /// (clockwise as displayed)
    #[arg(short = 'a', long = "angle", allow_negative_numbers = true, value_parser = validate_angle)]
    pub angle: f64,

    /// Grow the canvas so no part of the image is cropped
    #[arg(long = "expand")]
    pub expand: bool,

    /// How pose boxes follow the rotation
    #[arg(long = "box_rotation", value_enum, default_value = "center-only")]
    pub box_rotation: BoxRotation,
}

impl RotateArgs {
    pub fn into_config(self) -> AugmentConfig {
        let suffix = if self.expand {
            format!("rot_{}_exp", self.angle)
        } else {
            format!("rot_{}", self.angle)
        };
        self.dataset.into_config(
            Augmentation::Geometric {
                spec: TransformSpec::Rotate {
                    angle_degrees: self.angle,
                    expand_canvas: self.expand,
                },
                box_rotation: self.box_rotation,
            },
            suffix,
        )
    }
}

/// Scale the hue, saturation and brightness of every image; labels are copied unchanged.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct HsvArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Hue factor
    #[arg(long = "hue", default_value_t = 1.0, value_parser = validate_factor)]
    pub hue: f32,

    /// Saturation factor
    #[arg(long = "saturation", default_value_t = 1.0, value_parser = validate_factor)]
    pub saturation: f32,

    /// Value (brightness) factor
    #[arg(long = "value", default_value_t = 1.0, value_parser = validate_factor)]
    pub value: f32,
}

impl HsvArgs {
    pub fn is_identity(&self) -> bool {
        self.hue == 1.0 && self.saturation == 1.0 && self.value == 1.0
    }

    pub fn into_config(self) -> AugmentConfig {
        let suffix = format!("hsv_{}_{}_{}", self.hue, self.saturation, self.value);
        self.dataset.into_config(
            Augmentation::Hsv {
                hue: self.hue,
                saturation: self.saturation,
                value: self.value,
            },
            suffix,
        )
    }
}

/// Resize every image; normalized labels are copied unchanged.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ZoomArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Target size in pixels
    #[arg(
        long = "size",
        num_args = 2,
        value_names = ["WIDTH", "HEIGHT"],
        conflicts_with = "ratio",
        required_unless_present = "ratio"
    )]
    pub size: Option<Vec<u32>>,

    /// Scale factors along x and y
    #[arg(long = "ratio", num_args = 2, value_names = ["RX", "RY"])]
    pub ratio: Option<Vec<f64>>,
}

impl ZoomArgs {
    pub fn zoom_spec(&self) -> Option<ZoomSpec> {
        match (self.size.as_deref(), self.ratio.as_deref()) {
            (Some(&[width, height]), None) => Some(ZoomSpec::Size { width, height }),
            (None, Some(&[x, y])) => Some(ZoomSpec::Ratio { x, y }),
            _ => None,
        }
    }

    pub fn into_config(self) -> Option<AugmentConfig> {
        let zoom = self.zoom_spec()?;
        Some(
            self.dataset
                .into_config(Augmentation::Zoom(zoom), "zoom".to_string()),
        )
    }
}

/// Merge several datasets (e.g. augmented copies) into one.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct MergeArgs {
    /// Dataset roots to merge; YAML files are taken from the first
    #[arg(long = "inputs", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output dataset root
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

// Validate that a color factor is between 0.0 and 2.0
fn validate_factor(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=2.0).contains(&val) => Ok(val),
        _ => Err("FACTOR must be between 0.0 and 2.0".to_string()),
    }
}

// Validate that an area ratio is between 0.0 and 1.0
fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}

fn validate_angle(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() => Ok(val),
        _ => Err("ANGLE must be a finite number of degrees".to_string()),
    }
}
