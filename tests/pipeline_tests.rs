use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use yolo_augment::{
    merge_datasets, process_dataset, AugmentConfig, Augmentation, BoxRotation, CancelToken,
    LabelFormat, MergeStats, TransformSpec, ZoomSpec, DEFAULT_MIN_AREA_RATIO,
};

const TRIANGLE: &str = "0 0.1 0.1 0.9 0.1 0.5 0.9\n";

fn write_image(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([40, 120, 200]))
        .save(path)
        .unwrap();
}

/// `root/train/{images,labels}` with one 8x6 image per `(stem, label)`; `None` skips the label.
fn make_dataset(root: &Path, items: &[(&str, Option<&str>)]) {
    let images = root.join("train/images");
    let labels = root.join("train/labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();
    for (stem, label) in items {
        write_image(&images.join(format!("{stem}.png")), 8, 6);
        if let Some(label) = label {
            fs::write(labels.join(format!("{stem}.txt")), label).unwrap();
        }
    }
}

fn config(input: &Path, output: &Path, suffix: &str, augmentation: Augmentation) -> AugmentConfig {
    AugmentConfig {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        suffix: suffix.to_string(),
        workers: 2,
        label_format: LabelFormat::Auto,
        min_area_ratio: DEFAULT_MIN_AREA_RATIO,
        augmentation,
    }
}

fn flip_horizontal() -> Augmentation {
    Augmentation::Geometric {
        spec: TransformSpec::FlipHorizontal,
        box_rotation: BoxRotation::default(),
    }
}

fn out_label(output: &Path, name: &str) -> PathBuf {
    output.join("train/labels").join(name)
}

#[test]
fn test_flip_writes_suffixed_pair_and_copies_yaml() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("ds_flip");
    make_dataset(&input, &[("img1", Some(TRIANGLE))]);
    fs::write(input.join("data.yaml"), "names: [thing]\n").unwrap();

    let stats = process_dataset(
        &config(&input, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(stats.total_pairs, 1);
    assert_eq!(stats.successful_pairs, 1);
    assert!(output.join("train/images/img1_flip.png").is_file());
    assert_eq!(
        fs::read_to_string(out_label(&output, "img1_flip.txt")).unwrap(),
        "0 0.900000 0.100000 0.100000 0.100000 0.500000 0.900000\n"
    );
    assert!(output.join("data.yaml").is_file());
}

#[test]
fn test_border_touching_polygon_stays_a_polygon() {
    let temp_dir = tempfile::tempdir().unwrap();
    let expected = "0 0.800000 0.200000 0.200000 0.200000 0.100000 0.500000 0.000000 0.800000 0.700000 1.000000\n";
    let label = "0 0.2 0.2 0.8 0.2 0.9 0.5 1.0 0.8 0.3 1.0\n";

    // Segmentation dataset described by a YAML without `kpt_shape`
    let with_yaml = temp_dir.path().join("with_yaml");
    make_dataset(&with_yaml, &[("edge", Some(label))]);
    fs::write(with_yaml.join("data.yaml"), "names: [thing]\n").unwrap();
    let output = temp_dir.path().join("with_yaml_flip");
    process_dataset(
        &config(&with_yaml, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(
        fs::read_to_string(out_label(&output, "edge_flip.txt")).unwrap(),
        expected
    );

    // No YAML: the triangle on the next line settles the file as segmentation
    let bare = temp_dir.path().join("bare");
    let mixed = format!("{label}{TRIANGLE}");
    make_dataset(&bare, &[("edge", Some(mixed.as_str()))]);
    let output = temp_dir.path().join("bare_flip");
    process_dataset(
        &config(&bare, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();
    let written = fs::read_to_string(out_label(&output, "edge_flip.txt")).unwrap();
    assert_eq!(written.lines().next(), expected.lines().next());
    assert_eq!(written.lines().count(), 2);
}

#[test]
fn test_unreadable_image_is_skipped_without_aborting() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("out");
    make_dataset(&input, &[("good", Some(TRIANGLE))]);
    fs::write(input.join("train/images/broken.png"), b"not an image").unwrap();
    fs::write(input.join("train/labels/broken.txt"), TRIANGLE).unwrap();

    let stats = process_dataset(
        &config(&input, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(stats.total_pairs, 2);
    assert_eq!(stats.successful_pairs, 1);
    assert_eq!(stats.skipped_missing_image, 1);
    assert!(!out_label(&output, "broken_flip.txt").exists());
    assert!(out_label(&output, "good_flip.txt").is_file());
}

#[test]
fn test_missing_label_file_yields_empty_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("out");
    make_dataset(&input, &[("background", None)]);

    let stats = process_dataset(
        &config(&input, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(stats.successful_pairs, 1);
    assert_eq!(stats.missing_labels, 1);
    assert_eq!(
        fs::read_to_string(out_label(&output, "background_flip.txt")).unwrap(),
        ""
    );
}

#[test]
fn test_malformed_lines_are_counted_and_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("out");
    make_dataset(
        &input,
        &[("img", Some("0 0.1 0.1 0.9 0.1 0.5 0.9\n3 0.5 nope\n1 0.5\n"))],
    );

    let stats = process_dataset(
        &config(&input, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(stats.successful_pairs, 1);
    assert_eq!(stats.malformed_records, 2);
    let written = fs::read_to_string(out_label(&output, "img_flip.txt")).unwrap();
    assert_eq!(written.lines().count(), 1);
}

#[test]
fn test_pose_flip_uses_dataset_flip_idx() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("out");
    make_dataset(
        &input,
        &[("person", Some("0 0.3 0.5 0.2 0.2 0.2 0.4 2 0.4 0.4 1\n"))],
    );
    fs::write(
        input.join("data.yaml"),
        "names: [person]\nkpt_shape: [2, 3]\nflip_idx: [1, 0]\n",
    )
    .unwrap();

    process_dataset(
        &config(&input, &output, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(
        fs::read_to_string(out_label(&output, "person_flip.txt")).unwrap(),
        "0 0.70 0.50 0.20 0.20 0.60 0.40 1 0.80 0.40 2\n"
    );
}

#[test]
fn test_expand_rotation_resizes_image_and_moves_labels() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("out");
    fs::create_dir_all(input.join("train/images")).unwrap();
    fs::create_dir_all(input.join("train/labels")).unwrap();
    write_image(&input.join("train/images/wide.png"), 40, 20);
    fs::write(
        input.join("train/labels/wide.txt"),
        "0 0.25 0.25 0.75 0.25 0.75 0.75 0.25 0.75\n",
    )
    .unwrap();

    let augmentation = Augmentation::Geometric {
        spec: TransformSpec::Rotate {
            angle_degrees: 90.0,
            expand_canvas: true,
        },
        box_rotation: BoxRotation::default(),
    };
    let stats = process_dataset(
        &config(&input, &output, "rot_90_exp", augmentation),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(stats.successful_pairs, 1);

    let dims = image::image_dimensions(output.join("train/images/wide_rot_90_exp.png")).unwrap();
    assert_eq!(dims, (20, 40));
    let label = fs::read_to_string(out_label(&output, "wide_rot_90_exp.txt")).unwrap();
    assert!(label.starts_with("0 0.750000 0.250000 "), "{label}");
}

#[test]
fn test_zoom_and_hsv_keep_labels() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    make_dataset(&input, &[("img", Some(TRIANGLE))]);
    let expected = "0 0.100000 0.100000 0.900000 0.100000 0.500000 0.900000\n";

    let zoom_out = temp_dir.path().join("zoom");
    process_dataset(
        &config(
            &input,
            &zoom_out,
            "zoom",
            Augmentation::Zoom(ZoomSpec::Ratio { x: 2.0, y: 0.5 }),
        ),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(
        image::image_dimensions(zoom_out.join("train/images/img_zoom.png")).unwrap(),
        (16, 3)
    );
    assert_eq!(
        fs::read_to_string(out_label(&zoom_out, "img_zoom.txt")).unwrap(),
        expected
    );

    let hsv_out = temp_dir.path().join("hsv");
    process_dataset(
        &config(
            &input,
            &hsv_out,
            "hsv",
            Augmentation::Hsv {
                hue: 1.0,
                saturation: 0.5,
                value: 1.2,
            },
        ),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(
        image::image_dimensions(hsv_out.join("train/images/img_hsv.png")).unwrap(),
        (8, 6)
    );
    assert_eq!(
        fs::read_to_string(out_label(&hsv_out, "img_hsv.txt")).unwrap(),
        expected
    );
}

#[test]
fn test_cancelled_run_skips_remaining_pairs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let output = temp_dir.path().join("out");
    make_dataset(&input, &[("a", Some(TRIANGLE)), ("b", None)]);

    let cancel = CancelToken::new();
    cancel.cancel();
    let stats = process_dataset(&config(&input, &output, "flip", flip_horizontal()), &cancel).unwrap();

    assert_eq!(stats.total_pairs, 2);
    assert_eq!(stats.cancelled_pairs, 2);
    assert_eq!(stats.successful_pairs, 0);
    assert!(!out_label(&output, "a_flip.txt").exists());
}

#[test]
fn test_missing_input_directory_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let result = process_dataset(
        &config(
            &temp_dir.path().join("absent"),
            &temp_dir.path().join("out"),
            "flip",
            flip_horizontal(),
        ),
        &CancelToken::new(),
    );
    assert!(result.is_err());
}

#[test]
fn test_merge_original_and_augmented_copy() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("ds");
    let flipped = temp_dir.path().join("ds_flip");
    let merged = temp_dir.path().join("merged");
    make_dataset(&input, &[("img", Some(TRIANGLE)), ("bg", None)]);
    fs::write(input.join("data.yaml"), "names: [thing]\n").unwrap();
    process_dataset(
        &config(&input, &flipped, "flip", flip_horizontal()),
        &CancelToken::new(),
    )
    .unwrap();
    fs::write(flipped.join("data.yaml"), "names: [other]\n").unwrap();

    let stats = merge_datasets(&[input.clone(), flipped.clone()], &merged).unwrap();

    assert_eq!(
        stats,
        MergeStats {
            copied_images: 4,
            copied_labels: 3,
            name_collisions: 0,
        }
    );
    for name in ["img.png", "bg.png", "img_flip.png", "bg_flip.png"] {
        assert!(merged.join("train/images").join(name).is_file(), "{name}");
    }
    assert!(out_label(&merged, "img_flip.txt").is_file());
    assert!(!out_label(&merged, "bg.txt").exists());
    assert_eq!(
        fs::read_to_string(merged.join("data.yaml")).unwrap(),
        "names: [thing]\n"
    );
}

#[test]
fn test_merge_keeps_first_file_on_name_collision() {
    let temp_dir = tempfile::tempdir().unwrap();
    let first = temp_dir.path().join("a");
    let second = temp_dir.path().join("b");
    let merged = temp_dir.path().join("merged");
    make_dataset(&first, &[("img", Some(TRIANGLE))]);
    make_dataset(&second, &[("img", Some("1 0.2 0.2 0.8 0.2 0.5 0.8\n"))]);

    let stats = merge_datasets(&[first, second], &merged).unwrap();

    assert_eq!(stats.copied_images, 1);
    assert_eq!(stats.name_collisions, 1);
    assert_eq!(
        fs::read_to_string(out_label(&merged, "img.txt")).unwrap(),
        TRIANGLE
    );
}
