use clap::Parser;

use log::{error, info, warn};

use yolo_augment::utils::cancel_on_interrupt;
use yolo_augment::{process_dataset, HsvArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = HsvArgs::parse();

    if !args.dataset.input.is_dir() {
        error!(
            "The specified input directory does not exist: {}",
            args.dataset.input.display()
        );
        return;
    }
    if args.is_identity() {
        warn!("All HSV factors are 1.0, nothing to do");
        return;
    }

    info!(
        "Adjusting colors (hue x{}, saturation x{}, value x{})...",
        args.hue, args.saturation, args.value
    );
    let config = args.into_config();
    match process_dataset(&config, &cancel_on_interrupt()) {
        Ok(_) => info!("Adjusted dataset written to {}", config.output.display()),
        Err(e) => error!("Failed to process dataset: {}", e),
    }
}
