use clap::Parser;

use log::{error, info, warn};

use yolo_augment::utils::cancel_on_interrupt;
use yolo_augment::{process_dataset, RotateArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RotateArgs::parse();

    if !args.dataset.input.is_dir() {
        error!(
            "The specified input directory does not exist: {}",
            args.dataset.input.display()
        );
        return;
    }
    if args.angle == 0.0 {
        warn!("Rotation angle is 0, nothing to do");
        return;
    }

    info!(
        "Rotating by {} degrees{}...",
        args.angle,
        if args.expand { " with canvas expansion" } else { "" }
    );
    let config = args.into_config();
    match process_dataset(&config, &cancel_on_interrupt()) {
        Ok(_) => info!("Rotated dataset written to {}", config.output.display()),
        Err(e) => error!("Failed to process dataset: {}", e),
    }
}
