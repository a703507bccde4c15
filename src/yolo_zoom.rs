use clap::Parser;

use log::{error, info};

use yolo_augment::utils::cancel_on_interrupt;
use yolo_augment::{process_dataset, ZoomArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ZoomArgs::parse();

    if !args.dataset.input.is_dir() {
        error!(
            "The specified input directory does not exist: {}",
            args.dataset.input.display()
        );
        return;
    }

    let Some(config) = args.into_config() else {
        error!("Pass exactly one of --size WIDTH HEIGHT or --ratio RX RY");
        return;
    };
    info!("Resizing images ({:?})...", config.augmentation);
    match process_dataset(&config, &cancel_on_interrupt()) {
        Ok(_) => info!("Resized dataset written to {}", config.output.display()),
        Err(e) => error!("Failed to process dataset: {}", e),
    }
}
