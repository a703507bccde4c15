use clap::Parser;

use log::{error, info};

use yolo_augment::utils::cancel_on_interrupt;
use yolo_augment::{process_dataset, FlipArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = FlipArgs::parse();

    if !args.dataset.input.is_dir() {
        error!(
            "The specified input directory does not exist: {}",
            args.dataset.input.display()
        );
        return;
    }

    info!("Starting {:?} flip...", args.direction);
    let config = args.into_config();
    match process_dataset(&config, &cancel_on_interrupt()) {
        Ok(_) => info!("Flipped dataset written to {}", config.output.display()),
        Err(e) => error!("Failed to process dataset: {}", e),
    }
}
