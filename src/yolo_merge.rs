use clap::Parser;

use log::{error, info};

use yolo_augment::{merge_datasets, MergeArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = MergeArgs::parse();

    info!("Merging {} datasets...", args.inputs.len());
    match merge_datasets(&args.inputs, &args.output) {
        Ok(stats) if stats.name_collisions > 0 => info!(
            "Merge complete with {} duplicate file names skipped",
            stats.name_collisions
        ),
        Ok(_) => info!("Merge complete: {}", args.output.display()),
        Err(e) => error!("Failed to merge datasets: {}", e),
    }
}
