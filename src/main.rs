// SPDX-License-Identifier: GPL-3.0-only

use camera_service::FlashMode;
use camera_service::constants::app_info;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-service")]
#[command(about = "Capture photos and videos from Linux cameras")]
#[command(version = app_info::version())]
struct Cli {
    /// Use the simulated camera instead of real hardware
    #[arg(long = "virtual", global = true)]
    use_virtual: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Take a photo
    Photo {
        /// Camera index to use (from 'camera-service list')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Flash mode: off, on or auto
        #[arg(short, long, default_value = "off")]
        flash: FlashMode,

        /// Output file or directory (default: system temp directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Video {
        /// Camera index to use (from 'camera-service list')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Keep the torch on while recording
        #[arg(short, long)]
        torch: bool,

        /// Output file or directory (default: ~/Documents/camera-service)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_service=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(cli.use_virtual),
        Commands::Photo {
            camera,
            flash,
            output,
        } => cli::take_photo(camera, flash, output, cli.use_virtual),
        Commands::Video {
            camera,
            duration,
            torch,
            output,
        } => cli::record_video(camera, duration, torch, output, cli.use_virtual),
    }
}
