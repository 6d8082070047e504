// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use rgbd_stream::RenderingMode;
use rgbd_stream::constants::app_info;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "rgbd-stream")]
#[command(about = "Live point clouds from a Wi-Fi streamed RGB-D camera")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream from one or more devices and report the reconstructed cloud
    Connect {
        /// Comma separated device addresses (default: from config)
        #[arg(short, long)]
        ips: Option<String>,

        /// Rendering mode: points, mesh, mesh-wireframe or spheres
        #[arg(short, long)]
        mode: Option<RenderingMode>,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Fetch and print a device's calibration
    Metadata {
        /// Device address
        #[arg(short, long)]
        ip: String,

        /// Live stream height to correct the intrinsics for
        #[arg(long)]
        height: Option<u32>,
    },

    /// Print the calibration embedded in a recorded video
    File {
        /// Recorded RGB-D video
        path: PathBuf,

        /// Also decode and reconstruct the recording for this many seconds
        #[arg(long)]
        play: Option<u64>,
    },

    /// Manage saved viewer presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// List preset names
    List,
    /// Print one preset as JSON
    Show { name: String },
    /// Save the configured viewer options under a name
    Save { name: String },
    /// Delete a preset
    Remove { name: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=rgbd_stream=debug, RUST_LOG=info
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
        Commands::Connect { ips, mode, duration } => cli::connect(ips, mode, duration),
        Commands::Metadata { ip, height } => cli::print_metadata(&ip, height),
        Commands::File { path, play } => cli::inspect_file(&path, play),
        Commands::Presets { action } => match action {
            PresetAction::List => cli::list_presets(),
            PresetAction::Show { name } => cli::show_preset(&name),
            PresetAction::Save { name } => cli::save_preset(&name),
            PresetAction::Remove { name } => cli::remove_preset(&name),
        },
    }
}
