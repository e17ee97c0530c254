// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use scanpanel::geometry::Rect;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "scanpanel")]
#[command(about = "Scan optical codes from a camera feed")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a QR code from a still image
    Decode {
        /// Image file to decode
        image: PathBuf,

        /// Scan area as left,top,right,bottom in image pixels
        #[arg(short, long)]
        clip: Option<Rect>,
    },

    /// Run a full scan session against a virtual camera showing an image
    Scan {
        /// Image file shown by the virtual camera
        image: PathBuf,

        /// Display rotation code (0-3, quarter turns)
        #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u32).range(0..=3))]
        rotation: u32,

        /// Use a front-facing virtual camera
        #[arg(short, long)]
        front: bool,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,

        /// Write the last mask overlay to this PNG file
        #[arg(short, long)]
        mask_out: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control the log level, e.g. RUST_LOG=scanpanel=debug
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
        Commands::Decode { image, clip } => cli::decode_image(&image, clip),
        Commands::Scan {
            image,
            rotation,
            front,
            timeout,
            mask_out,
        } => cli::scan_image(
            &image,
            cli::ScanOptions {
                rotation,
                front,
                timeout,
                mask_out,
            },
        ),
        Commands::Config => cli::print_config(),
    }
}
