// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depthmesh")]
#[command(about = "Depth camera capture, point cloud and mesh reconstruction")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (default: <config dir>/depthmesh/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: cli::Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected depth sensors
    List,

    /// Stream frames and rebuild the mesh, printing statistics
    Stream {
        /// Device index (from 'depthmesh list') or serial number
        #[arg(short, long)]
        device: Option<String>,

        /// Stop after this many frames (default: until Ctrl+C)
        #[arg(short, long)]
        frames: Option<u64>,
    },

    /// Save color, IR, depth and aligned frames plus the mesh
    Snapshot {
        /// Device index (from 'depthmesh list') or serial number
        #[arg(short, long)]
        device: Option<String>,

        /// Output directory (default: <pictures dir>/depthmesh)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG controls the log level, e.g. RUST_LOG=depthmesh=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let session = cli::Session::load(cli.config, &cli.overrides);

    match cli.command {
        Commands::List => cli::list_devices(&session),
        Commands::Stream { device, frames } => cli::stream(session, device, frames),
        Commands::Snapshot { device, output } => cli::snapshot(session, device, output),
    }
}
