//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::VideoSyncMode;
use std::path::PathBuf;

/// avsync-sim - A/V sync and frame scheduling simulator
#[derive(Parser, Debug)]
#[command(
    name = "avsync-sim",
    author,
    version,
    about = "Simulate A/V sync and display-synced frame scheduling",
    long_about = "Runs the A/V sync core against a virtual display, decoder and audio clock.\n\n\
                  Loads a playback configuration, plays it in virtual time and reports \n\
                  per-frame timing, vsync cadence and A/V drift statistics."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AVSYNC_SIM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "AVSYNC_SIM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a configuration in virtual time
    Simulate(SimulateArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "AVSYNC_SIM_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the video sync mode (audio, display-resample, display-vdrop, ...)
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<VideoSyncMode>,

    /// Override the display refresh rate (Hz)
    #[arg(long)]
    pub refresh: Option<f64>,

    /// Override the video frame rate
    #[arg(long)]
    pub fps: Option<f64>,

    /// Override the media duration (seconds)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Stop after this many presented frames (0 = play to the end)
    #[arg(long, default_value = "0", env = "AVSYNC_SIM_MAX_FRAMES")]
    pub max_frames: u64,

    /// Pace the simulation against the wall clock
    #[arg(long)]
    pub realtime: bool,

    /// Write every frame report as a JSON line to this file
    #[arg(long)]
    pub reports: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "AVSYNC_SIM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

fn parse_mode(s: &str) -> Result<VideoSyncMode, String> {
    s.parse::<VideoSyncMode>().map_err(|e| e.to_string())
}
