//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::PlaybackConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    video_sync: String,
    refresh_rate_hz: f64,
    fps: f64,
    total_frames: u64,
    audio: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {config_path}")),
            config_path,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                version: format!("{:?}", config.version),
                video_sync: config.sync.video_sync.to_string(),
                refresh_rate_hz: config.display.refresh_rate_hz,
                fps: config.media.fps,
                total_frames: config.total_frames(),
                audio: config.media.audio,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PlaybackConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let mode = config.sync.video_sync;

    if mode.resamples_audio() && !config.media.audio {
        warnings.push(format!(
            "video_sync = {mode} resamples audio, but the media has no audio stream"
        ));
    }

    if mode.is_display() {
        let speed = sync_engine::calc_best_speed(config.vsync_interval(), config.frame_duration());
        let max_change = config.sync.sync_max_video_change / 100.0;
        if speed <= 0.0 || (speed - 1.0).abs() > max_change {
            warnings.push(format!(
                "{} fps cannot be locked to {} Hz within sync_max_video_change = {}%; \
                 display-sync will stay inactive",
                config.media.fps, config.display.refresh_rate_hz, config.sync.sync_max_video_change
            ));
        }
    }

    if config.sync.untimed || config.display.untimed {
        warnings.push("untimed output - frames are shown as fast as possible".to_string());
    }

    if config.total_frames() == 0 {
        warnings.push("media.duration_s is shorter than one frame".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Video sync: {}", summary.video_sync);
            println!("  Display: {} Hz", summary.refresh_rate_hz);
            println!("  Media: {} fps, {} frames", summary.fps, summary.total_frames);
            println!("  Audio: {}", if summary.audio { "yes" } else { "no" });
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
