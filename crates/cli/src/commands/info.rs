//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PlaybackConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    #[serde(flatten)]
    config: &'a PlaybackConfig,
    derived: DerivedInfo,
}

/// Values computed from the configuration
#[derive(Serialize)]
struct DerivedInfo {
    vsync_interval_ms: f64,
    frame_duration_ms: f64,
    total_frames: u64,
    /// Speed that locks frames to whole vsyncs
    best_speed: f64,
    /// Vsyncs per frame at `best_speed`
    vsyncs_per_frame: f64,
}

impl DerivedInfo {
    fn from_config(config: &PlaybackConfig) -> Self {
        let vsync = config.vsync_interval();
        let frame = config.frame_duration() / config.sync.playback_speed;
        let best_speed = sync_engine::calc_best_speed(vsync, frame);
        Self {
            vsync_interval_ms: vsync * 1000.0,
            frame_duration_ms: config.frame_duration() * 1000.0,
            total_frames: config.total_frames(),
            best_speed,
            vsyncs_per_frame: frame / best_speed / vsync,
        }
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)?;
    let derived = DerivedInfo::from_config(&config);

    if args.json {
        let info = ConfigInfo {
            config: &config,
            derived,
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, &derived);
    }

    Ok(())
}

fn print_config_info(config: &PlaybackConfig, derived: &DerivedInfo) {
    let sync = &config.sync;
    let media = &config.media;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Playback Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Sync Settings");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Video sync: {}", sync.video_sync);
    println!("   ├─ Max video change: {}%", sync.sync_max_video_change);
    println!("   ├─ Max audio change: {}%", sync.sync_max_audio_change);
    println!("   ├─ Audio delay: {} s", sync.audio_delay);
    match sync.max_pts_correction {
        Some(correction) => println!("   ├─ Max PTS correction: {} s", correction),
        None => println!("   ├─ Max PTS correction: 10% of frame time"),
    }
    println!("   ├─ Autosync: {}", sync.autosync);
    println!("   ├─ Playback speed: {}", sync.playback_speed);
    println!(
        "   ├─ Frame dropping: vo={}, decoder={}",
        sync.frame_dropping.vo, sync.frame_dropping.decoder
    );
    println!("   └─ Untimed: {}", sync.untimed);

    println!("\n🖥  Display");
    println!(
        "   ├─ Refresh: {} Hz ({:.3} ms)",
        config.display.refresh_rate_hz, derived.vsync_interval_ms
    );
    println!("   ├─ Lookahead: {}", config.display.lookahead);
    println!("   └─ Untimed: {}", config.display.untimed);

    println!("\n🎞  Media");
    println!(
        "   ├─ Video: {}x{} {:?} @ {} fps ({:.3} ms)",
        media.width, media.height, media.format, media.fps, derived.frame_duration_ms
    );
    println!(
        "   ├─ Duration: {} s ({} frames)",
        media.duration_s, derived.total_frames
    );
    if media.timestamp_rounding_ms > 0 {
        println!("   ├─ Timestamps rounded to {} ms", media.timestamp_rounding_ms);
    }
    if media.audio {
        println!(
            "   └─ Audio: buffer {} ms, drift {} ppm",
            media.audio_buffer_ms, media.audio_drift_ppm
        );
    } else {
        println!("   └─ Audio: none");
    }

    println!("\n📐 Display Sync");
    println!("   ├─ Best speed: {:.6}", derived.best_speed);
    println!("   └─ Vsyncs per frame: {:.3}", derived.vsyncs_per_frame);

    println!();
}
