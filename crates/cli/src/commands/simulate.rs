//! `simulate` command implementation.

use anyhow::{Context, Result};
use contracts::{FrameReport, PlaybackConfig};
use observability::{metrics, MetricsSummary, SyncMetricsAggregator};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};
use sync_engine::{Simulation, TickOutcome};
use tracing::{debug, info, warn};

use super::load_config;
use crate::cli::SimulateArgs;
use crate::error::CliError;

/// Ticks between cooperative yields when running unpaced
const YIELD_EVERY: u32 = 256;

/// Result of one simulation run
#[derive(Debug, Serialize)]
struct SimulationOutcome {
    video_sync: String,
    completed: bool,
    virtual_duration_s: f64,
    wall_duration_s: f64,
    audio_speed_changes: u64,
    #[serde(flatten)]
    metrics: MetricsSummary,
}

/// Execute the `simulate` command
pub async fn run_simulate(args: &SimulateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args)?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    info!(
        mode = %config.sync.video_sync,
        refresh_rate = config.display.refresh_rate_hz,
        fps = config.media.fps,
        frames = config.total_frames(),
        realtime = args.realtime,
        "Configuration loaded"
    );

    let mut report_sink = match args.reports {
        Some(ref path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create report file {}", path.display())
        })?)),
        None => None,
    };

    let mut sim = Simulation::new(&config);
    if args.max_frames > 0 {
        sim.session_mut().set_max_frames(Some(args.max_frames));
    }

    let mut aggregator = SyncMetricsAggregator::new();
    let started = Instant::now();

    let completed = tokio::select! {
        result = drive(&mut sim, &mut aggregator, report_sink.as_mut(), args.realtime) => {
            result?;
            true
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping simulation");
            false
        }
    };

    if let Some(mut sink) = report_sink {
        sink.flush().context("Failed to flush report file")?;
    }

    let outcome = SimulationOutcome {
        video_sync: config.sync.video_sync.to_string(),
        completed,
        virtual_duration_s: sim.now(),
        wall_duration_s: started.elapsed().as_secs_f64(),
        audio_speed_changes: sim.audio().map_or(0, |audio| audio.speed_changes()),
        metrics: aggregator.summary(),
    };

    info!(
        frames = outcome.metrics.total_frames,
        virtual_s = format!("{:.3}", outcome.virtual_duration_s),
        completed,
        "Simulation finished"
    );

    if args.json {
        let json = serde_json::to_string_pretty(&outcome)
            .context("Failed to serialize simulation summary")?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    Ok(())
}

/// Apply command-line overrides and re-validate
fn apply_overrides(config: &mut PlaybackConfig, args: &SimulateArgs) -> Result<()> {
    if let Some(mode) = args.mode {
        info!(%mode, "Overriding video sync mode from CLI");
        config.sync.video_sync = mode;
    }
    if let Some(refresh) = args.refresh {
        info!(refresh, "Overriding refresh rate from CLI");
        config.display.refresh_rate_hz = refresh;
    }
    if let Some(fps) = args.fps {
        info!(fps, "Overriding frame rate from CLI");
        config.media.fps = fps;
    }
    if let Some(duration) = args.duration {
        config.media.duration_s = duration;
    }

    config_loader::ConfigLoader::validate(config)
        .map_err(|e| CliError::config_validation(e.to_string()))?;
    Ok(())
}

/// Run the simulation to its end, feeding metrics and reports
async fn drive(
    sim: &mut Simulation,
    aggregator: &mut SyncMetricsAggregator,
    mut report_sink: Option<&mut BufWriter<File>>,
    realtime: bool,
) -> Result<()> {
    let wall_start = Instant::now();
    let mut seen_events = 0;
    let mut ticks = 0u32;

    while !sim.is_finished() {
        let outcome = sim
            .step()
            .map_err(|e| CliError::simulation(sim.now(), e.to_string()))?;

        match outcome {
            TickOutcome::Presented(report) => {
                record(&report, aggregator, report_sink.as_deref_mut())?;
            }
            TickOutcome::Idle => {
                // Nothing unpauses a simulation once frame stepping stopped it
                debug!(now = sim.now(), "playback paused, stopping");
                break;
            }
            _ => {}
        }

        for event in &sim.events()[seen_events..] {
            metrics::record_event(event);
            aggregator.observe_event(event);
        }
        seen_events = sim.events().len();

        if realtime {
            let target = Duration::from_secs_f64(sim.now());
            let elapsed = wall_start.elapsed();
            if target > elapsed {
                tokio::time::sleep(target - elapsed).await;
            }
        } else {
            ticks = ticks.wrapping_add(1);
            if ticks % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
    }
    Ok(())
}

fn record(
    report: &FrameReport,
    aggregator: &mut SyncMetricsAggregator,
    sink: Option<&mut BufWriter<File>>,
) -> Result<()> {
    metrics::record_frame_metrics(report);
    aggregator.update(report);

    if let Some(sink) = sink {
        serde_json::to_writer(&mut *sink, report).context("Failed to write frame report")?;
        sink.write_all(b"\n").map_err(CliError::from)?;
    }
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_outcome(outcome: &SimulationOutcome) {
    println!();
    println!("Mode: {}", outcome.video_sync);
    println!(
        "Virtual time: {:.3}s (wall {:.3}s){}",
        outcome.virtual_duration_s,
        outcome.wall_duration_s,
        if outcome.completed { "" } else { ", interrupted" }
    );
    println!("Audio speed changes: {}", outcome.audio_speed_changes);
    print!("{}", outcome.metrics);
}
