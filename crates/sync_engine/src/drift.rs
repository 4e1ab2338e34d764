//! Clock drift estimation and audio-sync correction.
//!
//! - `update_av_diff`: A/V difference at the moment a frame is shown
//! - `estimate_drift`: least-squares drift rate over the frame history
//! - `adjust_sync`: nudges the audio-sync accumulator towards the audio clock
//! - `observe_audio_written`: feeds written audio into the accumulator

use tracing::{trace, warn};

use crate::history::FrameHistory;
use crate::state::SyncState;

/// A/V difference above which a desync warning is shown (seconds)
pub const DESYNC_WARNING_THRESHOLD: f64 = 0.5;

/// Minimum history length for a drift estimate
const MIN_DRIFT_SAMPLES: usize = 10;

/// Positions used to measure the A/V difference
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvPositions {
    pub audio_playing: bool,
    pub video_playing: bool,
    /// PTS of the audio currently heard
    pub audio_pts: Option<f64>,
    /// PTS of the frame being presented
    pub video_pts: Option<f64>,
    /// Configured audio delay
    pub audio_delay: f64,
}

/// Inputs for the audio-sync correction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioSyncInput {
    pub audio_playing: bool,
    /// PTS at the end of audio written to the output
    pub written_audio_pts: Option<f64>,
    pub audio_delay: f64,
    /// Per-frame correction limit, `None` for 10% of the frame time
    pub max_pts_correction: Option<f64>,
}

/// Update `last_av_difference` for the frame being shown
///
/// `offset` is the time (in media seconds) until the frame becomes visible.
/// The difference is 0 unless both streams are playing with known positions.
/// Returns true when this call produced the one-time desync warning.
pub fn update_av_diff(state: &mut SyncState, positions: &AvPositions, offset: f64) -> bool {
    state.last_av_difference = 0.0;

    if !positions.audio_playing || !positions.video_playing {
        return false;
    }

    if let (Some(audio), Some(video)) = (positions.audio_pts, positions.video_pts) {
        state.last_av_difference = audio - video + positions.audio_delay + offset;
    }

    if state.last_av_difference.abs() > DESYNC_WARNING_THRESHOLD && !state.desync_warned {
        warn!(
            av_diff = state.last_av_difference,
            "audio/video desynchronisation detected, audio position will not match video"
        );
        state.desync_warned = true;
        return true;
    }
    false
}

/// Estimate the A/V drift rate (seconds of desync per second)
///
/// Least-squares slope of `av_diff` against elapsed display time, walking
/// back from the record before the newest one. Elapsed time is rebuilt from
/// vsync counts. Returns NaN when the history is too short, contains a frame
/// that was not display-synced, or the regression is degenerate.
pub fn estimate_drift(history: &FrameHistory, vsync: f64) -> f64 {
    if history.len() <= MIN_DRIFT_SAMPLES {
        return f64::NAN;
    }

    let num = (history.len() - 1) as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    let mut x = 0.0;
    for record in history.iter().skip(1) {
        if record.num_vsyncs < 0 {
            return f64::NAN;
        }
        let y = record.av_diff;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
        x -= record.num_vsyncs as f64 * vsync;
    }

    let denominator = sum_x * sum_x - num * sum_xx;
    if denominator == 0.0 {
        return f64::NAN;
    }
    (sum_x * sum_y - num * sum_xy) / denominator
}

/// Move the audio-sync accumulator 10% towards the audio clock
///
/// Called once per new head frame while video is playing.
pub fn adjust_sync(
    state: &mut SyncState,
    input: &AudioSyncInput,
    video_pts: Option<f64>,
    frame_time: f64,
) {
    if !input.audio_playing {
        return;
    }
    let (Some(written), Some(video_pts)) = (input.written_audio_pts, video_pts) else {
        return;
    };

    let audio_pts = written + input.audio_delay - state.delay;
    let av_delay = audio_pts - video_pts;

    let max_change = input.max_pts_correction.unwrap_or(frame_time * 0.1);
    let change = (av_delay * 0.1).clamp(-max_change, max_change);
    state.delay += change;
    state.total_avsync_change += change;

    if state.display_sync_active {
        state.total_avsync_change = 0.0;
    }

    trace!(av_delay, change, "audio sync adjusted");
}

/// Add audio written since the previous observation to the accumulator
///
/// The first observation after a reset counts everything buffered ahead of
/// the playing position.
pub fn observe_audio_written(
    state: &mut SyncState,
    written_pts: Option<f64>,
    playing_pts: Option<f64>,
) {
    let Some(written) = written_pts else {
        return;
    };
    let baseline = state
        .audio_written_mark
        .or(playing_pts)
        .unwrap_or(written);
    state.delay += written - baseline;
    state.audio_written_mark = Some(written);
}
