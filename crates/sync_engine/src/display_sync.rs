//! Display-sync scheduling.
//!
//! Locks frame boundaries to the display refresh: each frame is shown for an
//! integer number of vsyncs, playback speed is nudged so the frame rate is an
//! integer multiple of the refresh rate, and the remaining error is carried
//! over to the next frame. A/V desync is corrected by resampling audio,
//! dropping/repeating vsyncs, or not at all, depending on the mode.
//!
//! [`schedule_display_sync`] is a pure step: it takes the current state and
//! returns the next one plus the per-frame annotation.

use contracts::{SyncOptions, VideoSyncMode};
use tracing::debug;

use crate::drift::{estimate_drift, update_av_diff, AvPositions};
use crate::history::FrameHistory;
use crate::state::{DriftDirection, SyncState};

/// Frames longer than this (after speed adjustment) disable display-sync
pub const MAX_DISPLAY_SYNC_FRAME_DURATION: f64 = 0.5;

/// Desync beyond this permanently disables display-sync for the session
pub const DISPLAY_SYNC_BREAK_THRESHOLD: f64 = 0.5;

/// Minimum A/V difference before vsyncs are dropped or repeated
pub const DROP_REPEAT_MIN_DESYNC: f64 = 0.020;

/// Frame rate multiples tried by the speed search
const MAX_SPEED_FACTOR: u32 = 5;

/// Inputs for one display-sync step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplaySyncInput {
    /// Display refresh interval, `None` or <= 0 if unknown
    pub vsync_interval: Option<f64>,
    /// Time until the next queued frame becomes visible
    pub vo_delay: f64,
    /// Audio output is compressed passthrough
    pub audio_passthrough: bool,
    pub positions: AvPositions,
}

/// Timing annotation for a display-synced frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAnnotation {
    pub vsync_interval: f64,
    /// Offset of the vsync boundary from the ideal display time
    pub vsync_offset: f64,
    /// Speed-adjusted frame duration
    pub ideal_frame_duration: f64,
    pub num_vsyncs: u32,
}

/// Values to store in the newest history record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordUpdate {
    pub num_vsyncs: i32,
    pub av_diff: f64,
}

/// Result of one display-sync step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySyncStep {
    pub state: SyncState,
    /// Present when the frame is display-synced
    pub annotation: Option<FrameAnnotation>,
    pub record_update: Option<RecordUpdate>,
    /// Vsyncs added (> 0) or removed (< 0) for desync correction
    pub drop_repeat: i32,
    /// The one-time desync warning fired during this step
    pub desync_warning: bool,
    /// Display-sync broke during this step
    pub broke: bool,
}

impl DisplaySyncStep {
    fn inactive(state: SyncState) -> Self {
        Self {
            state,
            annotation: None,
            record_update: None,
            drop_repeat: 0,
            desync_warning: false,
            broke: false,
        }
    }
}

/// Speed factor that makes `frame` an integer multiple of `vsync`
///
/// Also tries multiples of the frame duration (factor 1..=5), so e.g.
/// 24 fps on 60 Hz locks to a 2:3 cadence. Returns the factor with the
/// smallest deviation from 1, or -1 if none is usable.
pub fn calc_best_speed(vsync: f64, frame: f64) -> f64 {
    let ratio = frame / vsync;
    let mut best_scale = -1.0;
    let mut best_dev = f64::INFINITY;
    for factor in 1..=MAX_SPEED_FACTOR {
        let scaled = ratio * factor as f64;
        let scale = scaled / scaled.round_ties_even();
        let dev = (scale - 1.0).abs();
        if dev < best_dev {
            best_scale = scale;
            best_dev = dev;
        }
    }
    best_scale
}

/// Average best speed over all frames with a known duration, 1 if none
pub fn find_best_speed(history: &FrameHistory, vsync: f64, playback_speed: f64) -> f64 {
    let (total, count) = history
        .iter()
        .filter(|r| r.approx_duration > 0.0)
        .fold((0.0, 0usize), |(total, count), r| {
            (
                total + calc_best_speed(vsync, r.approx_duration / playback_speed),
                count + 1,
            )
        });
    if count > 0 {
        total / count as f64
    } else {
        1.0
    }
}

/// Schedule the newest history frame by display vsync
///
/// Returns the inactive step (no annotation) when display-sync does not
/// apply: mode disabled, sticky break, passthrough audio in a resampling
/// mode, unknown vsync, or a frame longer than 0.5 s.
pub fn schedule_display_sync(
    state: &SyncState,
    history: &FrameHistory,
    input: &DisplaySyncInput,
    opts: &SyncOptions,
) -> DisplaySyncStep {
    let mut next = *state;
    let mode = opts.video_sync;

    if !next.display_sync_active {
        next.display_sync_error = 0.0;
        next.display_sync_drift_dir = DriftDirection::None;
    }
    next.display_sync_active = false;

    if !mode.is_display() || next.display_sync_broken {
        return DisplaySyncStep::inactive(next);
    }

    let resample = mode.resamples_audio();
    let drop = mode.drops_video() && opts.frame_dropping.vo;

    if resample && input.audio_passthrough {
        return DisplaySyncStep::inactive(next);
    }

    let vsync = match input.vsync_interval {
        Some(vsync) if vsync > 0.0 => vsync,
        _ => return DisplaySyncStep::inactive(next),
    };

    let approx = history.latest().map_or(0.0, |r| r.approx_duration);
    let adjusted_duration = approx.max(0.0) / opts.playback_speed;
    if adjusted_duration > MAX_DISPLAY_SYNC_FRAME_DURATION {
        return DisplaySyncStep::inactive(next);
    }

    next.speed_factor_video = 1.0;
    if mode != VideoSyncMode::DisplayVdrop {
        let best = find_best_speed(history, vsync, opts.playback_speed);
        // Play at normal speed if it doesn't work
        if (best - 1.0).abs() <= opts.sync_max_video_change / 100.0 {
            next.speed_factor_video = best;
        }
    }

    let av_diff = next.last_av_difference;
    if av_diff.abs() > DISPLAY_SYNC_BREAK_THRESHOLD {
        next.display_sync_broken = true;
        let mut step = DisplaySyncStep::inactive(next);
        step.broke = true;
        return step;
    }

    // Vsyncs to show this frame for; 0 if the video frame rate is higher
    // than the display rate
    let frame_duration = adjusted_duration / next.speed_factor_video;
    let ratio = (frame_duration + next.display_sync_error) / vsync;
    let mut num_vsyncs = (ratio.round_ties_even() as i32).max(0);
    let prev_error = next.display_sync_error;
    next.display_sync_error += frame_duration - num_vsyncs as f64 * vsync;

    debug!(
        speed = next.speed_factor_video,
        num_vsyncs,
        duration = adjusted_duration,
        ratio,
        error = next.display_sync_error,
        "display sync frame"
    );

    // Tolerate some desync to avoid dropping frames on jitter. Rounds
    // towards zero.
    let mut drop_repeat = 0;
    if drop && av_diff.abs() >= DROP_REPEAT_MIN_DESYNC && av_diff.abs() / vsync >= 1.0 {
        drop_repeat = (-av_diff / vsync) as i32;
    }
    // At most all vsyncs can be dropped; repeats are bounded to 10x
    drop_repeat = drop_repeat.clamp(-num_vsyncs, num_vsyncs.saturating_mul(10));
    num_vsyncs = num_vsyncs.saturating_add(drop_repeat);

    // Pretend the vsync-aligned timing is perfect and the correction has
    // already happened when estimating the video position
    let time_left = input.vo_delay + prev_error + drop_repeat as f64 * vsync;

    if drop_repeat != 0 {
        next.mistimed_frames += 1;
    }

    next.total_avsync_change = 0.0;
    let desync_warning = update_av_diff(
        &mut next,
        &input.positions,
        time_left * opts.playback_speed,
    );

    let record_update = RecordUpdate {
        num_vsyncs,
        av_diff: next.last_av_difference,
    };

    if resample {
        adjust_audio_resample_speed(
            &mut next,
            history,
            vsync,
            opts,
            input.positions.audio_playing,
        );
    } else {
        next.speed_factor_audio = 1.0;
    }

    // Only used if playback falls back to audio sync
    next.time_frame = time_left;

    next.display_sync_active = true;
    next.update_playback_speed(opts.playback_speed);

    DisplaySyncStep {
        state: next,
        annotation: Some(FrameAnnotation {
            vsync_interval: vsync,
            vsync_offset: -prev_error,
            ideal_frame_duration: frame_duration,
            num_vsyncs: num_vsyncs as u32,
        }),
        record_update: Some(record_update),
        drop_repeat,
        desync_warning,
        broke: false,
    }
}

/// Resample audio so it follows display-synced video
///
/// Only `display-resample` with audio playing compensates drift; other
/// resampling modes give audio the video speed factor. The audio factor is
/// pushed by the maximum allowed change against the direction of the desync
/// once it exceeds half a vsync, and released when the desync changes sign.
/// On release the regression drift estimate picks a compensating factor.
pub fn adjust_audio_resample_speed(
    state: &mut SyncState,
    history: &FrameHistory,
    vsync: f64,
    opts: &SyncOptions,
    audio_playing: bool,
) {
    if opts.video_sync != VideoSyncMode::DisplayResample || !audio_playing {
        state.speed_factor_audio = state.speed_factor_video;
        return;
    }

    let max_drift = vsync / 2.0;
    let av_diff = state.last_av_difference;
    let mut new_dir = state.display_sync_drift_dir;
    if av_diff * -state.display_sync_drift_dir.as_f64() >= 0.0 {
        new_dir = DriftDirection::None;
    }
    if av_diff.abs() > max_drift {
        new_dir = DriftDirection::from_av_diff(av_diff);
    }

    let changed = state.display_sync_drift_dir != new_dir;
    if new_dir.is_none() && !changed {
        return;
    }
    if changed {
        debug!(direction = new_dir.as_f64(), "display sync audio drift direction changed");
    }
    state.display_sync_drift_dir = new_dir;

    let max_correct = opts.sync_max_audio_change / 100.0;
    let mut audio_factor = 1.0 - max_correct * new_dir.as_f64();

    if new_dir.is_none() {
        // Released: pick a speed that compensates the general drift
        let drift = estimate_drift(history, vsync);
        if drift.is_normal() {
            let other = opts.playback_speed * state.speed_factor_video;
            audio_factor = (state.audio_speed - drift) / other;
            debug!(audio_factor, drift, "audio drift compensation");
        }
    }

    let audio_factor = audio_factor.clamp(1.0 - max_correct, 1.0 + max_correct);
    state.speed_factor_audio = audio_factor * state.speed_factor_video;
}

#[cfg(test)]
mod tests {
    use super::*;

    const VSYNC_60: f64 = 1.0 / 60.0;

    fn options(mode: VideoSyncMode) -> SyncOptions {
        SyncOptions {
            video_sync: mode,
            ..SyncOptions::default()
        }
    }

    fn history_with(duration: f64, frames: usize) -> FrameHistory {
        let mut history = FrameHistory::new();
        for n in 0..frames {
            history.record_frame_with_duration(Some(n as f64 * duration), Some(duration));
        }
        history
    }

    fn input() -> DisplaySyncInput {
        DisplaySyncInput {
            vsync_interval: Some(VSYNC_60),
            vo_delay: VSYNC_60,
            audio_passthrough: false,
            positions: AvPositions::default(),
        }
    }

    #[test]
    fn test_best_speed_exact_multiples() {
        assert!((calc_best_speed(VSYNC_60, 1.0 / 30.0) - 1.0).abs() < 1e-9);
        assert!((calc_best_speed(VSYNC_60, 1.0 / 24.0) - 1.0).abs() < 1e-9);
        assert!((calc_best_speed(VSYNC_60, 1.0 / 60.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_speed_ntsc_film() {
        let speed = calc_best_speed(VSYNC_60, 1001.0 / 24000.0);
        assert!((speed - 1.001).abs() < 1e-9, "speed = {speed}");
    }

    #[test]
    fn test_best_speed_averages_history() {
        let history = history_with(1001.0 / 30000.0, 20);
        let speed = find_best_speed(&history, VSYNC_60, 1.0);
        assert!((speed - 1.001).abs() < 1e-9);

        assert_eq!(find_best_speed(&FrameHistory::new(), VSYNC_60, 1.0), 1.0);
    }

    #[test]
    fn test_disabled_mode_is_inactive() {
        let mut state = SyncState::new(1.0);
        state.display_sync_active = true;
        state.display_sync_error = 0.003;
        let history = history_with(1.0 / 24.0, 5);

        let step = schedule_display_sync(&state, &history, &input(), &options(VideoSyncMode::Audio));
        assert!(step.annotation.is_none());
        assert!(!step.state.display_sync_active);
        // Error is only cleared when entering from inactive
        assert_eq!(step.state.display_sync_error, 0.003);
    }

    #[test]
    fn test_tiny_vsync_interval_does_not_overflow() {
        let state = SyncState::new(1.0);
        let history = history_with(1.0 / 24.0, 5);
        let mut fast = input();
        fast.vsync_interval = Some(1e-10);

        let opts = options(VideoSyncMode::DisplayVdrop);
        let step = schedule_display_sync(&state, &history, &fast, &opts);
        let annotation = step.annotation.unwrap();
        assert!(annotation.num_vsyncs > 400_000_000);
        assert_eq!(step.drop_repeat, 0);

        // Vsync counts beyond i32 saturate
        fast.vsync_interval = Some(1e-12);
        let step = schedule_display_sync(&state, &history, &fast, &opts);
        assert_eq!(step.annotation.unwrap().num_vsyncs, i32::MAX as u32);
    }

    #[test]
    fn test_unknown_vsync_or_long_frames_inactive() {
        let state = SyncState::new(1.0);
        let opts = options(VideoSyncMode::DisplayResample);

        let mut no_vsync = input();
        no_vsync.vsync_interval = None;
        let history = history_with(1.0 / 24.0, 5);
        assert!(schedule_display_sync(&state, &history, &no_vsync, &opts)
            .annotation
            .is_none());

        let slideshow = history_with(1.0, 5);
        assert!(schedule_display_sync(&state, &slideshow, &input(), &opts)
            .annotation
            .is_none());
    }

    #[test]
    fn test_passthrough_disables_resample_modes() {
        let state = SyncState::new(1.0);
        let history = history_with(1.0 / 24.0, 5);
        let mut passthrough = input();
        passthrough.audio_passthrough = true;

        let resample = options(VideoSyncMode::DisplayResample);
        assert!(schedule_display_sync(&state, &history, &passthrough, &resample)
            .annotation
            .is_none());

        let vdrop = options(VideoSyncMode::DisplayVdrop);
        assert!(schedule_display_sync(&state, &history, &passthrough, &vdrop)
            .annotation
            .is_some());
    }

    #[test]
    fn test_cadence_24_on_60() {
        let opts = options(VideoSyncMode::DisplayResample);
        let duration = 1.0 / 24.0;
        let mut history = FrameHistory::new();
        let mut state = SyncState::new(1.0);
        let mut cadence = Vec::new();

        for n in 0..1000 {
            history.record_frame_with_duration(Some(n as f64 * duration), Some(duration));
            let step = schedule_display_sync(&state, &history, &input(), &opts);
            let annotation = step.annotation.expect("display-synced");
            cadence.push(annotation.num_vsyncs);
            state = step.state;

            assert!(state.display_sync_error.abs() <= VSYNC_60 + 1e-9);
            assert!((state.speed_factor_video - 1.0).abs() < 1e-9);
        }

        for pair in cadence.chunks(2) {
            assert_eq!(pair.iter().sum::<u32>(), 5, "cadence {pair:?}");
            assert!(pair.iter().all(|n| *n == 2 || *n == 3));
        }
    }

    #[test]
    fn test_quantization_conserves_time() {
        let opts = options(VideoSyncMode::DisplayDesync);
        let duration = 1.0 / 25.0;
        let mut history = FrameHistory::new();
        let mut state = SyncState::new(1.0);
        let mut total_vsyncs = 0u32;
        let frames = 500;

        for n in 0..frames {
            history.record_frame_with_duration(Some(n as f64 * duration), Some(duration));
            let step = schedule_display_sync(&state, &history, &input(), &opts);
            total_vsyncs += step.annotation.unwrap().num_vsyncs;
            state = step.state;
        }

        // Shown time differs from content time only by the carried error
        let shown = total_vsyncs as f64 * VSYNC_60;
        let ideal = frames as f64 * duration / state.speed_factor_video;
        assert!((ideal - shown - state.display_sync_error).abs() < 1e-6);
        assert!(state.display_sync_error.abs() <= VSYNC_60 / 2.0 + 1e-9);
    }

    #[test]
    fn test_desync_drops_vsyncs() {
        let opts = options(VideoSyncMode::DisplayVdrop);
        let history = history_with(1.0 / 24.0, 5);
        let mut state = SyncState::new(1.0);
        state.display_sync_active = true;
        state.last_av_difference = 0.040;

        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert_eq!(step.drop_repeat, -2);
        assert_eq!(step.state.mistimed_frames, 1);
        let annotation = step.annotation.unwrap();
        let base = annotation.num_vsyncs as i32 - step.drop_repeat;
        assert!(annotation.num_vsyncs as i32 >= 0);
        assert_eq!(annotation.num_vsyncs as i32, base - 2);
    }

    #[test]
    fn test_drop_repeat_bounds() {
        let opts = options(VideoSyncMode::DisplayVdrop);
        let history = history_with(1.0 / 60.0, 5);
        let mut state = SyncState::new(1.0);
        state.display_sync_active = true;

        // Far ahead: can drop at most all vsyncs of the frame
        state.last_av_difference = 0.3;
        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert_eq!(step.drop_repeat, -1);
        assert_eq!(step.annotation.unwrap().num_vsyncs, 0);

        // Far behind: repeat is bounded by 10x
        state.last_av_difference = -0.4;
        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert_eq!(step.drop_repeat, 10);
        assert_eq!(step.annotation.unwrap().num_vsyncs, 11);
    }

    #[test]
    fn test_small_desync_not_corrected() {
        let opts = options(VideoSyncMode::DisplayVdrop);
        let history = history_with(1.0 / 24.0, 5);
        let mut state = SyncState::new(1.0);
        state.last_av_difference = 0.015;

        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert_eq!(step.drop_repeat, 0);

        // Modes without video dropping never correct
        state.last_av_difference = 0.1;
        let step = schedule_display_sync(
            &state,
            &history,
            &input(),
            &options(VideoSyncMode::DisplayDesync),
        );
        assert_eq!(step.drop_repeat, 0);
    }

    #[test]
    fn test_vo_frame_dropping_disabled_prevents_drop() {
        let mut opts = options(VideoSyncMode::DisplayVdrop);
        opts.frame_dropping.vo = false;
        let history = history_with(1.0 / 24.0, 5);
        let mut state = SyncState::new(1.0);
        state.last_av_difference = 0.1;

        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert_eq!(step.drop_repeat, 0);
    }

    #[test]
    fn test_large_desync_breaks_permanently() {
        let opts = options(VideoSyncMode::DisplayResample);
        let history = history_with(1.0 / 24.0, 5);
        let mut state = SyncState::new(1.0);
        state.last_av_difference = 0.6;

        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert!(step.broke);
        assert!(step.state.display_sync_broken);
        assert!(step.annotation.is_none());

        let mut state = step.state;
        state.last_av_difference = 0.0;
        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert!(step.annotation.is_none());
        assert!(!step.broke);
    }

    #[test]
    fn test_vdrop_mode_keeps_speed() {
        let history = history_with(1001.0 / 24000.0, 10);
        let state = SyncState::new(1.0);

        let step = schedule_display_sync(
            &state,
            &history,
            &input(),
            &options(VideoSyncMode::DisplayVdrop),
        );
        assert_eq!(step.state.speed_factor_video, 1.0);

        let step = schedule_display_sync(
            &state,
            &history,
            &input(),
            &options(VideoSyncMode::DisplayDesync),
        );
        assert!((step.state.speed_factor_video - 1.001).abs() < 1e-9);
        assert_eq!(step.state.speed_factor_audio, 1.0);
    }

    #[test]
    fn test_speed_change_limit() {
        // 21 fps on 60 Hz needs 2% to lock; beyond the default 1% limit
        let history = history_with(1.0 / 21.0, 10);
        let state = SyncState::new(1.0);
        let mut opts = options(VideoSyncMode::DisplayResample);

        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert_eq!(step.state.speed_factor_video, 1.0);

        opts.sync_max_video_change = 5.0;
        let step = schedule_display_sync(&state, &history, &input(), &opts);
        assert!((step.state.speed_factor_video - 1.0).abs() > 0.01);
    }

    #[test]
    fn test_av_diff_uses_time_left() {
        let opts = options(VideoSyncMode::DisplayDesync);
        let history = history_with(1.0 / 30.0, 5);
        let mut state = SyncState::new(1.0);
        state.display_sync_active = true;
        state.display_sync_error = 0.002;

        let mut input = input();
        input.vo_delay = 0.010;
        input.positions = AvPositions {
            audio_playing: true,
            video_playing: true,
            audio_pts: Some(5.0),
            video_pts: Some(5.02),
            audio_delay: 0.0,
        };

        let step = schedule_display_sync(&state, &history, &input, &opts);
        // 5.0 - 5.02 + (0.010 + 0.002)
        assert!((step.state.last_av_difference - (-0.008)).abs() < 1e-9);
        assert_eq!(step.record_update.unwrap().av_diff, step.state.last_av_difference);
        assert!((step.state.time_frame - 0.012).abs() < 1e-12);
        assert!((step.annotation.unwrap().vsync_offset + 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_resample_without_audio_follows_video() {
        let mut state = SyncState::new(1.0);
        state.speed_factor_video = 1.001;
        let history = FrameHistory::new();

        adjust_audio_resample_speed(
            &mut state,
            &history,
            VSYNC_60,
            &options(VideoSyncMode::DisplayResample),
            false,
        );
        assert_eq!(state.speed_factor_audio, 1.001);

        state.speed_factor_video = 1.002;
        adjust_audio_resample_speed(
            &mut state,
            &history,
            VSYNC_60,
            &options(VideoSyncMode::DisplayResampleVdrop),
            true,
        );
        assert_eq!(state.speed_factor_audio, 1.002);
    }

    #[test]
    fn test_resample_drift_direction() {
        let opts = options(VideoSyncMode::DisplayResample);
        let history = FrameHistory::new();
        let mut state = SyncState::new(1.0);

        // Below half a vsync: nothing happens
        state.last_av_difference = 0.005;
        adjust_audio_resample_speed(&mut state, &history, VSYNC_60, &opts, true);
        assert!(state.display_sync_drift_dir.is_none());
        assert_eq!(state.speed_factor_audio, 1.0);

        // Audio ahead: slow audio down by the maximum change
        state.last_av_difference = 0.010;
        adjust_audio_resample_speed(&mut state, &history, VSYNC_60, &opts, true);
        assert_eq!(state.display_sync_drift_dir, DriftDirection::Positive);
        assert!((state.speed_factor_audio - 0.99875).abs() < 1e-12);

        // Still ahead but within range: keep pushing
        state.last_av_difference = 0.002;
        adjust_audio_resample_speed(&mut state, &history, VSYNC_60, &opts, true);
        assert_eq!(state.display_sync_drift_dir, DriftDirection::Positive);

        // Crossed zero: release, no drift estimate available
        state.last_av_difference = -0.001;
        adjust_audio_resample_speed(&mut state, &history, VSYNC_60, &opts, true);
        assert!(state.display_sync_drift_dir.is_none());
        assert!((state.speed_factor_audio - 1.0).abs() < 1e-12);

        // Audio behind: speed audio up
        state.last_av_difference = -0.012;
        adjust_audio_resample_speed(&mut state, &history, VSYNC_60, &opts, true);
        assert_eq!(state.display_sync_drift_dir, DriftDirection::Negative);
        assert!((state.speed_factor_audio - 1.00125).abs() < 1e-12);
    }

    #[test]
    fn test_resample_release_uses_drift_estimate() {
        let opts = options(VideoSyncMode::DisplayResample);
        let mut history = FrameHistory::new();
        for n in 0..40 {
            history.record_frame_with_duration(Some(n as f64 * 0.05), Some(0.05));
            let record = history.latest_mut().unwrap();
            record.num_vsyncs = 3;
            record.av_diff = 0.0004 * n as f64 * 3.0 * VSYNC_60;
        }

        let mut state = SyncState::new(1.0);
        state.display_sync_drift_dir = DriftDirection::Positive;
        state.last_av_difference = -0.001;
        adjust_audio_resample_speed(&mut state, &history, VSYNC_60, &opts, true);

        assert!(state.display_sync_drift_dir.is_none());
        assert!((state.speed_factor_audio - 0.9996).abs() < 1e-9);
    }
}
