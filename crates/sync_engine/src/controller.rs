//! Frame timing controller.
//!
//! [`tick`] runs one step of the video playback loop:
//!
//! 1. start playback once audio and video are both ready
//! 2. pull frames from the decoder into the pending queue
//! 3. reconfigure the output on format changes
//! 4. compute when the head frame is due (audio sync or display sync)
//! 5. hand it to the output with a deadline or a vsync count
//!
//! The controller never blocks. Whenever a collaborator is not ready it
//! returns [`TickOutcome::Wait`] and the caller ticks again later.

use contracts::{
    AudioClock, ContractError, DecodeRequest, DecodeStatus, FrameDeadline, FrameReport,
    FrameSource, PlaybackStatus, PlayerEvent, SubtitleGate, VideoOutput, VideoSyncMode, VoFrame,
    VO_MAX_REQ_FRAMES,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::display_sync::{schedule_display_sync, DisplaySyncInput};
use crate::drift::{adjust_sync, observe_audio_written, update_av_diff, AudioSyncInput, AvPositions};
use crate::session::PlaybackSession;

/// PTS jumps of this size or more between frames are discontinuities (seconds)
pub const MAX_FRAME_TIME: f64 = 15.0;

/// Precise seek keeps frames this close before the target (seconds)
const HRSEEK_TOLERANCE: f64 = 0.005;

/// Minimum container frame duration used for the last frame at EOF
const MIN_EOF_FRAME_DURATION: f64 = 0.1;

/// A/V lag tolerated before the decoder may drop frames (seconds)
const FRAMEDROP_TOLERANCE: f64 = 0.100;

/// Without audio, video does not try to catch up from further behind
const MAX_CATCHUP: f64 = 0.2;

/// Upper bound of the frame duration handed to the output (seconds)
const MAX_VO_FRAME_DURATION: f64 = 10.0;

/// External collaborators driven by one tick
pub struct Collaborators<'a> {
    pub source: &'a mut dyn FrameSource,
    pub output: &'a mut dyn VideoOutput,
    /// `None` for sessions without audio
    pub audio: Option<&'a mut dyn AudioClock>,
    pub subtitles: &'a dyn SubtitleGate,
}

impl Collaborators<'_> {
    fn audio_written_pts(&self) -> Option<f64> {
        self.audio.as_ref().and_then(|audio| audio.written_pts())
    }

    fn audio_output_delay(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, |audio| audio.output_delay())
    }

    fn audio_untimed(&self) -> bool {
        self.audio.as_ref().is_some_and(|audio| audio.is_untimed())
    }

    fn audio_passthrough(&self) -> bool {
        self.audio.as_ref().is_some_and(|audio| audio.is_passthrough())
    }
}

/// Result of one [`tick`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Paused with a frame on screen
    Idle,
    /// Blocked on a collaborator or on time; tick again later
    Wait,
    /// Made progress without presenting; tick again immediately
    Again,
    /// A frame was handed to the output
    Presented(FrameReport),
    /// Video finished and the output is done presenting
    Eof,
}

/// Result of filling the pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputImage {
    NewFrame,
    Progress,
    Wait,
    Eof,
}

impl From<DecodeStatus> for OutputImage {
    fn from(status: DecodeStatus) -> Self {
        match status {
            DecodeStatus::Progress => OutputImage::Progress,
            DecodeStatus::Wait => OutputImage::Wait,
            DecodeStatus::Eof => OutputImage::Eof,
        }
    }
}

/// Run one step of video playback at clock time `now` (seconds)
///
/// # Errors
/// Decoder, filter or output reconfiguration failures. The video stream is
/// marked Eof and the caller is expected to tear the video chain down.
#[instrument(
    level = "trace",
    name = "avsync_tick",
    skip(session, io),
    fields(status = ?session.video_status())
)]
pub fn tick(
    session: &mut PlaybackSession,
    io: &mut Collaborators<'_>,
    now: f64,
) -> Result<TickOutcome, ContractError> {
    match write_video(session, io, now) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            error!(error = %err, "could not initialize video chain");
            metrics::counter!("avsync_video_chain_errors_total").increment(1);
            session.status.video = PlaybackStatus::Eof;
            Err(err)
        }
    }
}

fn write_video(
    session: &mut PlaybackSession,
    io: &mut Collaborators<'_>,
    now: f64,
) -> Result<TickOutcome, ContractError> {
    if session.status.audio == PlaybackStatus::Syncing
        && io.audio.as_ref().is_some_and(|audio| audio.is_ready())
    {
        session.status.audio_ready();
    }
    apply_audio_pause(session, io);

    // Actual playback starts when both audio and video are ready
    if session.status.video == PlaybackStatus::Ready {
        if session.status.try_start_playback() {
            if let Some(audio) = io.audio.as_deref_mut() {
                audio.start();
            }
        }
        if session.status.video == PlaybackStatus::Ready {
            return Ok(TickOutcome::Wait);
        }
        session.last_tick = Some(now);
        // The seek target was reached
        session.hrseek_pts = None;
        info!(pts = ?session.video_pts, "playback started");
    }

    if session.status.audio_playing() {
        let written = io.audio_written_pts();
        let playing = playing_audio_pts(session, io);
        observe_audio_written(&mut session.sync, written, playing);
    }

    if session.status.is_paused_idle() {
        return Ok(TickOutcome::Idle);
    }

    let r = output_image(session, io)?;
    trace!(?r, "output image");

    match r {
        OutputImage::Wait => return Ok(TickOutcome::Wait),
        OutputImage::Eof => return Ok(handle_video_eof(session, io)),
        OutputImage::NewFrame | OutputImage::Progress => {}
    }

    session.status.video_progress();

    if r != OutputImage::NewFrame {
        return Ok(TickOutcome::Again);
    }

    let Some(params) = session.queue.front().map(|frame| frame.params) else {
        return Ok(TickOutcome::Again);
    };
    if io.output.params() != Some(params) {
        // Reconfiguring drops the current frame; let it finish first
        if io.output.still_displaying() {
            return Ok(TickOutcome::Wait);
        }
        info!(
            width = params.width,
            height = params.height,
            format = ?params.format,
            "video output reconfig"
        );
        io.output.reconfigure(&params)?;
        session.emit(PlayerEvent::VideoReconfig { params });
    }

    let elapsed = relative_time(session, now);
    session.sync.time_frame -= elapsed;
    update_avsync_before_frame(session, io);

    let head_pts = session.queue.front().and_then(|frame| frame.pts);
    if !io.subtitles.ready_for_pts(head_pts) {
        debug!(pts = ?head_pts, "video frame delayed waiting on subtitles");
        return Ok(TickOutcome::Wait);
    }

    let deadline_time = now + session.sync.time_frame.max(-1.0);
    // The first frame after a sync mode change uses the previous waiting mode
    let deadline = if session.sync.display_sync_active {
        FrameDeadline::NextVsync
    } else {
        FrameDeadline::PresentAt(deadline_time)
    };

    if !io.output.is_ready_for(deadline) {
        if io.source.needs_input() {
            io.source.decode_and_filter(DecodeRequest::default())?;
        }
        return Ok(TickOutcome::Wait);
    }

    Ok(TickOutcome::Presented(present_frame(
        session,
        io,
        deadline_time,
    )))
}

/// Fill the pending queue until the head frame may be presented
fn output_image(
    session: &mut PlaybackSession,
    io: &mut Collaborators<'_>,
) -> Result<OutputImage, ContractError> {
    // Frame limit reached: stop as if the file ended
    if session.max_frames == Some(0) {
        session.queue.clear();
        return Ok(OutputImage::Eof);
    }

    let hrseek = session
        .hrseek_pts
        .filter(|_| session.status.video == PlaybackStatus::Syncing);

    session
        .queue
        .configure(io.output.requested_lookahead(), session.video_pts.is_none());

    if session.queue.has_enough(false) {
        return Ok(OutputImage::NewFrame);
    }

    let mut r = OutputImage::Progress;
    if session.queue.needs_frame() {
        let request = DecodeRequest {
            allow_framedrop: decoder_may_drop(session, io),
            start_pts: hrseek,
        };
        r = io.source.decode_and_filter(request)?.into();

        if let Some(frame) = io.source.read_output_frame() {
            let pts = frame.pts;
            if session
                .play_end_pts
                .is_some_and(|end| pts.is_some_and(|pts| pts >= end))
            {
                r = OutputImage::Eof;
            } else if hrseek
                .is_some_and(|target| pts.is_some_and(|pts| pts < target - HRSEEK_TOLERANCE))
            {
                trace!(?pts, "skipping frame before seek target");
            } else if session.status.video == PlaybackStatus::Syncing
                && session
                    .playback_pts
                    .is_some_and(|pos| pts.is_some_and(|pts| pts < pos))
            {
                trace!(?pts, "skipping frame after stream switch");
            } else if session.queue.push(frame) {
                handle_new_frame(session, io);
            }
        }
    }

    let eof = r == OutputImage::Eof;
    Ok(if session.queue.has_enough(eof) {
        OutputImage::NewFrame
    } else {
        r
    })
}

/// Decoder may skip frames when video lags too far behind audio
fn decoder_may_drop(session: &PlaybackSession, io: &Collaborators<'_>) -> bool {
    if !session.options.frame_dropping.decoder
        || !session.status.both_playing()
        || session.status.paused
        || io.audio_untimed()
    {
        return false;
    }
    let frame_time = io
        .source
        .container_fps()
        .filter(|fps| *fps > 0.0)
        .map_or(0.0, |fps| 1.0 / fps);
    // Avoid dropping many frames in a row unless far behind
    let dropped = io
        .source
        .dropped_frames()
        .saturating_sub(session.dropped_frames_start);
    session.sync.last_av_difference - FRAMEDROP_TOLERANCE > dropped as f64 * frame_time
}

/// Make a new head frame known to the timing logic
///
/// Must run exactly once per frame that becomes the queue head.
fn handle_new_frame(session: &mut PlaybackSession, io: &Collaborators<'_>) {
    let pts = session.queue.front().and_then(|frame| frame.pts);

    let mut frame_time = 0.0;
    if let (Some(prev), Some(pts)) = (session.video_pts, pts) {
        frame_time = pts - prev;
        if frame_time <= 0.0 || frame_time >= MAX_FRAME_TIME {
            warn!(prev, pts, "invalid video timestamp, assuming discontinuity");
            metrics::counter!("avsync_timestamp_discontinuities_total").increment(1);
            frame_time = 0.0;
        }
    }

    session.sync.delay -= frame_time;
    if session.status.video >= PlaybackStatus::Playing {
        session.sync.time_frame += frame_time / session.sync.video_speed;
        let input = AudioSyncInput {
            audio_playing: session.status.audio_playing(),
            written_audio_pts: io.audio_written_pts(),
            audio_delay: session.options.audio_delay,
            max_pts_correction: session.options.max_pts_correction,
        };
        adjust_sync(&mut session.sync, &input, pts, frame_time);
    }
    session.dropped_frames_start = io.source.dropped_frames();
    trace!(frame_time, "new head frame");
}

/// Time since the previous timing update
fn relative_time(session: &mut PlaybackSession, now: f64) -> f64 {
    let elapsed = session.last_tick.map_or(0.0, |last| (now - last).max(0.0));
    session.last_tick = Some(now);
    elapsed
}

/// Adjust `time_frame` of the head frame before it is shown
///
/// May run several times for the same frame.
fn update_avsync_before_frame(session: &mut PlaybackSession, io: &Collaborators<'_>) {
    let opts = &session.options;
    let sync = &mut session.sync;

    if session.status.video < PlaybackStatus::Ready {
        sync.time_frame = 0.0;
    } else if sync.display_sync_active || opts.video_sync == VideoSyncMode::Desync {
        // timing left alone
    } else if session.status.both_playing() && !io.audio_untimed() {
        let mut buffered_audio = io.audio_output_delay();

        let predicted = sync.delay / sync.video_speed + sync.time_frame;
        let difference = buffered_audio - predicted;
        trace!(difference, "audio difference");

        if opts.autosync > 0 {
            // Smooth the reported audio position with the expected one
            buffered_audio = predicted + difference / opts.autosync as f64;
        }

        sync.time_frame = buffered_audio - sync.delay / sync.video_speed;
    } else if sync.time_frame < -MAX_CATCHUP || opts.untimed || io.output.is_untimed() {
        // Continue at normal speed from this frame instead of catching up
        sync.time_frame = 0.0;
    }
}

/// PTS of the audio currently heard
fn playing_audio_pts(session: &PlaybackSession, io: &Collaborators<'_>) -> Option<f64> {
    io.audio_written_pts()
        .map(|written| written - session.options.playback_speed * io.audio_output_delay())
}

fn av_positions(session: &PlaybackSession, io: &Collaborators<'_>) -> AvPositions {
    AvPositions {
        audio_playing: session.status.audio_playing(),
        video_playing: session.status.video_playing(),
        audio_pts: playing_audio_pts(session, io),
        video_pts: session.video_pts,
        audio_delay: session.options.audio_delay,
    }
}

fn handle_video_eof(session: &mut PlaybackSession, io: &Collaborators<'_>) -> TickOutcome {
    let has_duration = session
        .history
        .latest()
        .is_some_and(|record| record.duration > 0.0);
    let changed = session
        .status
        .video_eof(has_duration && io.output.still_displaying());
    session.sync.delay = 0.0;
    session.sync.last_av_difference = 0.0;

    if changed {
        debug!(status = ?session.status.video, "video EOF");
    }
    if session.status.video == PlaybackStatus::Eof {
        TickOutcome::Eof
    } else {
        TickOutcome::Wait
    }
}

/// Raw duration of the head frame from the lookahead
fn head_frame_duration(session: &PlaybackSession) -> Option<f64> {
    if session.queue.len() >= 2 {
        let first = session.queue.get(0).and_then(|frame| frame.pts);
        let second = session.queue.get(1).and_then(|frame| frame.pts);
        match (first, second) {
            (Some(a), Some(b)) if b >= a => Some(b - a),
            _ => None,
        }
    } else {
        // Last frame at EOF; only use the container rate if significant
        session
            .history
            .nominal_duration()
            .filter(|duration| *duration >= MIN_EOF_FRAME_DURATION)
    }
}

/// Hand the head frame to the output
fn present_frame(
    session: &mut PlaybackSession,
    io: &mut Collaborators<'_>,
    deadline_time: f64,
) -> FrameReport {
    let nominal = io
        .source
        .container_fps()
        .filter(|fps| *fps > 0.0)
        .map(|fps| 1.0 / fps);
    session.history.set_nominal_duration(nominal);

    let pts = session.queue.front().and_then(|frame| frame.pts);
    let duration = head_frame_duration(session);
    let record = session.history.record_frame_with_duration(pts, duration);

    let frames = session
        .queue
        .iter()
        .take(VO_MAX_REQ_FRAMES)
        .cloned()
        .collect();
    let mut frame = VoFrame::new(deadline_time, frames);
    frame.still = session.step_frames > 0;

    // Untimed output disables frame dropping and duration-based timing
    if !(session.options.untimed || io.output.is_untimed()) && record.approx_duration >= 0.0 {
        let mut diff = record.approx_duration / session.sync.video_speed;
        if session.sync.time_frame < 0.0 {
            diff += session.sync.time_frame;
        }
        frame.duration = Some(diff.clamp(0.0, MAX_VO_FRAME_DURATION));
    }

    session.video_pts = pts;
    session.last_vo_pts = pts;
    session.playback_pts = pts;
    session.queue.pop_front();

    let drop_repeat = schedule_frame(session, io, &mut frame);

    let display_synced = frame.display_synced;
    let num_vsyncs = if display_synced {
        frame.num_vsyncs as i32
    } else {
        -1
    };
    io.output.queue_frame(frame);

    // The queue shifted; initialize the new head
    if !session.queue.is_empty() {
        handle_new_frame(session, io);
    }

    session.shown_frames += 1;
    if session.status.video < PlaybackStatus::Playing && session.status.first_frame_shown() {
        info!(pts = ?pts, "first video frame after restart shown");
        session.emit(PlayerEvent::FirstFrameShown);
    }
    session.emit(PlayerEvent::Tick);

    if session.status.video != PlaybackStatus::Eof {
        if session.step_frames > 0 {
            session.step_frames -= 1;
            if session.step_frames == 0 {
                session.status.paused = true;
                apply_audio_pause(session, io);
            }
        }
        if let Some(remaining) = session.max_frames.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    apply_audio_speed(session, io);

    metrics::counter!("avsync_frames_presented_total").increment(1);
    if drop_repeat != 0 {
        metrics::counter!("avsync_drop_repeat_frames_total").increment(1);
    }

    let sync = &session.sync;
    trace!(
        pts = ?pts,
        num_vsyncs,
        av_diff = sync.last_av_difference,
        time_frame = sync.time_frame,
        "frame presented"
    );

    FrameReport {
        pts,
        deadline: deadline_time,
        display_synced,
        num_vsyncs,
        drop_repeat,
        av_diff: sync.last_av_difference,
        display_sync_error: sync.display_sync_error,
        speed_factor_video: sync.speed_factor_video,
        speed_factor_audio: sync.speed_factor_audio,
        frame_duration: record.approx_duration,
        time_frame: sync.time_frame,
        decoder_drops: io.source.dropped_frames(),
        mistimed_frames: sync.mistimed_frames,
    }
}

/// Run display-sync for the frame just recorded, or fall back to audio sync
///
/// Returns the vsyncs added or removed for desync correction.
fn schedule_frame(
    session: &mut PlaybackSession,
    io: &Collaborators<'_>,
    frame: &mut VoFrame,
) -> i32 {
    let input = DisplaySyncInput {
        vsync_interval: io.output.vsync_interval(),
        vo_delay: io.output.delay(),
        audio_passthrough: io.audio_passthrough(),
        positions: av_positions(session, io),
    };
    let step = schedule_display_sync(&session.sync, &session.history, &input, &session.options);
    session.sync = step.state;

    if let Some(update) = step.record_update {
        if let Some(record) = session.history.latest_mut() {
            record.num_vsyncs = update.num_vsyncs;
            record.av_diff = update.av_diff;
        }
    }

    if let Some(annotation) = step.annotation {
        frame.display_synced = true;
        frame.vsync_interval = annotation.vsync_interval;
        frame.vsync_offset = annotation.vsync_offset;
        frame.ideal_frame_duration = annotation.ideal_frame_duration;
        frame.num_vsyncs = annotation.num_vsyncs;
    }

    let av_diff = session.sync.last_av_difference;
    if step.desync_warning {
        session.emit(PlayerEvent::DesyncWarning { av_diff });
    }
    if step.broke {
        warn!(av_diff, "display sync broken, falling back to audio sync");
        metrics::counter!("avsync_display_sync_broken_total").increment(1);
        session.emit(PlayerEvent::DisplaySyncBroken { av_diff });
    }

    let active = session.sync.display_sync_active;
    if session
        .history
        .get(1)
        .is_some_and(|prev| prev.is_display_synced() != active)
    {
        info!(active, "video sync mode {}", if active { "enabled" } else { "disabled" });
        session.emit(PlayerEvent::SyncModeChanged { active });
    }

    if !active {
        let sync = &mut session.sync;
        sync.speed_factor_audio = 1.0;
        sync.speed_factor_video = 1.0;
        sync.update_playback_speed(session.options.playback_speed);

        let offset = if sync.time_frame > 0.0 {
            sync.time_frame * sync.video_speed
        } else {
            0.0
        };
        let positions = av_positions(session, io);
        if update_av_diff(&mut session.sync, &positions, offset) {
            let av_diff = session.sync.last_av_difference;
            session.emit(PlayerEvent::DesyncWarning { av_diff });
        }
    }

    step.drop_repeat
}

/// Keep the audio output paused together with video
fn apply_audio_pause(session: &mut PlaybackSession, io: &mut Collaborators<'_>) {
    let paused = session.status.paused;
    if session.audio_paused_applied == paused {
        return;
    }
    if let Some(audio) = io.audio.as_deref_mut() {
        debug!(paused, "audio pause changed");
        audio.set_paused(paused);
    }
    session.audio_paused_applied = paused;
}

/// Push a changed effective audio speed to the audio output
fn apply_audio_speed(session: &mut PlaybackSession, io: &mut Collaborators<'_>) {
    let speed = session.sync.audio_speed;
    if session.audio_speed_applied == Some(speed) {
        return;
    }
    if let Some(audio) = io.audio.as_deref_mut() {
        trace!(speed, "audio speed changed");
        audio.set_speed(speed);
    }
    session.audio_speed_applied = Some(speed);
}
