//! Deterministic playback simulation.
//!
//! Virtual-time implementations of the collaborator traits and an event loop
//! driving [`tick`]. Used by the CLI and by scenario tests.
//!
//! - [`MockFrameSource`]: constant frame rate, optional timestamp rounding
//! - [`MockDisplay`]: vsync clock, honors `num_vsyncs` and deadlines
//! - [`MockAudioClock`]: audio clock with drift and resample speed
//! - [`Simulation`]: ticks the controller and advances virtual time

use std::fmt;

use bytes::Bytes;
use contracts::{
    AudioClock, ContractError, DecodeRequest, DecodeStatus, FrameDeadline, FrameReport,
    FrameSource, ImageParams, NoSubtitles, PixelFormat, PlaybackConfig, PlayerEvent, VideoFrame,
    VideoOutput, VoFrame,
};
use tracing::{debug, info};

use crate::controller::{tick, Collaborators, TickOutcome};
use crate::session::PlaybackSession;

/// Consecutive `Again` outcomes before the simulation is considered stuck
const MAX_STALLS: u32 = 10_000;

/// Ticks allowed per presented frame before giving up
const MAX_TICKS_PER_FRAME: usize = 100_000;

/// Slack when mapping times onto vsync indices
const VSYNC_EPSILON: f64 = 1e-9;

/// Frames handed to the output too early are held back (seconds)
const EARLY_QUEUE_LIMIT: f64 = 0.050;

/// Keyframe distance emulated by seeks, in frames
const SEEK_PREROLL_FRAMES: u64 = 2;

// ============ Frame source ============

/// Decoder producing frames at a constant rate
#[derive(Debug, Clone)]
pub struct MockFrameSource {
    fps: f64,
    total_frames: u64,
    rounding_ms: u32,
    params: ImageParams,
    payload: Bytes,
    next_index: u64,
    output: Option<VideoFrame>,
    dropped: u64,
    fail_at: Option<u64>,
    last_request: DecodeRequest,
}

impl MockFrameSource {
    pub fn new(fps: f64, total_frames: u64) -> Self {
        let params = ImageParams {
            format: PixelFormat::Yuv420p,
            width: 64,
            height: 36,
        };
        Self {
            fps,
            total_frames,
            rounding_ms: 0,
            params,
            payload: Bytes::from_static(&[0u8; 16]),
            next_index: 0,
            output: None,
            dropped: 0,
            fail_at: None,
            last_request: DecodeRequest::default(),
        }
    }

    /// Round timestamps to multiples of `ms` milliseconds (0 = exact)
    pub fn with_rounding_ms(mut self, ms: u32) -> Self {
        self.rounding_ms = ms;
        self
    }

    pub fn with_params(mut self, params: ImageParams) -> Self {
        self.params = params;
        self
    }

    /// PTS of frame `index`
    pub fn pts_of(&self, index: u64) -> f64 {
        let pts = index as f64 / self.fps;
        if self.rounding_ms == 0 {
            return pts;
        }
        let step_ms = self.rounding_ms as f64;
        (pts * 1000.0 / step_ms).round() * step_ms / 1000.0
    }

    /// Restart decoding shortly before `target`
    pub fn seek(&mut self, target: f64) {
        let index = (target.max(0.0) * self.fps + VSYNC_EPSILON).floor() as u64;
        self.next_index = index.saturating_sub(SEEK_PREROLL_FRAMES);
        self.output = None;
    }

    /// Fail decoding when frame `index` is reached
    pub fn fail_at(&mut self, index: u64) {
        self.fail_at = Some(index);
    }

    /// Switch image parameters for all following frames
    pub fn set_params(&mut self, params: ImageParams) {
        self.params = params;
    }

    pub fn set_dropped(&mut self, dropped: u64) {
        self.dropped = dropped;
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[inline]
    pub fn last_request(&self) -> DecodeRequest {
        self.last_request
    }
}

impl FrameSource for MockFrameSource {
    fn decode_and_filter(
        &mut self,
        request: DecodeRequest,
    ) -> Result<DecodeStatus, ContractError> {
        self.last_request = request;

        if self.output.is_some() {
            return Ok(DecodeStatus::Progress);
        }
        if self.fail_at == Some(self.next_index) {
            return Err(ContractError::decode(format!(
                "corrupt packet at frame {}",
                self.next_index
            )));
        }
        if self.next_index >= self.total_frames {
            return Ok(DecodeStatus::Eof);
        }

        let index = self.next_index;
        self.next_index += 1;

        if request.allow_framedrop {
            self.dropped += 1;
            return Ok(DecodeStatus::Progress);
        }

        self.output = Some(VideoFrame::new(
            Some(self.pts_of(index)),
            self.params,
            self.payload.clone(),
        ));
        Ok(DecodeStatus::Progress)
    }

    fn read_output_frame(&mut self) -> Option<VideoFrame> {
        self.output.take()
    }

    fn needs_input(&self) -> bool {
        false
    }

    fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn container_fps(&self) -> Option<f64> {
        Some(self.fps)
    }
}

// ============ Display ============

/// One frame as seen by the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentedFrame {
    pub pts: Option<f64>,
    /// Vsync index the frame became visible at
    pub start_vsync: u64,
    /// Vsyncs shown; 0 for a dropped display-synced frame
    pub num_vsyncs: u32,
    pub display_synced: bool,
    pub still: bool,
}

/// Display with a virtual vsync clock
///
/// Holds at most one frame waiting for its vsync. Display-synced frames are
/// shown for exactly `num_vsyncs` refreshes; timed frames at the first vsync
/// at or after their deadline.
#[derive(Debug, Clone)]
pub struct MockDisplay {
    vsync: f64,
    lookahead: usize,
    untimed: bool,
    params: Option<ImageParams>,
    fail_reconfig: bool,
    reconfigs: u32,
    now: f64,
    /// First vsync a newly queued frame can become visible at
    next_slot: u64,
    /// End of the current frame's display
    visible_until: f64,
    presented: Vec<PresentedFrame>,
}

impl MockDisplay {
    pub fn new(vsync: f64, lookahead: usize) -> Self {
        Self {
            vsync,
            lookahead,
            untimed: false,
            params: None,
            fail_reconfig: false,
            reconfigs: 0,
            now: 0.0,
            next_slot: 0,
            visible_until: 0.0,
            presented: Vec::new(),
        }
    }

    pub fn with_untimed(mut self, untimed: bool) -> Self {
        self.untimed = untimed;
        self
    }

    /// Make the next reconfiguration fail
    pub fn fail_reconfig(&mut self, fail: bool) {
        self.fail_reconfig = fail;
    }

    #[inline]
    pub fn set_time(&mut self, now: f64) {
        self.now = now;
    }

    /// Drop queued frames (seek)
    pub fn reset(&mut self) {
        self.next_slot = 0;
        self.visible_until = 0.0;
    }

    /// Index of the latest vsync at or before `now`
    #[inline]
    fn current_vsync(&self) -> u64 {
        (self.now / self.vsync + VSYNC_EPSILON).floor().max(0.0) as u64
    }

    #[inline]
    fn earliest_slot(&self) -> u64 {
        self.next_slot.max(self.current_vsync() + 1)
    }

    /// Time of vsync `index`
    #[inline]
    pub fn vsync_time(&self, index: u64) -> f64 {
        index as f64 * self.vsync
    }

    #[inline]
    pub fn presented(&self) -> &[PresentedFrame] {
        &self.presented
    }

    #[inline]
    pub fn reconfig_count(&self) -> u32 {
        self.reconfigs
    }
}

impl VideoOutput for MockDisplay {
    fn vsync_interval(&self) -> Option<f64> {
        Some(self.vsync)
    }

    fn requested_lookahead(&self) -> usize {
        self.lookahead
    }

    fn params(&self) -> Option<ImageParams> {
        self.params
    }

    fn reconfigure(&mut self, params: &ImageParams) -> Result<(), ContractError> {
        if self.fail_reconfig {
            return Err(ContractError::output_reconfig(
                params.width,
                params.height,
                format!("unsupported format {:?}", params.format),
            ));
        }
        self.params = Some(*params);
        self.reconfigs += 1;
        self.visible_until = self.now;
        Ok(())
    }

    fn still_displaying(&self) -> bool {
        self.now + VSYNC_EPSILON < self.visible_until
    }

    fn is_ready_for(&self, deadline: FrameDeadline) -> bool {
        if self.params.is_none() || self.next_slot > self.current_vsync() + 1 {
            return false;
        }
        match deadline {
            FrameDeadline::NextVsync => true,
            FrameDeadline::PresentAt(t) => self.untimed || t - EARLY_QUEUE_LIMIT <= self.now,
        }
    }

    fn queue_frame(&mut self, frame: VoFrame) {
        let earliest = self.earliest_slot();
        let pts = frame.current().and_then(|f| f.pts);

        let (start, num_vsyncs) = if frame.display_synced {
            (earliest, frame.num_vsyncs)
        } else if self.untimed {
            (earliest, 1)
        } else {
            let due = (frame.pts / self.vsync - VSYNC_EPSILON).ceil().max(0.0) as u64;
            (earliest.max(due), 1)
        };

        if num_vsyncs > 0 {
            self.next_slot = start + num_vsyncs as u64;
            let mut end = self.vsync_time(self.next_slot);
            if !frame.display_synced {
                if let Some(duration) = frame.duration {
                    end = end.max(self.vsync_time(start) + duration);
                }
            }
            self.visible_until = end;
        }

        self.presented.push(PresentedFrame {
            pts,
            start_vsync: start,
            num_vsyncs,
            display_synced: frame.display_synced,
            still: frame.still,
        });
    }

    fn delay(&self) -> f64 {
        self.vsync_time(self.earliest_slot()) - self.now
    }

    fn is_untimed(&self) -> bool {
        self.untimed
    }
}

// ============ Audio ============

/// Audio output clock with a fixed device buffer
///
/// The hardware clock runs `drift_ppm` parts per million fast, so the
/// audio position slowly runs away from an ideal clock.
#[derive(Debug, Clone)]
pub struct MockAudioClock {
    buffer: f64,
    drift: f64,
    speed: f64,
    now: f64,
    anchor_time: f64,
    anchor_pts: f64,
    playing: bool,
    paused: bool,
    passthrough: bool,
    speed_changes: u64,
}

impl MockAudioClock {
    /// `buffer` in seconds, `drift_ppm` in parts per million
    pub fn new(buffer: f64, drift_ppm: f64) -> Self {
        Self {
            buffer,
            drift: drift_ppm * 1e-6,
            speed: 1.0,
            now: 0.0,
            anchor_time: 0.0,
            anchor_pts: 0.0,
            playing: false,
            paused: false,
            passthrough: false,
            speed_changes: 0,
        }
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    #[inline]
    pub fn set_time(&mut self, now: f64) {
        self.now = now;
    }

    /// Stop and rewind to `pts` (seek)
    pub fn reset(&mut self, pts: f64) {
        self.playing = false;
        self.anchor_pts = pts;
        self.anchor_time = self.now;
    }

    /// Start position for the next [`AudioClock::start`]
    pub fn align_start(&mut self, pts: f64) {
        if !self.playing {
            self.anchor_pts = pts;
        }
    }

    /// Jump the audio position forward (dropped audio, device hiccup)
    pub fn skip(&mut self, offset: f64) {
        self.anchor_pts += offset;
    }

    /// PTS of the audio currently heard
    pub fn playing_pts(&self) -> f64 {
        if !self.playing || self.paused {
            return self.anchor_pts;
        }
        self.anchor_pts + (self.now - self.anchor_time) * self.speed * (1.0 + self.drift)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[inline]
    pub fn speed_changes(&self) -> u64 {
        self.speed_changes
    }
}

impl AudioClock for MockAudioClock {
    fn is_ready(&self) -> bool {
        true
    }

    fn start(&mut self) {
        self.anchor_time = self.now;
        self.playing = true;
    }

    fn set_paused(&mut self, paused: bool) {
        self.anchor_pts = self.playing_pts();
        self.anchor_time = self.now;
        self.paused = paused;
    }

    fn written_pts(&self) -> Option<f64> {
        Some(self.playing_pts() + self.buffer * self.speed)
    }

    fn output_delay(&self) -> f64 {
        self.buffer
    }

    fn is_untimed(&self) -> bool {
        false
    }

    fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    fn set_speed(&mut self, speed: f64) {
        self.anchor_pts = self.playing_pts();
        self.anchor_time = self.now;
        self.speed = speed;
        self.speed_changes += 1;
    }
}

// ============ Simulation ============

/// Virtual-time playback of a [`PlaybackConfig`]
pub struct Simulation {
    session: PlaybackSession,
    source: MockFrameSource,
    display: MockDisplay,
    audio: Option<MockAudioClock>,
    subtitles: NoSubtitles,
    vsync: f64,
    now: f64,
    stalls: u32,
    finished: bool,
    reports: Vec<FrameReport>,
    events: Vec<PlayerEvent>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.now)
            .field("status", &self.session.video_status())
            .field("reports", &self.reports.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl Simulation {
    pub fn new(config: &PlaybackConfig) -> Self {
        let media = &config.media;
        let source = MockFrameSource::new(media.fps, config.total_frames())
            .with_rounding_ms(media.timestamp_rounding_ms)
            .with_params(ImageParams {
                format: media.format,
                width: media.width,
                height: media.height,
            });
        let display = MockDisplay::new(config.vsync_interval(), config.display.lookahead)
            .with_untimed(config.display.untimed);
        let audio = media
            .audio
            .then(|| MockAudioClock::new(media.audio_buffer_ms / 1000.0, media.audio_drift_ppm));

        info!(
            fps = media.fps,
            refresh_rate = config.display.refresh_rate_hz,
            mode = %config.sync.video_sync,
            frames = config.total_frames(),
            audio = media.audio,
            "simulation created"
        );

        Self {
            session: PlaybackSession::new(config.effective_sync_options(), media.audio),
            source,
            display,
            audio,
            subtitles: NoSubtitles,
            vsync: config.vsync_interval(),
            now: 0.0,
            stalls: 0,
            finished: false,
            reports: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Run one controller tick and advance virtual time
    pub fn step(&mut self) -> Result<TickOutcome, ContractError> {
        self.sync_clocks();

        let mut io = Collaborators {
            source: &mut self.source,
            output: &mut self.display,
            audio: self
                .audio
                .as_mut()
                .map(|audio| audio as &mut dyn AudioClock),
            subtitles: &self.subtitles,
        };
        let outcome = tick(&mut self.session, &mut io, self.now)?;

        match outcome {
            TickOutcome::Again => {
                self.stalls += 1;
                if self.stalls > MAX_STALLS {
                    return Err(ContractError::Other(format!(
                        "simulation stalled at t={:.3}",
                        self.now
                    )));
                }
            }
            TickOutcome::Presented(report) => {
                self.stalls = 0;
                self.reports.push(report);
                self.collect_events(&report);
            }
            TickOutcome::Wait | TickOutcome::Idle => {
                self.stalls = 0;
                self.advance_vsync();
            }
            TickOutcome::Eof => {
                self.finished = true;
                debug!(now = self.now, frames = self.reports.len(), "simulation finished");
            }
        }
        Ok(outcome)
    }

    /// Run until `frames` more frames were presented, playback ended or
    /// playback is paused
    pub fn run_frames(&mut self, frames: usize) -> Result<&[FrameReport], ContractError> {
        let start = self.reports.len();
        let target = start + frames;
        let mut ticks = 0usize;

        while self.reports.len() < target && !self.finished {
            if self.step()? == TickOutcome::Idle {
                break;
            }
            ticks += 1;
            if ticks > MAX_TICKS_PER_FRAME * frames.max(1) {
                return Err(ContractError::Other(format!(
                    "simulation made no progress at t={:.3}",
                    self.now
                )));
            }
        }
        Ok(&self.reports[start..])
    }

    /// Run until EOF or pause
    pub fn run_to_end(&mut self) -> Result<&[FrameReport], ContractError> {
        let remaining = self.source.total_frames.max(1) as usize;
        self.run_frames(remaining + 1)
    }

    /// Seek all components to `target`
    pub fn seek(&mut self, target: f64) {
        self.session.seek(target);
        self.source.seek(target);
        self.display.reset();
        if let Some(audio) = self.audio.as_mut() {
            audio.reset(target);
        }
        self.finished = false;
    }

    fn sync_clocks(&mut self) {
        self.display.set_time(self.now);
        if let Some(audio) = self.audio.as_mut() {
            audio.set_time(self.now);
        }
    }

    fn advance_vsync(&mut self) {
        let index = (self.now / self.vsync + VSYNC_EPSILON).floor() + 1.0;
        self.now = index * self.vsync;
    }

    fn collect_events(&mut self, report: &FrameReport) {
        for event in self.session.drain_events() {
            if event == PlayerEvent::FirstFrameShown {
                self.wait_first_frame(report);
            }
            self.events.push(event);
        }
    }

    /// Wait until the first frame after a restart is visible, then line up
    /// audio with it
    fn wait_first_frame(&mut self, report: &FrameReport) {
        if let Some(shown) = self.display.presented().last() {
            let visible_at = self.display.vsync_time(shown.start_vsync);
            if visible_at > self.now {
                self.now = visible_at;
            }
        }
        if let (Some(audio), Some(pts)) = (self.audio.as_mut(), report.pts) {
            audio.align_start(pts);
        }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn reports(&self) -> &[FrameReport] {
        &self.reports
    }

    #[inline]
    pub fn events(&self) -> &[PlayerEvent] {
        &self.events
    }

    #[inline]
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    #[inline]
    pub fn session_mut(&mut self) -> &mut PlaybackSession {
        &mut self.session
    }

    #[inline]
    pub fn source(&self) -> &MockFrameSource {
        &self.source
    }

    #[inline]
    pub fn source_mut(&mut self) -> &mut MockFrameSource {
        &mut self.source
    }

    #[inline]
    pub fn display(&self) -> &MockDisplay {
        &self.display
    }

    #[inline]
    pub fn display_mut(&mut self) -> &mut MockDisplay {
        &mut self.display
    }

    #[inline]
    pub fn audio(&self) -> Option<&MockAudioClock> {
        self.audio.as_ref()
    }

    #[inline]
    pub fn audio_mut(&mut self) -> Option<&mut MockAudioClock> {
        self.audio.as_mut()
    }
}
