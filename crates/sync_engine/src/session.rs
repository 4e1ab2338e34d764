//! Playback session context.
//!
//! All mutable timing state of one playback lives here and is threaded
//! explicitly through [`crate::controller::tick`]. Seeks and timeline
//! discontinuities reset it to a neutral state.

use contracts::{PlaybackStatus, PlayerEvent, SyncOptions, VideoSyncMode};
use tracing::{debug, info};

use crate::history::FrameHistory;
use crate::queue::PendingQueue;
use crate::state::SyncState;
use crate::status::StatusMachine;

/// Timing state of one playback
#[derive(Debug)]
pub struct PlaybackSession {
    pub(crate) options: SyncOptions,
    pub(crate) sync: SyncState,
    pub(crate) history: FrameHistory,
    pub(crate) queue: PendingQueue,
    pub(crate) status: StatusMachine,

    /// PTS of the last frame handed to the output
    pub(crate) video_pts: Option<f64>,
    /// Current playback position
    pub(crate) playback_pts: Option<f64>,
    /// PTS of the last frame queued on the output; survives resets
    pub(crate) last_vo_pts: Option<f64>,
    /// Precise-seek target; earlier frames are skipped while syncing
    pub(crate) hrseek_pts: Option<f64>,
    /// Frames at or after this PTS end playback
    pub(crate) play_end_pts: Option<f64>,
    /// Remaining frames to present before EOF
    pub(crate) max_frames: Option<u64>,
    /// Remaining frames of a frame step; pauses when it reaches 0
    pub(crate) step_frames: u32,

    /// Decoder drop count when the current head frame arrived
    pub(crate) dropped_frames_start: u64,
    /// Frames handed to the output since the session started
    pub(crate) shown_frames: u64,
    /// Clock value of the previous timing update
    pub(crate) last_tick: Option<f64>,
    /// Audio speed last pushed to the audio output
    pub(crate) audio_speed_applied: Option<f64>,
    /// Pause state last pushed to the audio output
    pub(crate) audio_paused_applied: bool,

    events: Vec<PlayerEvent>,
}

impl PlaybackSession {
    pub fn new(options: SyncOptions, has_audio: bool) -> Self {
        Self {
            sync: SyncState::new(options.playback_speed),
            history: FrameHistory::new(),
            queue: PendingQueue::new(options.video_sync != VideoSyncMode::Audio),
            status: StatusMachine::new(has_audio),
            video_pts: None,
            playback_pts: None,
            last_vo_pts: None,
            hrseek_pts: None,
            play_end_pts: None,
            max_frames: None,
            step_frames: 0,
            dropped_frames_start: 0,
            shown_frames: 0,
            last_tick: None,
            audio_speed_applied: None,
            audio_paused_applied: false,
            events: Vec::new(),
            options,
        }
    }

    /// Seek to `target`
    ///
    /// Discards all in-flight timing state. Frames before the target are
    /// decoded but not shown.
    pub fn seek(&mut self, target: f64) {
        info!(target, "seek");
        self.reset_playback();
        self.hrseek_pts = Some(target);
        self.playback_pts = None;
    }

    /// Timeline discontinuity (segment switch, timestamp reset)
    ///
    /// Handled like a seek without a target.
    pub fn signal_discontinuity(&mut self) {
        info!("timeline discontinuity, resetting sync state");
        self.reset_playback();
        self.hrseek_pts = None;
        self.playback_pts = None;
    }

    /// Restart the video stream only (track switch)
    ///
    /// The playback position is kept, so frames before it are skipped until
    /// video catches up.
    pub fn restart_video(&mut self) {
        debug!(playback_pts = ?self.playback_pts, "video restart");
        self.reset_video_state();
        self.status.reset_video();
    }

    fn reset_playback(&mut self) {
        self.reset_video_state();
        self.status.reset();
    }

    fn reset_video_state(&mut self) {
        self.sync = SyncState::new(self.options.playback_speed);
        self.history.clear();
        self.queue.clear();
        self.video_pts = None;
        self.dropped_frames_start = 0;
        self.last_tick = None;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.status.paused = paused;
        if !paused {
            // Time spent paused does not count as elapsed
            self.last_tick = None;
        }
    }

    /// Unpause and present `frames` frames, then pause again
    pub fn frame_step(&mut self, frames: u32) {
        if frames == 0 {
            return;
        }
        self.step_frames = frames;
        self.set_paused(false);
    }

    /// Change the user playback speed and recompute effective speeds
    pub fn set_playback_speed(&mut self, speed: f64) {
        self.options.playback_speed = speed;
        self.sync.update_playback_speed(speed);
    }

    /// End playback at frames with PTS >= `end`
    #[inline]
    pub fn set_play_end(&mut self, end: Option<f64>) {
        self.play_end_pts = end;
    }

    /// Stop after presenting `frames` more frames
    #[inline]
    pub fn set_max_frames(&mut self, frames: Option<u64>) {
        self.max_frames = frames;
    }

    pub(crate) fn emit(&mut self, event: PlayerEvent) {
        self.events.push(event);
    }

    /// Take all events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    #[inline]
    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    #[inline]
    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    #[inline]
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    #[inline]
    pub fn video_status(&self) -> PlaybackStatus {
        self.status.video
    }

    #[inline]
    pub fn audio_status(&self) -> PlaybackStatus {
        self.status.audio
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.status.paused
    }

    #[inline]
    pub fn video_pts(&self) -> Option<f64> {
        self.video_pts
    }

    #[inline]
    pub fn playback_pts(&self) -> Option<f64> {
        self.playback_pts
    }

    #[inline]
    pub fn last_vo_pts(&self) -> Option<f64> {
        self.last_vo_pts
    }

    #[inline]
    pub fn shown_frames(&self) -> u64 {
        self.shown_frames
    }
}
