//! Collaborator traits - interfaces the sync core drives
//!
//! The core never blocks on a collaborator: every call either makes progress
//! or reports that the caller should come back later. All calls happen on the
//! playback thread, so the traits carry no `Send` bound.

use crate::{ContractError, FrameDeadline, ImageParams, VideoFrame, VoFrame};

/// Outcome of one decode+filter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Work was done; calling again will eventually produce a frame
    Progress,
    /// Nothing to do until more input arrives
    Wait,
    /// No more frames will be produced
    Eof,
}

/// Hints passed to the decoder for one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeRequest {
    /// Decoder may skip frames to catch up
    pub allow_framedrop: bool,
    /// Frames before this PTS may be skipped without output (precise seek)
    pub start_pts: Option<f64>,
}

/// Decode + filter pipeline
pub trait FrameSource {
    /// Run one decode/filter step
    ///
    /// # Errors
    /// Hard decoder or filter failure; the video chain must be torn down.
    fn decode_and_filter(&mut self, request: DecodeRequest)
        -> Result<DecodeStatus, ContractError>;

    /// Take the next filtered frame, if one is available
    fn read_output_frame(&mut self) -> Option<VideoFrame>;

    /// Filter chain wants more input (asynchronous filters)
    fn needs_input(&self) -> bool;

    /// Total frames skipped by the decoder so far
    fn dropped_frames(&self) -> u64;

    /// Nominal frame rate reported by the container
    fn container_fps(&self) -> Option<f64>;
}

/// Video output (display)
pub trait VideoOutput {
    /// Display refresh interval in seconds, `None` if unknown
    fn vsync_interval(&self) -> Option<f64>;

    /// Number of frames the output wants to see ahead (interpolation etc.)
    fn requested_lookahead(&self) -> usize;

    /// Currently configured image parameters
    fn params(&self) -> Option<ImageParams>;

    /// Reconfigure for new image parameters; drops the current frame
    ///
    /// # Errors
    /// The output cannot display this format.
    fn reconfigure(&mut self, params: &ImageParams) -> Result<(), ContractError>;

    /// A frame is queued or still on screen for its full duration
    fn still_displaying(&self) -> bool;

    /// Output can accept a frame for this deadline now
    fn is_ready_for(&self, deadline: FrameDeadline) -> bool;

    /// Queue a frame for presentation
    fn queue_frame(&mut self, frame: VoFrame);

    /// Time until the currently queued display-synced frame ends (seconds)
    fn delay(&self) -> f64;

    /// Output presents frames immediately, ignoring deadlines
    fn is_untimed(&self) -> bool;
}

/// Audio output clock
pub trait AudioClock {
    /// Enough audio is buffered to start playback
    fn is_ready(&self) -> bool;

    /// Start playing the buffered audio
    fn start(&mut self);

    /// Pause or resume the device; the clock stands still while paused
    fn set_paused(&mut self, paused: bool);

    /// PTS at the end of all audio written to the device
    fn written_pts(&self) -> Option<f64>;

    /// Audio buffered in the device, in seconds of real time
    fn output_delay(&self) -> f64;

    /// Audio output does not play in real time
    fn is_untimed(&self) -> bool;

    /// Compressed passthrough (cannot be resampled)
    fn is_passthrough(&self) -> bool;

    /// Set the effective audio speed (playback speed times resample factor)
    fn set_speed(&mut self, speed: f64);
}

/// Subtitle renderer readiness
pub trait SubtitleGate {
    /// Subtitles for this video PTS are ready to be shown
    fn ready_for_pts(&self, pts: Option<f64>) -> bool;
}

/// Subtitle gate for sessions without subtitles
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSubtitles;

impl SubtitleGate for NoSubtitles {
    fn ready_for_pts(&self, _pts: Option<f64>) -> bool {
        true
    }
}
