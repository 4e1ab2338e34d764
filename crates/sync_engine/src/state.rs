//! Per-session synchronization state.

/// Direction the audio is drifting relative to video in display-resample mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriftDirection {
    /// Audio running behind; speed it up
    Negative,
    #[default]
    None,
    /// Audio running ahead; slow it down
    Positive,
}

impl DriftDirection {
    /// Direction from the sign of an A/V difference
    pub fn from_av_diff(av_diff: f64) -> Self {
        if av_diff >= 0.0 {
            DriftDirection::Positive
        } else {
            DriftDirection::Negative
        }
    }

    /// -1, 0 or 1
    pub fn as_f64(self) -> f64 {
        match self {
            DriftDirection::Negative => -1.0,
            DriftDirection::None => 0.0,
            DriftDirection::Positive => 1.0,
        }
    }

    pub fn is_none(self) -> bool {
        self == DriftDirection::None
    }
}

/// Timing state of one playback session
///
/// All times are in seconds. Reset to [`SyncState::new`] on every seek and
/// stream (re)open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncState {
    /// Audio written ahead of the current video frame (audio-sync accumulator)
    pub delay: f64,
    /// Time until the head frame should be shown
    pub time_frame: f64,
    /// Sum of A/V corrections applied by audio-sync
    pub total_avsync_change: f64,
    /// Audio minus video position at the last presented frame
    pub last_av_difference: f64,

    /// Display-sync scheduled the last frame
    pub display_sync_active: bool,
    /// Display-sync gave up for the rest of the session
    pub display_sync_broken: bool,
    /// Accumulated vsync quantization error
    pub display_sync_error: f64,
    pub display_sync_drift_dir: DriftDirection,

    pub speed_factor_audio: f64,
    pub speed_factor_video: f64,
    /// Playback speed times the audio speed factor
    pub audio_speed: f64,
    /// Playback speed times the video speed factor
    pub video_speed: f64,

    /// The A/V desync warning was already shown
    pub desync_warned: bool,
    /// Frames that needed drop/repeat correction
    pub mistimed_frames: u64,

    /// Written audio position seen on the previous tick
    pub audio_written_mark: Option<f64>,
}

impl SyncState {
    /// Neutral state for the given playback speed
    pub fn new(playback_speed: f64) -> Self {
        Self {
            delay: 0.0,
            time_frame: 0.0,
            total_avsync_change: 0.0,
            last_av_difference: 0.0,
            display_sync_active: false,
            display_sync_broken: false,
            display_sync_error: 0.0,
            display_sync_drift_dir: DriftDirection::None,
            speed_factor_audio: 1.0,
            speed_factor_video: 1.0,
            audio_speed: playback_speed,
            video_speed: playback_speed,
            desync_warned: false,
            mistimed_frames: 0,
            audio_written_mark: None,
        }
    }

    /// Recompute effective speeds from the speed factors
    pub fn update_playback_speed(&mut self, playback_speed: f64) {
        self.audio_speed = playback_speed * self.speed_factor_audio;
        self.video_speed = playback_speed * self.speed_factor_video;
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new(1.0)
    }
}
