//! FrameReport / PlayerEvent - Sync core output
//!
//! Per-frame diagnostics and fire-and-forget player notifications.

use serde::{Deserialize, Serialize};

use crate::ImageParams;

/// Diagnostics for one presented frame
///
/// Produced for every frame handed to the video output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Frame PTS (seconds)
    pub pts: Option<f64>,

    /// Presentation deadline handed to the output (seconds)
    pub deadline: f64,

    /// Scheduled by display-sync
    pub display_synced: bool,

    /// Vsyncs the frame is shown for, -1 if not display-synced
    pub num_vsyncs: i32,

    /// Vsyncs added (> 0) or removed (< 0) to correct desync
    pub drop_repeat: i32,

    /// Audio minus video position (seconds)
    pub av_diff: f64,

    /// Accumulated vsync quantization error (seconds)
    pub display_sync_error: f64,

    /// Speed factor applied to video
    pub speed_factor_video: f64,

    /// Speed factor applied to audio
    pub speed_factor_audio: f64,

    /// Smoothed frame duration (seconds)
    pub frame_duration: f64,

    /// Time until the frame should be shown (seconds)
    pub time_frame: f64,

    /// Total frames dropped by the decoder so far
    pub decoder_drops: u64,

    /// Total frames with vsync correction so far
    pub mistimed_frames: u64,
}

/// Player notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Output was reconfigured for new image parameters
    VideoReconfig { params: ImageParams },
    /// A frame was presented
    Tick,
    /// First frame after a reset was presented
    FirstFrameShown,
    /// Display-sync scheduling was enabled or disabled
    SyncModeChanged { active: bool },
    /// A/V desync exceeded the warning threshold
    DesyncWarning { av_diff: f64 },
    /// Display-sync gave up for the rest of the session
    DisplaySyncBroken { av_diff: f64 },
}
