//! Sync option contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

/// Video sync mode
///
/// `Audio` times video against the audio clock. The `Display*` modes lock
/// frame boundaries to the display refresh and compensate the remaining
/// error by resampling audio, dropping/repeating video, or not at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoSyncMode {
    /// Video follows the audio clock
    #[default]
    Audio,
    /// Display-synced, audio resampled to track video
    DisplayResample,
    /// Display-synced, audio resampled, video drop/repeat for larger errors
    DisplayResampleVdrop,
    /// Display-synced with speed change, no compensation at all
    DisplayResampleDesync,
    /// Display-synced, audio samples dropped/duplicated
    DisplayAdrop,
    /// Display-synced, video frames dropped/repeated
    DisplayVdrop,
    /// Display-synced, no compensation
    DisplayDesync,
    /// No sync at all, video runs by its own timestamps
    Desync,
}

impl VideoSyncMode {
    /// All modes, in option order
    pub const ALL: [VideoSyncMode; 8] = [
        VideoSyncMode::Audio,
        VideoSyncMode::DisplayResample,
        VideoSyncMode::DisplayResampleVdrop,
        VideoSyncMode::DisplayResampleDesync,
        VideoSyncMode::DisplayAdrop,
        VideoSyncMode::DisplayVdrop,
        VideoSyncMode::DisplayDesync,
        VideoSyncMode::Desync,
    ];

    /// Whether the mode schedules frames by display vsync
    pub fn is_display(self) -> bool {
        !matches!(self, VideoSyncMode::Audio | VideoSyncMode::Desync)
    }

    /// Whether the mode changes playback speed by resampling audio
    pub fn resamples_audio(self) -> bool {
        matches!(
            self,
            VideoSyncMode::DisplayResample
                | VideoSyncMode::DisplayResampleVdrop
                | VideoSyncMode::DisplayResampleDesync
        )
    }

    /// Whether the mode may drop or repeat video frames to correct desync
    ///
    /// The adrop mode is included: without an audio filter that drops
    /// samples, video correction is the fallback.
    pub fn drops_video(self) -> bool {
        matches!(
            self,
            VideoSyncMode::DisplayVdrop
                | VideoSyncMode::DisplayResample
                | VideoSyncMode::DisplayAdrop
                | VideoSyncMode::DisplayResampleVdrop
        )
    }

    /// Option name
    pub fn as_str(self) -> &'static str {
        match self {
            VideoSyncMode::Audio => "audio",
            VideoSyncMode::DisplayResample => "display-resample",
            VideoSyncMode::DisplayResampleVdrop => "display-resample-vdrop",
            VideoSyncMode::DisplayResampleDesync => "display-resample-desync",
            VideoSyncMode::DisplayAdrop => "display-adrop",
            VideoSyncMode::DisplayVdrop => "display-vdrop",
            VideoSyncMode::DisplayDesync => "display-desync",
            VideoSyncMode::Desync => "desync",
        }
    }
}

impl std::fmt::Display for VideoSyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VideoSyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoSyncMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown video sync mode: {s}"))
    }
}

/// Frame dropping permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDropping {
    /// Output side may drop (or repeat) frames
    #[serde(default = "default_true")]
    pub vo: bool,
    /// Decoder may skip frames when video falls behind
    #[serde(default)]
    pub decoder: bool,
}

impl Default for FrameDropping {
    fn default() -> Self {
        Self {
            vo: true,
            decoder: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Sync options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Video sync mode
    pub video_sync: VideoSyncMode,

    /// Maximum speed change for display-sync, in percent
    pub sync_max_video_change: f64,

    /// Maximum additional audio speed change for drift compensation, in percent
    pub sync_max_audio_change: f64,

    /// Audio delay relative to video (seconds)
    pub audio_delay: f64,

    /// Maximum A/V correction per frame (seconds), `None` = 10% of frame time
    pub max_pts_correction: Option<f64>,

    /// Smooth audio output delay over this many frames (0 = off)
    pub autosync: u32,

    /// User playback speed
    pub playback_speed: f64,

    /// Frame dropping permissions
    pub frame_dropping: FrameDropping,

    /// Present frames as fast as possible
    pub untimed: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            video_sync: VideoSyncMode::Audio,
            sync_max_video_change: 1.0,
            sync_max_audio_change: 0.125,
            audio_delay: 0.0,
            max_pts_correction: None,
            autosync: 0,
            playback_speed: 1.0,
            frame_dropping: FrameDropping::default(),
            untimed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_classification() {
        assert!(!VideoSyncMode::Audio.is_display());
        assert!(!VideoSyncMode::Desync.is_display());
        assert!(VideoSyncMode::DisplayDesync.is_display());

        assert!(VideoSyncMode::DisplayResampleDesync.resamples_audio());
        assert!(!VideoSyncMode::DisplayResampleDesync.drops_video());
        assert!(VideoSyncMode::DisplayAdrop.drops_video());
        assert!(!VideoSyncMode::DisplayAdrop.resamples_audio());
    }

    #[test]
    fn test_mode_names_roundtrip() {
        for mode in VideoSyncMode::ALL {
            assert_eq!(mode.as_str().parse::<VideoSyncMode>().unwrap(), mode);
        }
        assert!("display-bogus".parse::<VideoSyncMode>().is_err());
    }

    #[test]
    fn test_options_from_partial_toml() {
        let opts: SyncOptions = toml::from_str(
            r#"
            video_sync = "display-resample"
            [frame_dropping]
            decoder = true
            "#,
        )
        .unwrap();

        assert_eq!(opts.video_sync, VideoSyncMode::DisplayResample);
        assert_eq!(opts.sync_max_video_change, 1.0);
        assert_eq!(opts.sync_max_audio_change, 0.125);
        assert!(opts.frame_dropping.vo);
        assert!(opts.frame_dropping.decoder);
        assert!(opts.max_pts_correction.is_none());
    }
}
