//! Audio/video status state machine.
//!
//! Video: Syncing -> Ready (first frame shown) -> Playing -> Draining -> Eof.
//! Playback starts only when both streams are at least Ready; a missing
//! audio stream counts as finished.

use contracts::PlaybackStatus;

/// Status of both streams plus the pause flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMachine {
    pub video: PlaybackStatus,
    pub audio: PlaybackStatus,
    pub paused: bool,
    has_audio: bool,
}

impl StatusMachine {
    pub fn new(has_audio: bool) -> Self {
        Self {
            video: PlaybackStatus::Syncing,
            audio: Self::initial_audio(has_audio),
            paused: false,
            has_audio,
        }
    }

    fn initial_audio(has_audio: bool) -> PlaybackStatus {
        if has_audio {
            PlaybackStatus::Syncing
        } else {
            PlaybackStatus::Eof
        }
    }

    #[inline]
    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// Back to Syncing after a seek or stream change; keeps the pause flag
    pub fn reset(&mut self) {
        self.video = PlaybackStatus::Syncing;
        self.audio = Self::initial_audio(self.has_audio);
    }

    /// Reset only the video side (video stream switch)
    pub fn reset_video(&mut self) {
        self.video = PlaybackStatus::Syncing;
    }

    /// Video shows its first frame and waits for audio
    #[inline]
    pub fn should_wait_for_audio(&self) -> bool {
        self.video == PlaybackStatus::Ready && self.audio < PlaybackStatus::Ready
    }

    /// Paused after the first frame was shown: nothing to do
    #[inline]
    pub fn is_paused_idle(&self) -> bool {
        self.paused && self.video >= PlaybackStatus::Ready
    }

    /// Audio buffered enough to start
    pub fn audio_ready(&mut self) {
        if self.audio == PlaybackStatus::Syncing {
            self.audio = PlaybackStatus::Ready;
        }
    }

    /// Start playback if both streams are ready
    ///
    /// Returns true if audio transitioned to Playing and must be started.
    pub fn try_start_playback(&mut self) -> bool {
        if self.video < PlaybackStatus::Ready || self.audio < PlaybackStatus::Ready {
            return false;
        }
        if self.video == PlaybackStatus::Ready {
            self.video = PlaybackStatus::Playing;
        }
        if self.audio == PlaybackStatus::Ready {
            self.audio = PlaybackStatus::Playing;
            return true;
        }
        false
    }

    /// New video data arrived after Draining/Eof
    pub fn video_progress(&mut self) {
        if self.video > PlaybackStatus::Playing {
            self.video = PlaybackStatus::Playing;
        }
    }

    /// Decoder is out of frames
    ///
    /// Draining while the output still presents the last frame, Eof
    /// otherwise. Returns true if the status changed.
    pub fn video_eof(&mut self, still_presenting: bool) -> bool {
        let prev = self.video;
        self.video = if still_presenting {
            PlaybackStatus::Draining
        } else {
            PlaybackStatus::Eof
        };
        prev != self.video
    }

    /// A frame was presented; returns true if it was the first since reset
    pub fn first_frame_shown(&mut self) -> bool {
        if self.video < PlaybackStatus::Playing {
            let first = self.video == PlaybackStatus::Syncing;
            self.video = PlaybackStatus::Ready;
            return first;
        }
        false
    }

    #[inline]
    pub fn both_playing(&self) -> bool {
        self.video == PlaybackStatus::Playing && self.audio == PlaybackStatus::Playing
    }

    #[inline]
    pub fn audio_playing(&self) -> bool {
        self.audio == PlaybackStatus::Playing
    }

    #[inline]
    pub fn video_playing(&self) -> bool {
        self.video == PlaybackStatus::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_with_audio() {
        let mut status = StatusMachine::new(true);
        assert!(!status.try_start_playback());

        assert!(status.first_frame_shown());
        assert_eq!(status.video, PlaybackStatus::Ready);
        assert!(status.should_wait_for_audio());
        assert!(!status.try_start_playback());

        status.audio_ready();
        assert!(!status.should_wait_for_audio());
        assert!(status.try_start_playback());
        assert!(status.both_playing());

        // Already playing: presenting more frames changes nothing
        assert!(!status.first_frame_shown());
        assert_eq!(status.video, PlaybackStatus::Playing);
    }

    #[test]
    fn test_startup_without_audio() {
        let mut status = StatusMachine::new(false);
        assert_eq!(status.audio, PlaybackStatus::Eof);

        status.first_frame_shown();
        assert!(!status.should_wait_for_audio());
        assert!(!status.try_start_playback());
        assert!(status.video_playing());
        assert!(!status.both_playing());
    }

    #[test]
    fn test_eof_and_progress() {
        let mut status = StatusMachine::new(false);
        status.first_frame_shown();
        status.try_start_playback();

        assert!(status.video_eof(true));
        assert_eq!(status.video, PlaybackStatus::Draining);
        assert!(!status.video_eof(true));
        assert!(status.video_eof(false));
        assert_eq!(status.video, PlaybackStatus::Eof);

        status.video_progress();
        assert_eq!(status.video, PlaybackStatus::Playing);
    }

    #[test]
    fn test_pause_and_reset() {
        let mut status = StatusMachine::new(true);
        status.paused = true;
        assert!(!status.is_paused_idle());

        status.first_frame_shown();
        assert!(status.is_paused_idle());

        status.reset();
        assert_eq!(status.video, PlaybackStatus::Syncing);
        assert_eq!(status.audio, PlaybackStatus::Syncing);
        assert!(status.paused);
    }
}
