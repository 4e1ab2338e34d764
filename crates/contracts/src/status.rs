//! Playback status shared by the audio and video sides of a session.

use serde::{Deserialize, Serialize};

/// Per-stream playback status
///
/// The order is significant: the core compares statuses (`>= Ready`,
/// `< Playing`), so variants are declared in the order a stream advances.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Seeking / decoding towards the first frame after a reset
    #[default]
    Syncing,
    /// First frame is ready (video: shown), waiting for the other stream
    Ready,
    /// Normal playback
    Playing,
    /// No more input, but the output is still presenting the last frame
    Draining,
    /// Nothing left to present
    Eof,
}

impl PlaybackStatus {
    /// Whether the stream has produced everything it will produce
    pub fn is_finished(self) -> bool {
        self >= PlaybackStatus::Draining
    }
}
