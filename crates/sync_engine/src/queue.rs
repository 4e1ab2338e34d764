//! Pending frame queue between the filter chain and the video output.
//!
//! Frames are held in decode order. The head is the next frame to present,
//! the rest is lookahead for duration measurement and for outputs that
//! interpolate.

use std::collections::VecDeque;

use contracts::VideoFrame;

/// Maximum number of pending frames
pub const MAX_PENDING: usize = 10;

/// FIFO of decoded frames waiting for presentation
#[derive(Debug, Clone)]
pub struct PendingQueue {
    frames: VecDeque<VideoFrame>,
    /// Lookahead requested by the video output
    requested_lookahead: usize,
    /// No frame has been presented since the last reset
    awaiting_first: bool,
    /// Depth needed before presenting the first frame
    first_frame_depth: usize,
}

impl PendingQueue {
    /// Create a queue
    ///
    /// Modes other than audio sync need two frames before the first
    /// presentation to know the first frame's duration; audio-synced playback
    /// shows the first frame as soon as it exists.
    pub fn new(needs_first_duration: bool) -> Self {
        Self {
            frames: VecDeque::with_capacity(MAX_PENDING),
            requested_lookahead: 1,
            awaiting_first: true,
            first_frame_depth: if needs_first_duration { 2 } else { 1 },
        }
    }

    /// Update the output's requested lookahead and first-frame state
    #[inline]
    pub fn configure(&mut self, requested_lookahead: usize, awaiting_first: bool) {
        self.requested_lookahead = requested_lookahead;
        self.awaiting_first = awaiting_first;
    }

    /// Number of frames needed before the head may be presented
    pub fn required_depth(&self, eof: bool) -> usize {
        if eof {
            return 1;
        }
        if self.awaiting_first {
            return self.first_frame_depth;
        }
        self.requested_lookahead.clamp(2, MAX_PENDING - 1)
    }

    /// Whether another frame may be pushed
    #[inline]
    pub fn needs_frame(&self) -> bool {
        self.frames.len() < self.required_depth(false)
    }

    /// Whether the head may be presented
    #[inline]
    pub fn has_enough(&self, eof: bool) -> bool {
        self.frames.len() >= self.required_depth(eof)
    }

    /// Append a frame
    ///
    /// Returns true if the frame became the head; the caller must then run
    /// new-head handling exactly once.
    ///
    /// # Panics
    /// If the queue does not need a frame. Callers check [`Self::needs_frame`].
    pub fn push(&mut self, frame: VideoFrame) -> bool {
        assert!(
            self.frames.len() < MAX_PENDING && self.needs_frame(),
            "pending frame queue overflow"
        );
        self.frames.push_back(frame);
        self.frames.len() == 1
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<VideoFrame> {
        self.frames.pop_front()
    }

    #[inline]
    pub fn front(&self) -> Option<&VideoFrame> {
        self.frames.front()
    }

    #[inline]
    pub fn get(&self, n: usize) -> Option<&VideoFrame> {
        self.frames.get(n)
    }

    /// Frames, head first
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &VideoFrame> + '_ {
        self.frames.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop all pending frames
    pub fn clear(&mut self) {
        self.frames.clear();
        self.awaiting_first = true;
    }
}
