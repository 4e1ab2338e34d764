//! Frame history of recently presented frames.
//!
//! Fixed-capacity ring of [`FrameRecord`]s, newest first. Feeds frame
//! duration smoothing, display-sync speed search and drift regression.
//!
//! Container timestamps are often rounded (e.g. to 1 ms), so raw frame
//! durations jitter. The smoothed `approx_duration` averages the preceding
//! durations that agree with the current one, and snaps to the container's
//! nominal frame duration when everything is consistent with it.

use std::fmt;

use ringbuf::{traits::*, HeapRb};

/// Number of presented frames remembered
pub const HISTORY_CAPACITY: usize = 100;

/// Durations within this distance are considered the same (seconds)
pub const DURATION_TOLERANCE: f64 = 0.0011;

/// One presented frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Frame PTS
    pub pts: Option<f64>,
    /// Raw duration, <= 0 if unknown
    pub duration: f64,
    /// Smoothed duration, <= 0 if unknown
    pub approx_duration: f64,
    /// Vsyncs the frame was shown for, -1 if not display-synced
    pub num_vsyncs: i32,
    /// A/V difference when the frame was scheduled
    pub av_diff: f64,
}

impl FrameRecord {
    pub fn is_display_synced(&self) -> bool {
        self.num_vsyncs >= 0
    }
}

/// History of presented frames, newest first
pub struct FrameHistory {
    records: HeapRb<FrameRecord>,
    nominal_duration: Option<f64>,
}

impl fmt::Debug for FrameHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHistory")
            .field("len", &self.records.occupied_len())
            .field("nominal_duration", &self.nominal_duration)
            .finish()
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHistory {
    #[inline]
    pub fn new() -> Self {
        Self {
            records: HeapRb::new(HISTORY_CAPACITY),
            nominal_duration: None,
        }
    }

    /// Set the container's nominal frame duration (1 / fps)
    #[inline]
    pub fn set_nominal_duration(&mut self, duration: Option<f64>) {
        self.nominal_duration = duration.filter(|d| *d > 0.0);
    }

    #[inline]
    pub fn nominal_duration(&self) -> Option<f64> {
        self.nominal_duration
    }

    /// Record a frame, deriving its duration from the previous frame's PTS
    pub fn record_frame(&mut self, pts: Option<f64>) -> FrameRecord {
        let duration = match (self.latest().and_then(|r| r.pts), pts) {
            (Some(prev), Some(cur)) if cur > prev => Some(cur - prev),
            _ => None,
        };
        self.record_frame_with_duration(pts, duration)
    }

    /// Record a frame with a known raw duration
    ///
    /// Evicts the oldest record when full.
    pub fn record_frame_with_duration(
        &mut self,
        pts: Option<f64>,
        duration: Option<f64>,
    ) -> FrameRecord {
        let duration = duration.filter(|d| *d >= 0.0).unwrap_or(-1.0);

        // Average the run of preceding durations that agree with this one
        let mut total = 0.0;
        let mut count = 0usize;
        for prev in self.iter() {
            if prev.duration <= 0.0 || (prev.duration - duration).abs() >= DURATION_TOLERANCE {
                break;
            }
            total += prev.duration;
            count += 1;
        }
        let mut approx_duration = if count > 0 {
            total / count as f64
        } else {
            duration
        };

        // Rounded timestamps can each be within tolerance and still not add
        // up to the nominal rate, so check the sum as well
        if let Some(nominal) = self.nominal_duration {
            if (duration - nominal).abs() < DURATION_TOLERANCE
                && (total - nominal * count as f64).abs() < DURATION_TOLERANCE
            {
                approx_duration = nominal;
            }
        }

        let record = FrameRecord {
            pts,
            duration,
            approx_duration,
            num_vsyncs: -1,
            av_diff: 0.0,
        };

        if self.records.is_full() {
            let _ = self.records.try_pop();
        }
        let _ = self.records.try_push(record);

        record
    }

    /// Mean of all known smoothed durations, 0 if none
    pub fn average_duration(&self) -> f64 {
        let (total, count) = self
            .iter()
            .filter(|r| r.approx_duration > 0.0)
            .fold((0.0, 0usize), |(total, count), r| {
                (total + r.approx_duration, count + 1)
            });
        if count > 0 {
            total / count as f64
        } else {
            0.0
        }
    }

    /// Records, newest first
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> + '_ {
        self.records.iter().rev()
    }

    /// Record `n` frames back (0 = newest)
    #[inline]
    pub fn get(&self, n: usize) -> Option<&FrameRecord> {
        self.iter().nth(n)
    }

    #[inline]
    pub fn latest(&self) -> Option<&FrameRecord> {
        self.get(0)
    }

    #[inline]
    pub fn latest_mut(&mut self) -> Option<&mut FrameRecord> {
        self.records.iter_mut().next_back()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget all records (seek, stream change)
    pub fn clear(&mut self) {
        while self.records.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const NTSC_FILM: f64 = 1001.0 / 24000.0;

    fn round_ms(t: f64) -> f64 {
        (t * 1000.0).round() / 1000.0
    }

    #[test]
    fn test_record_frame_derives_duration() {
        let mut history = FrameHistory::new();

        let first = history.record_frame(Some(1.0));
        assert_eq!(first.duration, -1.0);
        assert_eq!(first.num_vsyncs, -1);

        let second = history.record_frame(Some(1.04));
        assert!((second.duration - 0.04).abs() < 1e-12);
        assert_eq!(history.latest().unwrap().pts, Some(1.04));
        assert_eq!(history.get(1).unwrap().pts, Some(1.0));
    }

    #[test]
    fn test_backwards_pts_has_unknown_duration() {
        let mut history = FrameHistory::new();
        history.record_frame(Some(2.0));
        history.record_frame(Some(2.04));
        let record = history.record_frame(Some(0.5));

        assert!(record.duration <= 0.0);
        assert!(record.approx_duration <= 0.0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = FrameHistory::new();
        for n in 0..150 {
            history.record_frame(Some(n as f64 * 0.04));
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.latest().unwrap().pts, Some(149.0 * 0.04));
        let oldest = history.iter().last().unwrap();
        assert_eq!(oldest.pts, Some(50.0 * 0.04));
    }

    #[test]
    fn test_rounded_timestamps_snap_to_nominal() {
        let mut history = FrameHistory::new();
        history.set_nominal_duration(Some(NTSC_FILM));

        for n in 0..60 {
            let pts = round_ms(n as f64 * NTSC_FILM);
            let next = round_ms((n + 1) as f64 * NTSC_FILM);
            history.record_frame_with_duration(Some(pts), Some(next - pts));
        }

        for record in history.iter().take(50) {
            assert_eq!(record.approx_duration, NTSC_FILM);
        }
    }

    #[test]
    fn test_rounded_timestamps_without_nominal_converge() {
        let mut history = FrameHistory::new();

        for n in 0..100 {
            let pts = round_ms(n as f64 * NTSC_FILM);
            let next = round_ms((n + 1) as f64 * NTSC_FILM);
            history.record_frame_with_duration(Some(pts), Some(next - pts));
        }

        // Raw durations alternate between 41 and 42 ms
        let latest = history.latest().unwrap();
        assert!((latest.approx_duration - NTSC_FILM).abs() < 0.0005);
        assert!((history.average_duration() - NTSC_FILM).abs() < 0.0005);
    }

    #[test]
    fn test_noisy_timestamps_average_converges() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut history = FrameHistory::new();
        let frame = 1.0 / 30.0;

        let mut prev = 0.0;
        for n in 1..=100 {
            let pts = n as f64 * frame + rng.random_range(-0.0002..0.0002);
            history.record_frame_with_duration(Some(prev), Some(pts - prev));
            prev = pts;
        }

        // Jitter stays inside the tolerance, so every run spans the history
        let latest = history.latest().unwrap();
        assert!((latest.approx_duration - frame).abs() < 0.00001);
        assert!((history.average_duration() - frame).abs() < 0.0001);
    }

    #[test]
    fn test_outlier_breaks_averaging_run() {
        let mut history = FrameHistory::new();
        history.record_frame_with_duration(Some(0.0), Some(0.040));
        history.record_frame_with_duration(Some(0.04), Some(0.040));
        let record = history.record_frame_with_duration(Some(0.08), Some(0.100));

        assert_eq!(record.approx_duration, 0.100);
    }

    #[test]
    fn test_average_duration_ignores_unknown() {
        let mut history = FrameHistory::new();
        assert_eq!(history.average_duration(), 0.0);

        history.record_frame_with_duration(Some(0.0), None);
        history.record_frame_with_duration(Some(0.04), Some(0.04));
        assert!((history.average_duration() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_latest_mut_and_clear() {
        let mut history = FrameHistory::new();
        history.record_frame(Some(0.0));
        history.record_frame(Some(0.04));

        let latest = history.latest_mut().unwrap();
        latest.num_vsyncs = 2;
        latest.av_diff = 0.003;

        assert_eq!(history.latest().unwrap().num_vsyncs, 2);
        assert_eq!(history.get(1).unwrap().num_vsyncs, -1);

        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
