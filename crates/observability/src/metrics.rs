//! 帧调度指标收集模块
//!
//! 基于 FrameReport 收集和统计同步核心的运行指标。

use std::fmt;

use contracts::{FrameReport, PlayerEvent};
use metrics::{counter, gauge, histogram};

/// 从 FrameReport 记录指标
///
/// 每次 tick 产生 `Presented` 时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_metrics;
///
/// if let TickOutcome::Presented(report) = outcome {
///     record_frame_metrics(&report);
/// }
/// ```
pub fn record_frame_metrics(report: &FrameReport) {
    counter!("avsync_frames_total").increment(1);

    if let Some(pts) = report.pts {
        gauge!("avsync_last_pts_seconds").set(pts);
    }

    // A/V 差值 (秒 -> 毫秒)
    gauge!("avsync_av_diff_ms").set(report.av_diff * 1000.0);
    histogram!("avsync_av_diff_ms_hist").record(report.av_diff.abs() * 1000.0);

    gauge!("avsync_speed_factor_video").set(report.speed_factor_video);
    gauge!("avsync_speed_factor_audio").set(report.speed_factor_audio);
    histogram!("avsync_frame_duration_ms").record(report.frame_duration * 1000.0);

    if report.display_synced {
        counter!("avsync_display_synced_frames_total").increment(1);
        histogram!("avsync_num_vsyncs").record(report.num_vsyncs as f64);
        gauge!("avsync_display_sync_error_ms").set(report.display_sync_error * 1000.0);
    } else {
        histogram!("avsync_time_frame_ms").record(report.time_frame * 1000.0);
    }

    if report.drop_repeat != 0 {
        let kind = if report.drop_repeat > 0 { "repeat" } else { "drop" };
        counter!("avsync_vsync_corrections_total", "kind" => kind)
            .increment(report.drop_repeat.unsigned_abs() as u64);
    }

    // 累计值直接作为 gauge 导出
    gauge!("avsync_decoder_drops").set(report.decoder_drops as f64);
    gauge!("avsync_mistimed_frames").set(report.mistimed_frames as f64);
}

/// 记录播放器事件
pub fn record_event(event: &PlayerEvent) {
    let name = match event {
        PlayerEvent::VideoReconfig { .. } => "video_reconfig",
        PlayerEvent::Tick => return,
        PlayerEvent::FirstFrameShown => "first_frame_shown",
        PlayerEvent::SyncModeChanged { .. } => "sync_mode_changed",
        PlayerEvent::DesyncWarning { .. } => "desync_warning",
        PlayerEvent::DisplaySyncBroken { .. } => "display_sync_broken",
    };
    counter!("avsync_events_total", "event" => name).increment(1);
}

/// 同步指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// 总帧数
    pub total_frames: u64,

    /// display-sync 调度的帧数
    pub display_synced_frames: u64,

    /// 被插入/删除 vsync 的帧数
    pub corrected_frames: u64,

    /// 解码器丢帧 (最近一次报告)
    pub decoder_drops: u64,

    /// 事件计数
    pub reconfigs: u64,
    pub desync_warnings: u64,
    pub display_sync_breaks: u64,

    /// |A/V 差值| 统计 (毫秒)
    pub av_diff_stats: RunningStats,

    /// 视频速度因子统计
    pub speed_stats: RunningStats,

    /// 平滑帧时长统计 (毫秒)
    pub frame_duration_stats: RunningStats,

    /// vsync 数统计 (仅 display-sync 帧)
    pub vsync_stats: RunningStats,
}

impl SyncMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &FrameReport) {
        self.total_frames += 1;
        self.decoder_drops = report.decoder_drops;

        if report.display_synced {
            self.display_synced_frames += 1;
            self.vsync_stats.push(report.num_vsyncs as f64);
        }
        if report.drop_repeat != 0 {
            self.corrected_frames += 1;
        }

        self.av_diff_stats.push(report.av_diff.abs() * 1000.0);
        self.speed_stats.push(report.speed_factor_video);
        if report.frame_duration > 0.0 {
            self.frame_duration_stats.push(report.frame_duration * 1000.0);
        }
    }

    /// 更新事件计数
    pub fn observe_event(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::VideoReconfig { .. } => self.reconfigs += 1,
            PlayerEvent::DesyncWarning { .. } => self.desync_warnings += 1,
            PlayerEvent::DisplaySyncBroken { .. } => self.display_sync_breaks += 1,
            _ => {}
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            display_synced_frames: self.display_synced_frames,
            corrected_frames: self.corrected_frames,
            decoder_drops: self.decoder_drops,
            reconfigs: self.reconfigs,
            desync_warnings: self.desync_warnings,
            display_sync_breaks: self.display_sync_breaks,
            display_sync_rate: percent(self.display_synced_frames, self.total_frames),
            correction_rate: percent(self.corrected_frames, self.total_frames),
            av_diff_ms: StatsSummary::from(&self.av_diff_stats),
            speed_factor: StatsSummary::from(&self.speed_stats),
            frame_duration_ms: StatsSummary::from(&self.frame_duration_stats),
            num_vsyncs: StatsSummary::from(&self.vsync_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub display_synced_frames: u64,
    pub corrected_frames: u64,
    pub decoder_drops: u64,
    pub reconfigs: u64,
    pub desync_warnings: u64,
    pub display_sync_breaks: u64,
    pub display_sync_rate: f64,
    pub correction_rate: f64,
    pub av_diff_ms: StatsSummary,
    pub speed_factor: StatsSummary,
    pub frame_duration_ms: StatsSummary,
    pub num_vsyncs: StatsSummary,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== A/V Sync Summary ===")?;
        writeln!(f, "Frames presented: {}", self.total_frames)?;
        writeln!(
            f,
            "Display-synced frames: {} ({:.2}%)",
            self.display_synced_frames, self.display_sync_rate
        )?;
        writeln!(
            f,
            "Frames with vsync correction: {} ({:.2}%)",
            self.corrected_frames, self.correction_rate
        )?;
        writeln!(f, "Decoder drops: {}", self.decoder_drops)?;
        writeln!(
            f,
            "Events: reconfig={}, desync_warning={}, display_sync_broken={}",
            self.reconfigs, self.desync_warnings, self.display_sync_breaks
        )?;
        writeln!(f, "|A/V diff| (ms): {}", self.av_diff_ms)?;
        writeln!(f, "Video speed factor: {}", self.speed_factor)?;
        writeln!(f, "Frame duration (ms): {}", self.frame_duration_ms)?;
        writeln!(f, "Vsyncs per frame: {}", self.num_vsyncs)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.4}, max={:.4}, mean={:.4}, std={:.4} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
