//! PlaybackConfig - Config Loader 输出
//!
//! 描述一次模拟播放：同步选项、显示设备、媒体流参数。

use serde::{Deserialize, Serialize};

use crate::{PixelFormat, SyncOptions};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的播放配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 同步选项
    #[serde(default)]
    pub sync: SyncOptions,

    /// 显示设备
    #[serde(default)]
    pub display: DisplayConfig,

    /// 媒体流
    pub media: MediaConfig,
}

/// 显示设备配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// 刷新率 (Hz)，必须 > 0
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate_hz: f64,

    /// 输出端请求的前瞻帧数
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    /// 输出端不计时 (尽快显示)
    #[serde(default)]
    pub untimed: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: default_refresh_rate(),
            lookahead: default_lookahead(),
            untimed: false,
        }
    }
}

fn default_refresh_rate() -> f64 {
    60.0
}

fn default_lookahead() -> usize {
    4
}

/// 媒体流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// 视频帧率，必须 > 0 (e.g., 23.976)
    pub fps: f64,

    /// 时长 (秒)
    #[serde(default = "default_duration")]
    pub duration_s: f64,

    /// 时间戳取整精度 (毫秒)，0 表示不取整 (模拟 mkv 等容器)
    #[serde(default)]
    pub timestamp_rounding_ms: u32,

    /// 宽度 (像素)
    #[serde(default = "default_width")]
    pub width: u32,

    /// 高度 (像素)
    #[serde(default = "default_height")]
    pub height: u32,

    /// 像素格式
    #[serde(default = "default_format")]
    pub format: PixelFormat,

    /// 是否有音频流
    #[serde(default = "default_true")]
    pub audio: bool,

    /// 音频时钟漂移 (ppm)，正值表示音频比标称快
    #[serde(default)]
    pub audio_drift_ppm: f64,

    /// 音频输出缓冲 (毫秒)
    #[serde(default = "default_audio_buffer")]
    pub audio_buffer_ms: f64,
}

fn default_duration() -> f64 {
    10.0
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_format() -> PixelFormat {
    PixelFormat::Yuv420p
}

fn default_true() -> bool {
    true
}

fn default_audio_buffer() -> f64 {
    100.0
}

impl PlaybackConfig {
    /// 显示刷新间隔 (秒)
    pub fn vsync_interval(&self) -> f64 {
        1.0 / self.display.refresh_rate_hz
    }

    /// 标称帧时长 (秒)
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.media.fps
    }

    /// 总帧数
    pub fn total_frames(&self) -> u64 {
        (self.media.duration_s * self.media.fps).round().max(0.0) as u64
    }

    /// 有效同步选项 (显示设备不计时也会关闭计时)
    pub fn effective_sync_options(&self) -> SyncOptions {
        let mut opts = self.sync.clone();
        opts.untimed |= self.display.untimed;
        opts
    }
}
