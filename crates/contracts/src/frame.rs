//! VideoFrame / VoFrame - 帧数据结构
//!
//! 解码+滤镜输出的图像帧，以及交给视频输出端的带时序标注的帧。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Yuv420p,
    Nv12,
    P010,
    Rgba8,
}

/// 图像参数
///
/// 与输出端当前配置不一致时，需要先重新配置输出端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageParams {
    /// 像素格式
    pub format: PixelFormat,

    /// 宽度 (像素)
    pub width: u32,

    /// 高度 (像素)
    pub height: u32,
}

/// 解码并经过滤镜的视频帧 (PendingFrame)
///
/// 图像数据使用 `Bytes`，克隆只增加引用计数。滤镜输出之后不再修改。
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// 显示时间戳 (秒)，未知时为 None
    pub pts: Option<f64>,

    /// 图像参数
    pub params: ImageParams,

    /// 图像数据 (零拷贝)
    pub data: Bytes,
}

impl VideoFrame {
    /// 创建新帧
    pub fn new(pts: Option<f64>, params: ImageParams, data: Bytes) -> Self {
        Self { pts, params, data }
    }
}

/// 输出端调度方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDeadline {
    /// 在给定的绝对时间 (秒) 显示
    PresentAt(f64),
    /// display-sync: 按 vsync 计数调度，不使用墙钟时间
    NextVsync,
}

/// 最多随帧附带的前瞻帧数量
pub const VO_MAX_REQ_FRAMES: usize = 10;

/// 交给视频输出端的帧 (带时序标注)
#[derive(Debug, Clone, PartialEq)]
pub struct VoFrame {
    /// 绝对显示时间 (秒)
    pub pts: f64,

    /// 预计显示时长 (秒)，未知或关闭时序时为 None
    pub duration: Option<f64>,

    /// 单帧步进时保持显示
    pub still: bool,

    /// 当前帧以及前瞻帧 (frames[0] 为当前帧)
    pub frames: Vec<VideoFrame>,

    /// vsync 间隔 (秒)，仅 display-sync 有效
    pub vsync_interval: f64,

    /// 相对理想显示时间的偏移 (秒)
    pub vsync_offset: f64,

    /// 理想帧时长 (秒，已计入速度调整)
    pub ideal_frame_duration: f64,

    /// 显示多少个 vsync，可能为 0 (丢弃)
    pub num_vsyncs: u32,

    /// 是否按 display-sync 调度
    pub display_synced: bool,
}

impl VoFrame {
    /// 创建未做 display-sync 标注的帧
    pub fn new(pts: f64, frames: Vec<VideoFrame>) -> Self {
        Self {
            pts,
            duration: None,
            still: false,
            frames,
            vsync_interval: 0.0,
            vsync_offset: 0.0,
            ideal_frame_duration: 0.0,
            num_vsyncs: 1,
            display_synced: false,
        }
    }

    /// 当前帧
    pub fn current(&self) -> Option<&VideoFrame> {
        self.frames.first()
    }
}
