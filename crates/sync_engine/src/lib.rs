//! # Sync Engine
//!
//! 音视频同步与帧调度核心。
//!
//! 负责：
//! - 帧历史与帧时长平滑 (`history`)
//! - 待显示帧队列 (`queue`)
//! - 音视频漂移估计与 audio-sync 校正 (`drift`)
//! - display-sync 调度：按 vsync 对齐帧边界、调整速度、丢弃/重复 vsync (`display_sync`)
//! - 每个 tick 的帧时序控制 (`controller::tick`)
//! - 播放状态机 (`status`)
//! - 确定性模拟 (`sim`)
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{tick, Collaborators, PlaybackSession, TickOutcome};
//!
//! let mut session = PlaybackSession::new(options, true);
//! let mut io = Collaborators {
//!     source: &mut decoder,
//!     output: &mut display,
//!     audio: Some(&mut audio_out),
//!     subtitles: &NoSubtitles,
//! };
//!
//! loop {
//!     match tick(&mut session, &mut io, clock.now())? {
//!         TickOutcome::Again => continue,
//!         TickOutcome::Presented(report) => log_report(&report),
//!         TickOutcome::Wait | TickOutcome::Idle => wait_for_wakeup(),
//!         TickOutcome::Eof => break,
//!     }
//! }
//! ```

pub mod controller;
pub mod display_sync;
pub mod drift;
pub mod history;
pub mod queue;
pub mod session;
pub mod sim;
pub mod state;
pub mod status;

pub use controller::{tick, Collaborators, TickOutcome};
pub use display_sync::{calc_best_speed, find_best_speed, schedule_display_sync, DisplaySyncStep};
pub use drift::estimate_drift;
pub use history::{FrameHistory, FrameRecord};
pub use queue::PendingQueue;
pub use session::PlaybackSession;
pub use sim::Simulation;
pub use state::{DriftDirection, SyncState};
pub use status::StatusMachine;

// Re-export contracts types
pub use contracts::{FrameReport, PlaybackStatus, PlayerEvent, SyncOptions, VideoSyncMode};
