//! 配置校验模块
//!
//! 校验规则：
//! - playback_speed > 0
//! - sync_max_video_change / sync_max_audio_change 在 [0, 100] 内
//! - max_pts_correction > 0 (如果设置)
//! - autosync <= 10000
//! - refresh_rate_hz > 0，lookahead >= 1
//! - fps > 0，duration_s > 0，宽高 > 0
//! - audio_buffer_ms >= 0，|audio_drift_ppm| < 1e5

use contracts::{ContractError, PlaybackConfig};

const MAX_AUTOSYNC: u32 = 10_000;
const MAX_DRIFT_PPM: f64 = 100_000.0;

/// 校验 PlaybackConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &PlaybackConfig) -> Result<(), ContractError> {
    validate_sync(config)?;
    validate_display(config)?;
    validate_media(config)?;
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), ContractError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("must be > 0, got {value}"),
        ))
    }
}

fn percent(field: &str, value: f64) -> Result<(), ContractError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("must be within [0, 100], got {value}"),
        ))
    }
}

/// 校验同步选项
fn validate_sync(config: &PlaybackConfig) -> Result<(), ContractError> {
    let sync = &config.sync;

    positive("sync.playback_speed", sync.playback_speed)?;
    percent("sync.sync_max_video_change", sync.sync_max_video_change)?;
    percent("sync.sync_max_audio_change", sync.sync_max_audio_change)?;

    if !sync.audio_delay.is_finite() {
        return Err(ContractError::config_validation(
            "sync.audio_delay",
            "must be a finite number",
        ));
    }
    if let Some(correction) = sync.max_pts_correction {
        positive("sync.max_pts_correction", correction)?;
    }
    if sync.autosync > MAX_AUTOSYNC {
        return Err(ContractError::config_validation(
            "sync.autosync",
            format!("must be <= {MAX_AUTOSYNC}, got {}", sync.autosync),
        ));
    }
    Ok(())
}

/// 校验显示设备
fn validate_display(config: &PlaybackConfig) -> Result<(), ContractError> {
    positive("display.refresh_rate_hz", config.display.refresh_rate_hz)?;
    if config.display.lookahead == 0 {
        return Err(ContractError::config_validation(
            "display.lookahead",
            "must be >= 1",
        ));
    }
    Ok(())
}

/// 校验媒体流
fn validate_media(config: &PlaybackConfig) -> Result<(), ContractError> {
    let media = &config.media;

    positive("media.fps", media.fps)?;
    positive("media.duration_s", media.duration_s)?;

    if media.width == 0 || media.height == 0 {
        return Err(ContractError::config_validation(
            "media.width / media.height",
            format!("must be > 0, got {}x{}", media.width, media.height),
        ));
    }
    if media.audio_buffer_ms.is_nan() || media.audio_buffer_ms < 0.0 {
        return Err(ContractError::config_validation(
            "media.audio_buffer_ms",
            format!("must be >= 0, got {}", media.audio_buffer_ms),
        ));
    }
    if media.audio_drift_ppm.is_nan() || media.audio_drift_ppm.abs() >= MAX_DRIFT_PPM {
        return Err(ContractError::config_validation(
            "media.audio_drift_ppm",
            format!(
                "must be within ±{MAX_DRIFT_PPM}, got {}",
                media.audio_drift_ppm
            ),
        ));
    }
    Ok(())
}
