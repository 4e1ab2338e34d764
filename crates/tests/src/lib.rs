//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 虚拟时钟下的播放场景测试
//! - 示例配置回归

#[cfg(test)]
mod contract_tests {
    use contracts::{FrameReport, PlayerEvent, VideoSyncMode};

    #[test]
    fn test_mode_names_are_stable() {
        let names: Vec<_> = VideoSyncMode::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(
            names,
            [
                "audio",
                "display-resample",
                "display-resample-vdrop",
                "display-resample-desync",
                "display-adrop",
                "display-vdrop",
                "display-desync",
                "desync",
            ]
        );
    }

    #[test]
    fn test_frame_report_snapshot() {
        let report = FrameReport {
            pts: Some(1.5),
            num_vsyncs: 3,
            display_synced: true,
            ..FrameReport::default()
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["pts"], 1.5);
        assert_eq!(json["num_vsyncs"], 3);
        assert_eq!(json["display_synced"], true);
        assert_eq!(json["drop_repeat"], 0);
    }

    #[test]
    fn test_event_snapshot() {
        let json = serde_json::to_string(&PlayerEvent::DisplaySyncBroken { av_diff: 0.75 }).unwrap();
        assert_eq!(json, r#"{"event":"display_sync_broken","av_diff":0.75}"#);
    }
}

#[cfg(test)]
mod scenario_tests {
    use contracts::{
        ImageParams, PixelFormat, PlaybackConfig, PlaybackStatus, PlayerEvent, VideoOutput,
    };
    use sync_engine::Simulation;

    fn config(content: &str) -> PlaybackConfig {
        let config: PlaybackConfig = toml::from_str(content).unwrap();
        config_loader::ConfigLoader::validate(&config).unwrap();
        config
    }

    fn count_events(sim: &Simulation, pred: impl Fn(&PlayerEvent) -> bool) -> usize {
        sim.events().iter().filter(|e| pred(e)).count()
    }

    /// 24 fps on 60 Hz: 2:3 cadence at unchanged speed
    #[test]
    fn test_film_cadence_on_60hz() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [display]
            refresh_rate_hz = 60.0
            [media]
            fps = 24.0
            duration_s = 45.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(1000).unwrap();

        let reports = &sim.reports()[10..1000];
        assert!(reports.iter().all(|r| r.display_synced));
        assert!(reports.iter().all(|r| r.num_vsyncs == 2 || r.num_vsyncs == 3));
        assert!(reports.iter().all(|r| (r.speed_factor_video - 1.0).abs() < 1e-6));

        let vsyncs: i32 = reports.iter().map(|r| r.num_vsyncs).sum();
        let mean = vsyncs as f64 / reports.len() as f64;
        assert!((mean - 2.5).abs() < 0.01, "mean vsyncs = {mean}");

        let max_error = reports
            .iter()
            .map(|r| r.display_sync_error.abs())
            .fold(0.0, f64::max);
        assert!(max_error <= cfg.vsync_interval(), "error = {max_error}");

        let max_av = reports.iter().map(|r| r.av_diff.abs()).fold(0.0, f64::max);
        assert!(max_av < 0.05, "max av_diff = {max_av}");
        assert_eq!(
            count_events(&sim, |e| matches!(e, PlayerEvent::DisplaySyncBroken { .. })),
            0
        );
    }

    /// 23.976 fps is sped up by 1001/1000 to lock to the 2:3 cadence
    #[test]
    fn test_ntsc_film_speedup() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 23.976
            duration_s = 10.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(200).unwrap();

        for report in &sim.reports()[10..] {
            assert!(
                (report.speed_factor_video - 1.001).abs() < 1e-4,
                "speed = {}",
                report.speed_factor_video
            );
            assert!(report.num_vsyncs == 2 || report.num_vsyncs == 3);
        }
    }

    /// Millisecond-rounded timestamps are smoothed back to the nominal rate
    #[test]
    fn test_rounded_timestamps_keep_speed() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 23.976
            duration_s = 10.0
            timestamp_rounding_ms = 1
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(200).unwrap();

        for report in &sim.reports()[10..] {
            assert!(
                (report.speed_factor_video - 1.001).abs() < 5e-4,
                "speed = {}",
                report.speed_factor_video
            );
            assert!((report.frame_duration - 1001.0 / 24000.0).abs() < 1e-3);
        }
    }

    /// A fast audio clock is compensated by resampling audio
    #[test]
    fn test_audio_drift_compensated() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 24.0
            duration_s = 60.0
            audio_drift_ppm = 1000.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(1200).unwrap();

        let reports = sim.reports();
        let max_av = reports.iter().map(|r| r.av_diff.abs()).fold(0.0, f64::max);
        assert!(max_av < 0.05, "max av_diff = {max_av}");
        assert!(
            reports
                .iter()
                .any(|r| (r.speed_factor_audio - r.speed_factor_video).abs() > 1e-6),
            "audio was never resampled"
        );
        assert!(sim.audio().unwrap().speed_changes() > 0);
        assert_eq!(
            count_events(&sim, |e| matches!(e, PlayerEvent::DisplaySyncBroken { .. })),
            0
        );
    }

    /// An audio jump is absorbed by dropping video vsyncs
    #[test]
    fn test_vdrop_corrects_audio_jump() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-vdrop"
            [media]
            fps = 24.0
            duration_s = 20.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(50).unwrap();
        assert!(sim.reports()[10..].iter().all(|r| r.drop_repeat == 0));

        sim.audio_mut().unwrap().skip(0.1);
        sim.run_frames(60).unwrap();

        let after = &sim.reports()[50..];
        assert!(after.iter().any(|r| r.drop_repeat < 0));
        assert!(after.iter().all(|r| r.drop_repeat <= 0));
        assert!(sim.reports().last().unwrap().mistimed_frames > 0);
        for report in &after[40..] {
            assert!(report.av_diff.abs() < 0.03, "av_diff = {}", report.av_diff);
        }
    }

    /// A large desync gives up display-sync until the next reset
    #[test]
    fn test_display_sync_breaks_on_large_desync() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 24.0
            duration_s = 20.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(30).unwrap();

        sim.audio_mut().unwrap().skip(1.0);
        sim.run_frames(30).unwrap();

        assert_eq!(
            count_events(&sim, |e| matches!(e, PlayerEvent::DisplaySyncBroken { .. })),
            1
        );
        assert!(sim.session().sync_state().display_sync_broken);
        assert!(sim.reports()[50..].iter().all(|r| !r.display_synced));
        assert!(sim
            .events()
            .contains(&PlayerEvent::SyncModeChanged { active: false }));

        // A seek starts over with display-sync enabled
        sim.seek(10.0);
        sim.run_frames(20).unwrap();
        assert!(!sim.session().sync_state().display_sync_broken);
        assert!(sim.reports().last().unwrap().display_synced);
    }

    #[test]
    fn test_seek_restarts_playback() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 25.0
            duration_s = 30.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(50).unwrap();

        sim.seek(20.0);
        assert_eq!(sim.session().video_status(), PlaybackStatus::Syncing);
        assert_eq!(sim.session().playback_pts(), None);

        let before = sim.reports().len();
        sim.run_frames(50).unwrap();
        let after = &sim.reports()[before..];

        assert!((after[0].pts.unwrap() - 20.0).abs() < 1e-9);
        assert!(after.windows(2).all(|w| w[1].pts > w[0].pts));
        assert_eq!(
            count_events(&sim, |e| matches!(e, PlayerEvent::FirstFrameShown)),
            2
        );
        for report in &after[10..] {
            assert!(report.av_diff.abs() < 0.05, "av_diff = {}", report.av_diff);
        }
    }

    /// Audio-clock sync with rounded container timestamps
    #[test]
    fn test_audio_sync_with_rounded_timestamps() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "audio"
            [display]
            refresh_rate_hz = 59.94
            [media]
            fps = 29.97
            duration_s = 10.0
            timestamp_rounding_ms = 1
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(200).unwrap();

        for report in &sim.reports()[10..] {
            assert!(!report.display_synced);
            assert!(
                report.av_diff.abs() < cfg.vsync_interval(),
                "av_diff = {}",
                report.av_diff
            );
        }
    }

    /// The last frames are drained before EOF
    #[test]
    fn test_eof_drains_queue() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 5.0
            duration_s = 2.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_to_end().unwrap();

        assert!(sim.is_finished());
        assert_eq!(sim.session().video_status(), PlaybackStatus::Eof);
        let pts: Vec<_> = sim.reports().iter().filter_map(|r| r.pts).collect();
        assert_eq!(pts.len(), 10);
        assert!((pts[9] - 1.8).abs() < 1e-9);
        assert!(sim.now() >= 1.8);
    }

    /// Mid-stream format change reconfigures the output once more
    #[test]
    fn test_midstream_reconfig() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 25.0
            duration_s = 10.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.run_frames(10).unwrap();
        assert_eq!(sim.display().reconfig_count(), 1);

        let params = ImageParams {
            format: PixelFormat::P010,
            width: 3840,
            height: 2160,
        };
        sim.source_mut().set_params(params);
        sim.run_frames(30).unwrap();

        assert_eq!(sim.reports().len(), 40);
        assert_eq!(sim.display().reconfig_count(), 2);
        assert_eq!(sim.display().params(), Some(params));
        assert!(sim
            .events()
            .contains(&PlayerEvent::VideoReconfig { params }));
    }

    #[test]
    fn test_max_frames_with_display_sync() {
        let cfg = config(
            r#"
            [sync]
            video_sync = "display-resample"
            [media]
            fps = 24.0
            "#,
        );
        let mut sim = Simulation::new(&cfg);
        sim.session_mut().set_max_frames(Some(12));
        sim.run_to_end().unwrap();

        assert_eq!(sim.reports().len(), 12);
        assert!(sim.is_finished());
    }
}

#[cfg(test)]
mod config_tests {
    use std::path::PathBuf;

    use config_loader::ConfigLoader;
    use observability::SyncMetricsAggregator;
    use sync_engine::Simulation;

    fn sample_configs() -> Vec<PathBuf> {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs");
        let mut paths: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();
        paths
    }

    /// Every shipped configuration loads and plays
    #[test]
    fn test_sample_configs_play() {
        let paths = sample_configs();
        assert!(!paths.is_empty());

        for path in paths {
            let config = ConfigLoader::load_from_path(&path)
                .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
            let mut sim = Simulation::new(&config);
            sim.run_frames(120)
                .unwrap_or_else(|e| panic!("{}: {e}", path.display()));

            let mut aggregator = SyncMetricsAggregator::new();
            for report in sim.reports() {
                aggregator.update(report);
            }
            let summary = aggregator.summary();
            assert_eq!(summary.total_frames, 120, "{}", path.display());
            assert!(
                summary.av_diff_ms.max < 100.0,
                "{}: {}",
                path.display(),
                summary
            );
        }
    }
}
