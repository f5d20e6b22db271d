//! End-to-end remux scenarios over the in-memory container library

use std::sync::Arc;
use tempfile::TempDir;

use crate::batch::{parse_batch, run_batch, TimeRange};
use crate::config::{BatchConfig, ReadErrorPolicy, RemuxConfig};
use crate::container::ReadOutcome;
use crate::convert::{convert_with, status_code};
use crate::error::RemuxError;
use crate::input::Input;
use crate::integration::fixtures::*;
use crate::media::{CodecParameters, MediaKind};
use crate::output::Output;
use crate::relay::{relay, RelayEnd};
use crate::session::{MediaSession, SessionState};
use crate::timebase::{NOPTS_VALUE, UNKNOWN_POSITION};

fn workdir() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn expected(value: i64, from_den: i64, to_den: i64) -> i64 {
    (value as f64 * to_den as f64 / from_den as f64).round() as i64
}

#[test]
fn test_video_audio_remux() {
    let dir = workdir();
    let out = dir.path().join("out.mkv");
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());

    let summary = convert_with(&library, "in.mp4".as_ref(), &out, &RemuxConfig::default()).unwrap();
    assert_eq!(summary.packets, 10);
    assert_eq!(summary.streams.len(), 2);
    assert_eq!(summary.streams[0].kind, MediaKind::Video);
    assert_eq!(summary.streams[0].output_time_base, MUXER_TB);
    assert_eq!(summary.streams[1].stats.packets, 5);
    assert_eq!(summary.streams[1].stats.keyframes, 5);
    assert_eq!(summary.streams[0].stats.keyframes, 1);
    // Last video packet: pts 133ms plus 33ms
    assert_eq!(summary.streams[0].stats.end_ts, Some(166));
    let video_secs = summary.streams[0].duration_secs.unwrap();
    assert!((video_secs - 0.166).abs() < 1e-9);
    assert_eq!(summary.streams[1].stats.end_ts, Some(106));
    assert!(summary.read_error.is_none());

    let record = library.record.lock();
    assert_eq!(record.streams.len(), 2);
    let (video_codec, video_hint) = &record.streams[0];
    assert_eq!(video_codec.name, "h264");
    assert_eq!(video_codec.codec_tag(), 0);
    assert_eq!(video_codec.extradata, MockCodec::h264().extradata);
    assert_eq!(*video_hint, None);
    assert_eq!(record.streams[1].0, MockCodec::aac());

    assert_eq!(record.headers, 1);
    assert_eq!(record.trailers, 1);
    assert!(record.io_opened);
    assert!(out.exists());
    assert_eq!(record.packets.len(), 10);

    let order: Vec<usize> = record.packets.iter().map(|p| p.stream_index).collect();
    assert_eq!(order, vec![0, 1, 1, 0, 1, 0, 1, 0, 1, 0]);

    let mut video_i = 0;
    let mut audio_i = 0;
    for pkt in &record.packets {
        assert_eq!(pkt.position, UNKNOWN_POSITION);
        assert_eq!(pkt.size, pkt.payload.len());
        if pkt.stream_index == 0 {
            assert_eq!(pkt.pts, expected(video_i * 3003, 90000, 1000));
            assert_eq!(pkt.dts, pkt.pts);
            assert_eq!(pkt.duration, 33);
            video_i += 1;
        } else {
            assert_eq!(pkt.pts, expected(audio_i * 1024, 48000, 1000));
            assert_eq!(pkt.duration, 21);
            audio_i += 1;
        }
    }
    assert_eq!((video_i, audio_i), (5, 5));

    assert_eq!(record.muxer_closes, 1);
    assert_eq!(record.demuxer_closes, 1);
}

#[test]
fn test_packets_keep_unknown_timestamps() {
    let dir = workdir();
    let mut source = video_audio_source();
    source.script.truncate(1);
    if let Scripted::Packet(pkt) = &mut source.script[0] {
        pkt.pts = NOPTS_VALUE;
        pkt.dts = NOPTS_VALUE;
    }
    let library = MockLibrary::new().with_source("in.ts", source);

    let summary = convert_with(
        &library,
        "in.ts".as_ref(),
        &dir.path().join("out.mp4"),
        &RemuxConfig::default(),
    )
    .unwrap();
    assert_eq!(summary.streams[0].stats.untimed, 1);
    assert!(summary.streams[0].duration_secs.is_none());

    let record = library.record.lock();
    assert_eq!(record.packets[0].pts, NOPTS_VALUE);
    assert_eq!(record.packets[0].dts, NOPTS_VALUE);
    assert!(!record.packets[0].has_pts());
    assert!(!record.packets[0].has_dts());
}

#[test]
fn test_empty_input() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("empty.mkv", empty_source());

    let summary = convert_with(
        &library,
        "empty.mkv".as_ref(),
        &dir.path().join("out.mp4"),
        &RemuxConfig::default(),
    )
    .unwrap();

    assert_eq!(summary.packets, 0);
    let record = library.record.lock();
    assert_eq!(record.headers, 1);
    assert_eq!(record.trailers, 1);
    assert!(record.packets.is_empty());
}

#[test]
fn test_unreadable_input_creates_no_output() {
    let dir = workdir();
    let out = dir.path().join("out.mp4");
    let library = MockLibrary::new();

    let result = convert_with(&library, "missing.mp4".as_ref(), &out, &RemuxConfig::default());
    assert!(matches!(result, Err(RemuxError::Open(_))));
    assert_eq!(status_code(&result), 2);
    assert!(!out.exists());

    let record = library.record.lock();
    assert_eq!(record.headers, 0);
    assert_eq!(record.muxer_closes, 0);
}

#[test]
fn test_finalize_twice() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());

    let mut session = MediaSession::open(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    )
    .unwrap();
    assert_eq!(session.state(), SessionState::Open);

    session.finalize().unwrap();
    session.finalize().unwrap();
    assert_eq!(session.state(), SessionState::Finalized);
    drop(session);

    let record = library.record.lock();
    assert_eq!(record.trailers, 1);
    assert_eq!(record.muxer_closes, 1);
    assert_eq!(record.demuxer_closes, 1);
}

#[test]
fn test_summary_carries_session_id() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());

    let session = MediaSession::open(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    )
    .unwrap();
    let id = session.id();
    let summary = session.run().unwrap();
    assert_eq!(summary.session_id, id.to_string());
}

#[test]
fn test_input_output_lifecycle() {
    let dir = workdir();
    let out = dir.path().join("out.mkv");
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());

    let mut input = Input::open(&library, "in.mp4".as_ref()).unwrap();
    let mut output = Output::create(&library, &out, input.streams(), &RemuxConfig::default())
        .unwrap();
    assert!(output.header_written());
    assert!(!output.trailer_written());
    assert!(output.streams().iter().all(|s| s.codec.codec_tag() == 0));

    let report = relay(&mut input, &mut output, ReadErrorPolicy::Fail).unwrap();
    assert_eq!(report.stats.packets, 10);
    assert!(matches!(report.end, RelayEnd::EndOfStream));

    output.finalize().unwrap();
    assert!(output.trailer_written());
    assert!(output.is_released());
    output.finalize().unwrap();

    assert!(!input.is_released());
    input.release();
    assert!(input.is_released());
    assert!(matches!(input.read_packet(), Ok(ReadOutcome::EndOfStream)));

    let record = library.record.lock();
    assert_eq!(record.trailers, 1);
    assert_eq!(record.muxer_closes, 1);
    assert_eq!(record.demuxer_closes, 1);
}

#[test]
fn test_dropped_session_is_finalized() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());

    let session = MediaSession::open(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    )
    .unwrap();
    drop(session);

    let record = library.record.lock();
    assert_eq!(record.trailers, 1);
    assert_eq!(record.muxer_closes, 1);
}

fn source_with_read_error() -> MockSource {
    let mut source = video_audio_source();
    source.script.insert(2, Scripted::Error("corrupt packet".to_string()));
    source
}

#[test]
fn test_read_error_fails_after_finalizing() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("bad.ts", source_with_read_error());

    let result = convert_with(
        &library,
        "bad.ts".as_ref(),
        &dir.path().join("out.mp4"),
        &RemuxConfig::default(),
    );
    assert!(matches!(result, Err(RemuxError::Read(_))));
    assert_eq!(status_code(&result), 5);

    let record = library.record.lock();
    assert_eq!(record.packets.len(), 2);
    assert_eq!(record.trailers, 1);
    assert_eq!(record.muxer_closes, 1);
    assert_eq!(record.demuxer_closes, 1);
}

#[test]
fn test_read_error_stop_policy() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("bad.ts", source_with_read_error());
    let config = RemuxConfig {
        read_error_policy: ReadErrorPolicy::Stop,
        ..Default::default()
    };

    let summary = convert_with(&library, "bad.ts".as_ref(), &dir.path().join("out.mp4"), &config)
        .unwrap();
    assert_eq!(summary.packets, 2);
    assert!(summary
        .read_error
        .as_deref()
        .is_some_and(|e| e.contains("corrupt packet")));
    assert_eq!(library.record.lock().trailers, 1);
}

#[test]
fn test_header_failure_removes_output() {
    let dir = workdir();
    let out = dir.path().join("out.mp4");
    let mut library = MockLibrary::new().with_source("in.mp4", video_audio_source());
    library.fail_header = true;

    let result = convert_with(&library, "in.mp4".as_ref(), &out, &RemuxConfig::default());
    assert!(matches!(result, Err(RemuxError::HeaderWrite(_))));
    assert!(!out.exists());

    let record = library.record.lock();
    assert!(record.io_opened);
    assert_eq!(record.trailers, 0);
    assert_eq!(record.muxer_closes, 1);
    assert_eq!(record.demuxer_closes, 1);
}

#[test]
fn test_unknown_stream_index() {
    let dir = workdir();
    let mut source = video_audio_source();
    source.script.insert(3, Scripted::Packet(packet(7, 0, 10, false, 0)));
    let library = MockLibrary::new().with_source("in.mp4", source);

    let result = convert_with(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    );
    assert!(matches!(result, Err(RemuxError::UnknownStream(7))));

    let record = library.record.lock();
    assert_eq!(record.packets.len(), 3);
    assert_eq!(record.trailers, 1);
    assert_eq!(record.muxer_closes, 1);
}

#[test]
fn test_write_failure() {
    let dir = workdir();
    let mut library = MockLibrary::new().with_source("in.mp4", video_audio_source());
    library.fail_write_at = Some(4);

    let result = convert_with(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    );
    assert!(matches!(result, Err(RemuxError::Write(_))));
    assert_eq!(status_code(&result), 6);

    let record = library.record.lock();
    assert_eq!(record.packets.len(), 4);
    assert_eq!(record.trailers, 1);
}

#[test]
fn test_trailer_failure() {
    let dir = workdir();
    let mut library = MockLibrary::new().with_source("in.mp4", video_audio_source());
    library.fail_trailer = true;

    let result = convert_with(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    );
    assert!(matches!(result, Err(RemuxError::TrailerWrite(_))));
    assert_eq!(library.record.lock().muxer_closes, 1);
}

#[test]
fn test_earlier_error_wins_over_trailer_failure() {
    let dir = workdir();
    let mut library = MockLibrary::new().with_source("bad.ts", source_with_read_error());
    library.fail_trailer = true;

    let result = convert_with(
        &library,
        "bad.ts".as_ref(),
        &dir.path().join("out.mkv"),
        &RemuxConfig::default(),
    );
    assert!(matches!(result, Err(RemuxError::Read(_))));
}

#[test]
fn test_nofile_format_skips_io() {
    let dir = workdir();
    let out = dir.path().join("out.mkv");
    let mut library = MockLibrary::new().with_source("in.mp4", video_audio_source());
    library.nofile = true;

    convert_with(&library, "in.mp4".as_ref(), &out, &RemuxConfig::default()).unwrap();
    assert!(!library.record.lock().io_opened);
    assert!(!out.exists());
}

#[test]
fn test_preserve_time_base_and_muxer_options() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());
    let mut config = RemuxConfig {
        preserve_time_base: true,
        ..Default::default()
    };
    config.set_muxer_option("movflags=+faststart").unwrap();

    let summary = convert_with(&library, "in.mp4".as_ref(), &dir.path().join("o.mp4"), &config)
        .unwrap();
    assert_eq!(summary.streams[0].output_time_base, VIDEO_TB);
    assert_eq!(summary.streams[1].output_time_base, AUDIO_TB);

    let record = library.record.lock();
    assert_eq!(record.streams[0].1, Some(VIDEO_TB));
    assert_eq!(
        record.header_options,
        vec![("movflags".to_string(), "+faststart".to_string())]
    );
    // Same timebase on both sides: timing passes through untouched
    assert_eq!(record.packets[3].pts, 3003);
    assert_eq!(record.packets[3].duration, 3003);
}

#[test]
fn test_unknown_output_format() {
    let dir = workdir();
    let library = MockLibrary::new().with_source("in.mp4", video_audio_source());

    let by_extension = convert_with(
        &library,
        "in.mp4".as_ref(),
        &dir.path().join("out.bogus"),
        &RemuxConfig::default(),
    );
    assert!(matches!(by_extension, Err(RemuxError::Format(_))));

    let config = RemuxConfig {
        output_format: Some("bogus".to_string()),
        ..Default::default()
    };
    let by_name = convert_with(&library, "in.mp4".as_ref(), &dir.path().join("out.mp4"), &config);
    assert_eq!(status_code(&by_name), 3);
    assert_eq!(library.record.lock().demuxer_closes, 2);
}

#[tokio::test]
async fn test_batch_run() {
    let dir = workdir();
    let good = dir.path().join("good.mkv");
    let bad = dir.path().join("bad.mkv");
    let library = MockLibrary::new()
        .with_source("a.mp4", video_audio_source())
        .with_source("b.mp4", empty_source());

    let content = format!(
        "# two good, one missing\na.mp4\t{}\nmissing.mp4 {}\nb.mp4 {}\n",
        good.display(),
        bad.display(),
        dir.path().join("empty.mkv").display()
    );
    let jobs = parse_batch(&content);
    assert_eq!(jobs.len(), 3);

    let config = RemuxConfig {
        batch: BatchConfig {
            max_parallel: 2,
            window: None,
        },
        ..Default::default()
    };
    let report = run_batch(Arc::new(library), jobs, Arc::new(config)).await;

    assert_eq!(report.jobs.len(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.jobs[0].status, 0);
    assert_eq!(report.jobs[0].summary.as_ref().map(|s| s.packets), Some(10));
    assert_eq!(report.jobs[1].job.line, 3);
    assert_eq!(report.jobs[1].status, 2);
    assert!(good.exists());
    assert!(!bad.exists());

    assert!(report.skipped.is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["jobs"][1]["status"], 2);

    assert!(matches!(
        report.into_result(),
        Err(RemuxError::Batch { failed: 1, total: 3 })
    ));
}

fn seconds_now() -> u32 {
    use chrono::Timelike;
    chrono::Local::now().time().num_seconds_from_midnight()
}

fn window_config(start: u32, end: u32) -> Arc<RemuxConfig> {
    Arc::new(RemuxConfig {
        batch: BatchConfig {
            max_parallel: 1,
            window: Some(TimeRange {
                start: start % 86_400,
                end: end % 86_400,
            }),
        },
        ..Default::default()
    })
}

fn two_jobs(dir: &TempDir) -> Vec<crate::batch::BatchJob> {
    parse_batch(&format!(
        "a.mp4 {}\na.mp4 {}\n",
        dir.path().join("one.mkv").display(),
        dir.path().join("two.mkv").display()
    ))
}

#[tokio::test]
async fn test_batch_outside_window_starts_nothing() {
    let dir = workdir();
    let library = Arc::new(MockLibrary::new().with_source("a.mp4", video_audio_source()));

    // Opens two hours from now
    let now = seconds_now();
    let config = window_config(now + 7200, now + 10_800);
    let report = run_batch(Arc::clone(&library), two_jobs(&dir), config).await;

    assert!(report.jobs.is_empty());
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[1].line, 2);
    assert_eq!(library.record.lock().headers, 0);
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn test_batch_inside_window_runs_all() {
    let dir = workdir();
    let library = Arc::new(MockLibrary::new().with_source("a.mp4", video_audio_source()));

    // May wrap past midnight
    let now = seconds_now();
    let config = window_config(now + 86_400 - 3600, now + 3600);
    let report = run_batch(Arc::clone(&library), two_jobs(&dir), config).await;

    assert_eq!(report.jobs.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(report.failed(), 0);
    assert!(dir.path().join("two.mkv").exists());
}
