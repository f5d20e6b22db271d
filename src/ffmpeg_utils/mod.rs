//! FFmpeg backend
//!
//! This module handles:
//! - FFmpeg initialization
//! - Forwarding FFmpeg's own log output into `tracing`
//! - The [`ContainerLibrary`] implementation used in production

pub mod demuxer;
pub mod helpers;
pub mod muxer;

use ffmpeg_next as ffmpeg;
use std::path::Path;
use std::sync::OnceLock;

use crate::container::ContainerLibrary;
use crate::error::{FfmpegError, Result};

pub use demuxer::FfmpegDemuxer;
pub use muxer::FfmpegMuxer;

static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initialize FFmpeg library
///
/// Safe to call from any thread, any number of times; the library is only
/// initialized once.
pub fn init() -> std::result::Result<(), FfmpegError> {
    let result = INIT.get_or_init(|| {
        ffmpeg::init().map_err(|e| format!("ffmpeg::init() failed: {}", e))?;
        tracing::debug!("FFmpeg initialized ({})", version_info());
        Ok(())
    });
    result.clone().map_err(FfmpegError::InitFailed)
}

/// Route FFmpeg's log output through `tracing` (target `ffmpeg`).
///
/// `level` is our own log level name; FFmpeg is set one notch quieter so
/// that `info` does not drown in per-stream probing chatter.
pub fn install_log_forwarding(level: &str) {
    let av_level = match level.to_ascii_lowercase().as_str() {
        "error" => ffmpeg::ffi::AV_LOG_ERROR,
        "warn" | "info" => ffmpeg::ffi::AV_LOG_WARNING,
        "debug" => ffmpeg::ffi::AV_LOG_INFO,
        "trace" => ffmpeg::ffi::AV_LOG_DEBUG,
        _ => ffmpeg::ffi::AV_LOG_WARNING,
    };

    // SAFETY: both functions only swap global FFmpeg state. They are called
    // once at startup, before any session exists.
    unsafe {
        ffmpeg::ffi::av_log_set_level(av_level as i32);
        ffmpeg::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() {
        return;
    }

    if level <= ffmpeg::ffi::AV_LOG_ERROR as i32 {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_WARNING as i32 {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_INFO as i32 {
        tracing::info!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_DEBUG as i32 {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::trace!(target: "ffmpeg", "{}", msg);
    }
}

/// Get FFmpeg version information
pub fn version_info() -> String {
    let v = ffmpeg::format::version();
    format!(
        "libavformat {}.{}.{}",
        v >> 16,
        (v >> 8) & 0xff,
        v & 0xff
    )
}

/// Container library backed by libavformat
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLibrary;

impl ContainerLibrary for FfmpegLibrary {
    type Codec = ffmpeg::codec::Parameters;
    type Payload = ffmpeg::Packet;
    type Demuxer = FfmpegDemuxer;
    type Muxer = FfmpegMuxer;

    fn open_demuxer(&self, path: &Path) -> Result<FfmpegDemuxer> {
        init()?;
        FfmpegDemuxer::open(path)
    }

    fn open_muxer(&self, path: &Path, format: Option<&str>) -> Result<FfmpegMuxer> {
        init()?;
        FfmpegMuxer::create(path, format)
    }
}
