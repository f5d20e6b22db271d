//! Container remuxer
//!
//! Copies every encoded stream of one media container into a new container
//! without decoding, converting packet timing to the output's timebases.
//! A remux is one [`MediaSession`]: open the input, map its streams onto the
//! output and write the header, relay packets, then finalize.

pub mod batch;
pub mod config;
pub mod config_file;
pub mod container;
pub mod convert;
pub mod error;
pub mod ffmpeg_utils;
pub mod input;
pub mod media;
pub mod output;
pub mod relay;
pub mod session;
pub mod timebase;


pub use batch::{
    load_batch_file, parse_batch, run_batch, BatchJob, BatchReport, JobOutcome, TimeRange,
};
pub use config::{LogFormat, LoggingConfig, ReadErrorPolicy, RemuxConfig};
pub use convert::{convert, convert_with, remux_file, status_code};
pub use error::{FfmpegError, RemuxError, Result};
pub use ffmpeg_utils::{init, install_log_forwarding, version_info, FfmpegLibrary};
pub use session::{MediaSession, RemuxSummary, SessionState};
pub use timebase::{Timebase, NOPTS_VALUE};
