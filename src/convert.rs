//! Remux entry points

use std::path::Path;

use crate::config::RemuxConfig;
use crate::container::ContainerLibrary;
use crate::error::Result;
use crate::ffmpeg_utils::FfmpegLibrary;
use crate::session::{MediaSession, RemuxSummary};

/// Remux `input` into `output` with default settings.
///
/// Returns 0 once the output has been finalized, otherwise the status code
/// of the stage that failed (see [`crate::RemuxError::exit_code`]).
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> i32 {
    let result = remux_file(input.as_ref(), output.as_ref(), &RemuxConfig::default());
    if let Err(e) = &result {
        tracing::error!("Remux of {:?} failed: {}", input.as_ref(), e);
    }
    status_code(&result)
}

/// Remux `input` into `output` through FFmpeg
pub fn remux_file(input: &Path, output: &Path, config: &RemuxConfig) -> Result<RemuxSummary> {
    convert_with(&FfmpegLibrary, input, output, config)
}

/// Remux through any container library
pub fn convert_with<L: ContainerLibrary>(
    library: &L,
    input: &Path,
    output: &Path,
    config: &RemuxConfig,
) -> Result<RemuxSummary> {
    MediaSession::open(library, input, output, config)?.run()
}

/// Status code for a remux result: 0 on success
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}
