//! Media session
//!
//! A session owns one input and one output for the duration of a single
//! remux: open → active → finalized. It is consumed by [`MediaSession::run`]
//! and never reused.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

use crate::config::{ReadErrorPolicy, RemuxConfig};
use crate::container::ContainerLibrary;
use crate::error::Result;
use crate::input::Input;
use crate::media::{CodecParameters, MediaKind};
use crate::output::Output;
use crate::relay::{relay, RelayEnd, RelayStats, StreamStats};
use crate::timebase::Timebase;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Input probed, output header written
    Open,
    /// Packets are being relayed
    Active,
    /// Trailer written (or skipped) and all resources released
    Finalized,
}

/// Per-stream part of a [`RemuxSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub index: usize,
    pub kind: MediaKind,
    pub codec: String,
    pub input_time_base: Timebase,
    pub output_time_base: Timebase,
    /// Stream end time in seconds, when any packet was timed
    pub duration_secs: Option<f64>,
    #[serde(flatten)]
    pub stats: StreamStats,
}

/// What a completed remux did
#[derive(Debug, Clone, Serialize)]
pub struct RemuxSummary {
    pub session_id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub streams: Vec<StreamSummary>,
    pub packets: u64,
    pub bytes: u64,
    pub elapsed_secs: f64,
    /// Set when a read failure was treated as end of input
    pub read_error: Option<String>,
}

/// One input, one output, one pass
pub struct MediaSession<L: ContainerLibrary> {
    id: Uuid,
    input: Input<L::Demuxer>,
    output: Output<L::Muxer>,
    state: SessionState,
    policy: ReadErrorPolicy,
    started: Instant,
}

impl<L: ContainerLibrary> MediaSession<L> {
    /// Open the input, then create the output and write its header.
    ///
    /// The input is opened first, so an unreadable input fails before any
    /// output resource exists.
    pub fn open(
        library: &L,
        input_path: &Path,
        output_path: &Path,
        config: &RemuxConfig,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!("[{}] Remuxing {:?} -> {:?}", id, input_path, output_path);

        let input = Input::open(library, input_path)?;
        let output = Output::create(library, output_path, input.streams(), config)?;

        Ok(Self {
            id,
            input,
            output,
            state: SessionState::Open,
            policy: config.read_error_policy,
            started,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Relay all packets, then finalize.
    ///
    /// The finalizer runs on every path out of the relay loop. When both the
    /// loop and the finalizer fail, the loop's error is returned.
    pub fn run(mut self) -> Result<RemuxSummary> {
        self.state = SessionState::Active;
        let relayed = relay(&mut self.input, &mut self.output, self.policy);
        let finalized = self.finalize();

        let report = match relayed {
            Ok(report) => report,
            Err(e) => {
                if let Err(fe) = finalized {
                    tracing::warn!("[{}] Finalizer also failed: {}", self.id, fe);
                }
                return Err(e);
            }
        };

        let read_error = match report.end {
            RelayEnd::EndOfStream => None,
            RelayEnd::ReadStopped(message) => Some(message),
            RelayEnd::ReadFailed(e) => {
                if let Err(fe) = finalized {
                    tracing::warn!("[{}] Finalizer also failed: {}", self.id, fe);
                }
                return Err(e);
            }
        };
        finalized?;

        let summary = self.summary(report.stats, read_error);
        tracing::info!(
            "[{}] Remuxed {} packets ({} bytes) in {:.2}s",
            self.id,
            summary.packets,
            summary.bytes,
            summary.elapsed_secs
        );
        Ok(summary)
    }

    /// Write the trailer and release input and output. Runs once; later
    /// calls are no-ops.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == SessionState::Finalized {
            return Ok(());
        }
        self.state = SessionState::Finalized;
        let result = self.output.finalize();
        self.input.release();
        result
    }

    fn summary(&self, stats: RelayStats, read_error: Option<String>) -> RemuxSummary {
        let streams = self
            .input
            .streams()
            .iter()
            .zip(self.output.streams())
            .map(|(input, output)| {
                let stats = stats.per_stream.get(input.index).cloned().unwrap_or_default();
                StreamSummary {
                    index: input.index,
                    kind: input.kind,
                    codec: input.codec.codec_name(),
                    input_time_base: input.time_base,
                    output_time_base: output.time_base,
                    duration_secs: stats.end_ts.map(|ts| output.time_base.to_secs(ts)),
                    stats,
                }
            })
            .collect();

        RemuxSummary {
            session_id: self.id.to_string(),
            input: self.input.path().to_path_buf(),
            output: self.output.path().to_path_buf(),
            streams,
            packets: stats.packets,
            bytes: stats.bytes,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            read_error,
        }
    }
}

impl<L: ContainerLibrary> Drop for MediaSession<L> {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::warn!("[{}] Finalize on drop failed: {}", self.id, e);
        }
    }
}
