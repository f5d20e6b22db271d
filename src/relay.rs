//! Packet relay loop
//!
//! Moves packets from the input to the output in arrival order, converting
//! their timing from the input stream's timebase to the output stream's.

use serde::Serialize;

use crate::config::ReadErrorPolicy;
use crate::container::{Demuxer, Muxer, ReadOutcome};
use crate::error::{RemuxError, Result};
use crate::input::Input;
use crate::media::Packet;
use crate::output::Output;
use crate::timebase::{rescale, rescale_ts, Timebase, UNKNOWN_POSITION};

/// Relay loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Reading,
    Done,
}

/// Why the loop reached `Done`
#[derive(Debug)]
pub enum RelayEnd {
    /// The input reported end of stream
    EndOfStream,
    /// A read failed and the policy says to stop quietly
    ReadStopped(String),
    /// A read failed and the policy says to report it after finalizing
    ReadFailed(RemuxError),
}

/// Per-stream counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub packets: u64,
    pub bytes: u64,
    pub keyframes: u64,
    /// Packets carrying neither a pts nor a dts
    pub untimed: u64,
    /// Largest `pts + duration` seen, in output ticks
    pub end_ts: Option<i64>,
}

/// Counters collected while relaying
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelayStats {
    pub packets: u64,
    pub bytes: u64,
    pub per_stream: Vec<StreamStats>,
}

impl RelayStats {
    fn with_streams(count: usize) -> Self {
        Self {
            per_stream: vec![StreamStats::default(); count],
            ..Default::default()
        }
    }

    fn record<P>(&mut self, packet: &Packet<P>) {
        self.packets += 1;
        self.bytes += packet.size as u64;
        if let Some(stream) = self.per_stream.get_mut(packet.stream_index) {
            stream.packets += 1;
            stream.bytes += packet.size as u64;
            if packet.keyframe {
                stream.keyframes += 1;
            }
            let ts = if packet.has_pts() {
                packet.pts
            } else if packet.has_dts() {
                packet.dts
            } else {
                stream.untimed += 1;
                return;
            };
            let end = ts.saturating_add(packet.duration.max(0));
            stream.end_ts = Some(stream.end_ts.map_or(end, |e| e.max(end)));
        }
    }
}

/// Outcome of a relay loop that reached `Done`
#[derive(Debug)]
pub struct RelayReport {
    pub stats: RelayStats,
    pub end: RelayEnd,
}

/// Convert a packet's timing from `from` to `to` and drop its byte position.
///
/// `pts`/`dts` round to nearest with sentinel pass-through, `duration` uses
/// plain rescaling.
pub fn rescale_packet<P>(packet: &mut Packet<P>, from: Timebase, to: Timebase) {
    packet.pts = rescale_ts(packet.pts, from, to);
    packet.dts = rescale_ts(packet.dts, from, to);
    packet.duration = rescale(packet.duration, from, to);
    packet.position = UNKNOWN_POSITION;
}

/// Relay every packet of `input` into `output`.
///
/// Returns `Err` for write failures and packets with unknown stream
/// indices. Read failures are reported through [`RelayEnd`] so the caller
/// can finalize before surfacing them.
pub fn relay<D, M>(
    input: &mut Input<D>,
    output: &mut Output<M>,
    policy: ReadErrorPolicy,
) -> Result<RelayReport>
where
    D: Demuxer,
    M: Muxer<Payload = D::Payload>,
{
    let mut stats = RelayStats::with_streams(input.streams().len());
    let mut state = RelayState::Reading;
    let mut end = RelayEnd::EndOfStream;

    while state == RelayState::Reading {
        let mut packet = match input.read_packet() {
            Ok(ReadOutcome::Packet(packet)) => packet,
            Ok(ReadOutcome::EndOfStream) => {
                state = RelayState::Done;
                continue;
            }
            Err(e) => {
                state = RelayState::Done;
                end = match policy {
                    ReadErrorPolicy::Stop => {
                        tracing::warn!(
                            "Read failed after {} packets, treating as end of input: {}",
                            stats.packets,
                            e
                        );
                        RelayEnd::ReadStopped(e.to_string())
                    }
                    ReadErrorPolicy::Fail => {
                        tracing::error!("Read failed after {} packets: {}", stats.packets, e);
                        RelayEnd::ReadFailed(e)
                    }
                };
                continue;
            }
        };

        let index = packet.stream_index;
        let in_tb = input
            .stream(index)
            .map(|s| s.time_base)
            .ok_or(RemuxError::UnknownStream(index))?;
        let out_tb = output
            .stream(index)
            .map(|s| s.time_base)
            .ok_or(RemuxError::UnknownStream(index))?;

        rescale_packet(&mut packet, in_tb, out_tb);
        stats.record(&packet);

        tracing::trace!(
            "Packet stream={} pts={} dts={} duration={} size={}",
            index,
            packet.pts,
            packet.dts,
            packet.duration,
            packet.size
        );

        output.write_packet(packet)?;
    }

    tracing::debug!(
        "Relayed {} packets ({} bytes)",
        stats.packets,
        stats.bytes
    );

    Ok(RelayReport { stats, end })
}
