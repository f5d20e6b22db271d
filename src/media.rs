//! Stream and packet model shared by every container backend

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timebase::{Timebase, NOPTS_VALUE, UNKNOWN_POSITION};

/// Kind of elementary stream carried by a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Data => "data",
            MediaKind::Attachment => "attachment",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec parameters as seen by the pipeline.
///
/// The pipeline never looks inside the parameters beyond these accessors.
/// `Clone` must produce an independent deep copy: input and output stream
/// descriptors never alias each other's parameters.
pub trait CodecParameters: Clone {
    /// Media kind of the stream these parameters describe
    fn kind(&self) -> MediaKind;

    /// Short codec name, for logging and summaries
    fn codec_name(&self) -> String;

    /// Container-specific codec tag (fourcc)
    fn codec_tag(&self) -> u32;

    /// Zero the codec tag so the destination muxer picks its own
    fn clear_codec_tag(&mut self);
}

/// One logical stream of an input or output container
#[derive(Debug, Clone)]
pub struct StreamDescriptor<C> {
    pub index: usize,
    pub kind: MediaKind,
    pub time_base: Timebase,
    pub codec: C,
}

impl<C: CodecParameters> StreamDescriptor<C> {
    pub fn new(index: usize, time_base: Timebase, codec: C) -> Self {
        Self {
            index,
            kind: codec.kind(),
            time_base,
            codec,
        }
    }
}

/// A unit of encoded data read from the input.
///
/// Timing fields are in the owning stream's timebase; `NOPTS_VALUE` marks an
/// unknown timestamp. The payload is opaque to the pipeline and is moved,
/// never modified.
#[derive(Debug, Clone)]
pub struct Packet<P> {
    pub stream_index: usize,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub position: i64,
    pub keyframe: bool,
    /// Payload size in bytes
    pub size: usize,
    pub payload: P,
}

impl<P> Packet<P> {
    /// A packet with unknown timing for the given stream
    pub fn new(stream_index: usize, payload: P, size: usize) -> Self {
        Self {
            stream_index,
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            position: UNKNOWN_POSITION,
            keyframe: false,
            size,
            payload,
        }
    }

    /// Same timing, different payload
    pub fn with_payload<Q>(self, payload: Q) -> Packet<Q> {
        Packet {
            stream_index: self.stream_index,
            pts: self.pts,
            dts: self.dts,
            duration: self.duration,
            position: self.position,
            keyframe: self.keyframe,
            size: self.size,
            payload,
        }
    }

    pub fn has_pts(&self) -> bool {
        self.pts != NOPTS_VALUE
    }

    pub fn has_dts(&self) -> bool {
        self.dts != NOPTS_VALUE
    }
}

/// Convert an FFmpeg-style optional timestamp into the sentinel form
pub fn ts_from_option(ts: Option<i64>) -> i64 {
    ts.unwrap_or(NOPTS_VALUE)
}

/// Convert a sentinel-form timestamp into an optional one
pub fn ts_to_option(ts: i64) -> Option<i64> {
    if ts == NOPTS_VALUE {
        None
    } else {
        Some(ts)
    }
}
