//! Container library seam
//!
//! The pipeline never parses or writes container formats itself. It drives
//! a [`ContainerLibrary`] that hands out demuxers and muxers. The production
//! implementation is `ffmpeg_utils::FfmpegLibrary`; tests use an in-memory
//! one.

use std::path::Path;

use crate::error::Result;
use crate::media::{CodecParameters, Packet, StreamDescriptor};
use crate::timebase::Timebase;

/// Outcome of a successful read
#[derive(Debug)]
pub enum ReadOutcome<P> {
    Packet(Packet<P>),
    EndOfStream,
}

/// A source container opened for reading
pub trait Demuxer {
    type Codec: CodecParameters;
    type Payload;

    /// Streams discovered while probing, in container order
    fn streams(&self) -> Vec<StreamDescriptor<Self::Codec>>;

    /// Next packet in the container's natural interleaving.
    ///
    /// End of input is `Ok(ReadOutcome::EndOfStream)`; any other failure is
    /// an error.
    fn read_packet(&mut self) -> Result<ReadOutcome<Self::Payload>>;

    /// Release the underlying resources. Calling it again is a no-op.
    fn close(&mut self);
}

/// A destination container opened for writing
pub trait Muxer {
    type Codec: CodecParameters;
    type Payload;

    /// Declare a new output stream, returning its index.
    ///
    /// `time_base` is a hint; the muxer may pick another one while writing
    /// the header.
    fn add_stream(&mut self, codec: &Self::Codec, time_base: Option<Timebase>) -> Result<usize>;

    /// Whether the format needs an explicitly opened I/O handle
    /// (false for NOFILE formats).
    fn needs_file(&self) -> bool;

    /// Open the writable I/O handle for the output path
    fn open_io(&mut self) -> Result<()>;

    /// Write the container header. `options` are muxer private options.
    fn write_header(&mut self, options: &[(String, String)]) -> Result<()>;

    /// Timebase of an output stream. Reflects the muxer's choice once the
    /// header has been written.
    fn time_base(&self, index: usize) -> Option<Timebase>;

    /// Write one packet whose timing is already in the output timebase
    fn write_packet(&mut self, packet: Packet<Self::Payload>) -> Result<()>;

    /// Write the trailer/index structures
    fn write_trailer(&mut self) -> Result<()>;

    /// Close the I/O handle if one was opened and free the context.
    /// Calling it again is a no-op.
    fn close(&mut self);
}

/// Factory for demuxers and muxers sharing codec and payload types
pub trait ContainerLibrary {
    type Codec: CodecParameters;
    type Payload;
    type Demuxer: Demuxer<Codec = Self::Codec, Payload = Self::Payload>;
    type Muxer: Muxer<Codec = Self::Codec, Payload = Self::Payload>;

    /// Open and probe an input container
    fn open_demuxer(&self, path: &Path) -> Result<Self::Demuxer>;

    /// Allocate an output context for `path`. The format is inferred from
    /// the path unless `format` names one. No file is touched yet.
    fn open_muxer(&self, path: &Path, format: Option<&str>) -> Result<Self::Muxer>;
}
