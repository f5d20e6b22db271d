//! Output mapper and finalizer
//!
//! Builds the destination container from the input's stream list, writes
//! its header, and later writes the trailer and releases it.

use std::path::{Path, PathBuf};

use crate::config::RemuxConfig;
use crate::container::{ContainerLibrary, Muxer};
use crate::error::{RemuxError, Result};
use crate::media::{CodecParameters, Packet, StreamDescriptor};

/// A destination container being written
pub struct Output<M: Muxer> {
    muxer: M,
    streams: Vec<StreamDescriptor<M::Codec>>,
    path: PathBuf,
    created_file: bool,
    header_written: bool,
    trailer_written: bool,
    released: bool,
}

impl<M: Muxer> Output<M> {
    /// Create the output for `path` with one stream per input stream, then
    /// write the header.
    ///
    /// Output stream `i` carries a copy of input stream `i`'s codec
    /// parameters with the codec tag cleared. If any step fails after the
    /// file was created, the incomplete file is removed.
    pub fn create<L>(
        library: &L,
        path: &Path,
        input_streams: &[StreamDescriptor<M::Codec>],
        config: &RemuxConfig,
    ) -> Result<Self>
    where
        L: ContainerLibrary<Muxer = M>,
    {
        let muxer = library.open_muxer(path, config.output_format.as_deref())?;
        let mut output = Self {
            muxer,
            streams: Vec::with_capacity(input_streams.len()),
            path: path.to_path_buf(),
            created_file: false,
            header_written: false,
            trailer_written: false,
            released: false,
        };

        match output.map_streams(input_streams, config) {
            Ok(()) => Ok(output),
            Err(e) => {
                output.discard();
                Err(e)
            }
        }
    }

    fn map_streams(
        &mut self,
        input_streams: &[StreamDescriptor<M::Codec>],
        config: &RemuxConfig,
    ) -> Result<()> {
        for input_stream in input_streams {
            let mut codec = input_stream.codec.clone();
            codec.clear_codec_tag();

            let hint = config.preserve_time_base.then_some(input_stream.time_base);
            let index = self.muxer.add_stream(&codec, hint)?;
            if index != input_stream.index {
                return Err(RemuxError::Format(format!(
                    "input stream {} was mapped to output stream {}",
                    input_stream.index, index
                )));
            }

            tracing::debug!(
                "Added output stream {}: type={}, codec={}",
                index,
                input_stream.kind,
                codec.codec_name()
            );
            self.streams.push(StreamDescriptor {
                index,
                kind: input_stream.kind,
                time_base: hint.unwrap_or(input_stream.time_base),
                codec,
            });
        }

        if self.muxer.needs_file() {
            self.muxer.open_io()?;
            self.created_file = true;
        } else {
            tracing::debug!("Output format writes without a file handle");
        }

        self.muxer.write_header(&config.muxer_option_pairs())?;
        self.header_written = true;

        // The muxer may have replaced the timebases while writing the header
        for stream in &mut self.streams {
            if let Some(tb) = self.muxer.time_base(stream.index) {
                stream.time_base = tb;
            }
            if !stream.time_base.is_valid() {
                tracing::warn!(
                    "Output stream {} has unusable timebase {}",
                    stream.index,
                    stream.time_base
                );
            }
        }

        tracing::info!(
            "Wrote header for {:?} with {} streams",
            self.path,
            self.streams.len()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output streams; timebases are the ones chosen by the muxer
    pub fn streams(&self) -> &[StreamDescriptor<M::Codec>] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor<M::Codec>> {
        self.streams.get(index)
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn trailer_written(&self) -> bool {
        self.trailer_written
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Write a packet already rescaled to the output timebase
    pub fn write_packet(&mut self, packet: Packet<M::Payload>) -> Result<()> {
        if self.released || !self.header_written {
            return Err(RemuxError::Write(format!(
                "output {:?} is not accepting packets",
                self.path
            )));
        }
        self.muxer.write_packet(packet)
    }

    /// Write the trailer (if the header was written) and release the output.
    ///
    /// Runs at most once; later calls return `Ok(())` without touching the
    /// muxer.
    pub fn finalize(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }

        let result = if self.header_written && !self.trailer_written {
            self.trailer_written = true;
            self.muxer.write_trailer()
        } else {
            Ok(())
        };

        self.release();
        if result.is_ok() {
            tracing::info!("Finalized output {:?}", self.path);
        }
        result
    }

    /// Close the I/O handle (if opened) and free the muxer. Safe to call
    /// more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.muxer.close();
        tracing::debug!("Released output {:?}", self.path);
    }

    /// Release and delete the file this output created
    fn discard(&mut self) {
        self.release();
        if self.created_file {
            self.created_file = false;
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove incomplete output {:?}: {}", self.path, e);
            } else {
                tracing::debug!("Removed incomplete output {:?}", self.path);
            }
        }
    }
}

impl<M: Muxer> Drop for Output<M> {
    fn drop(&mut self) {
        self.release();
    }
}
