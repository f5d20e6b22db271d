//! Input opener

use std::path::{Path, PathBuf};

use crate::container::{ContainerLibrary, Demuxer, ReadOutcome};
use crate::error::Result;
use crate::media::{CodecParameters, StreamDescriptor};

/// An opened and probed source container
pub struct Input<D: Demuxer> {
    demuxer: D,
    streams: Vec<StreamDescriptor<D::Codec>>,
    path: PathBuf,
    released: bool,
}

impl<D: Demuxer> Input<D> {
    /// Open `path` and probe its streams
    pub fn open<L>(library: &L, path: &Path) -> Result<Self>
    where
        L: ContainerLibrary<Demuxer = D>,
    {
        let demuxer = library.open_demuxer(path)?;
        let streams = demuxer.streams();

        for stream in &streams {
            tracing::debug!(
                "Input stream {}: type={}, codec={}, timebase={}",
                stream.index,
                stream.kind,
                stream.codec.codec_name(),
                stream.time_base
            );
        }
        tracing::info!("Opened input {:?} with {} streams", path, streams.len());

        Ok(Self {
            demuxer,
            streams,
            path: path.to_path_buf(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probed streams in container order
    pub fn streams(&self) -> &[StreamDescriptor<D::Codec>] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor<D::Codec>> {
        self.streams.get(index)
    }

    /// Read the next packet in arrival order
    pub fn read_packet(&mut self) -> Result<ReadOutcome<D::Payload>> {
        if self.released {
            return Ok(ReadOutcome::EndOfStream);
        }
        self.demuxer.read_packet()
    }

    /// Release the demuxer. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.demuxer.close();
        tracing::debug!("Released input {:?}", self.path);
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<D: Demuxer> Drop for Input<D> {
    fn drop(&mut self) {
        self.release();
    }
}
