use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

use crate::container::{Demuxer, ReadOutcome};
use crate::error::{RemuxError, Result};
use crate::media::{ts_from_option, Packet, StreamDescriptor};

/// Demuxer over an `AVFormatContext` opened for reading
pub struct FfmpegDemuxer {
    input: Option<ffmpeg::format::context::Input>,
    path: PathBuf,
}

impl FfmpegDemuxer {
    /// Open `path` and read its stream information
    pub fn open(path: &Path) -> Result<Self> {
        let input = ffmpeg::format::input(&path)
            .map_err(|e| RemuxError::Open(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            "Probed {:?} as {}",
            path,
            input.format().name()
        );

        Ok(Self {
            input: Some(input),
            path: path.to_path_buf(),
        })
    }
}

impl Demuxer for FfmpegDemuxer {
    type Codec = ffmpeg::codec::Parameters;
    type Payload = ffmpeg::Packet;

    fn streams(&self) -> Vec<StreamDescriptor<ffmpeg::codec::Parameters>> {
        let Some(input) = &self.input else {
            return Vec::new();
        };
        input
            .streams()
            .map(|s| StreamDescriptor::new(s.index(), s.time_base().into(), s.parameters().clone()))
            .collect()
    }

    fn read_packet(&mut self) -> Result<ReadOutcome<ffmpeg::Packet>> {
        let Some(input) = self.input.as_mut() else {
            return Ok(ReadOutcome::EndOfStream);
        };

        loop {
            let mut packet = ffmpeg::Packet::empty();
            match packet.read(input) {
                Ok(()) => {
                    let mut out = Packet::new(packet.stream(), (), packet.size());
                    out.pts = ts_from_option(packet.pts());
                    out.dts = ts_from_option(packet.dts());
                    out.duration = packet.duration();
                    out.position = packet.position() as i64;
                    out.keyframe = packet.is_key();
                    return Ok(ReadOutcome::Packet(out.with_payload(packet)));
                }
                Err(ffmpeg::Error::Eof) => return Ok(ReadOutcome::EndOfStream),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    std::thread::yield_now();
                    continue;
                }
                Err(e) => {
                    return Err(RemuxError::Read(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    )))
                }
            }
        }
    }

    fn close(&mut self) {
        if self.input.take().is_some() {
            tracing::trace!("Closed input context for {:?}", self.path);
        }
    }
}
