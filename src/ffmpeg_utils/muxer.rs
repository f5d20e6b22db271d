use ffmpeg_next as ffmpeg;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::container::Muxer;
use crate::error::{FfmpegError, RemuxError, Result};
use crate::ffmpeg_utils::helpers::path_to_cstring;
use crate::media::{ts_to_option, Packet};
use crate::timebase::Timebase;

/// Muxer over an `AVFormatContext` allocated for writing
///
/// Unlike `ffmpeg::format::output`, the context is allocated without
/// touching the filesystem; the file is only opened by [`Muxer::open_io`],
/// and never for formats flagged `AVFMT_NOFILE`.
pub struct FfmpegMuxer {
    output: Option<ffmpeg::format::context::Output>,
    path: PathBuf,
    c_path: CString,
    needs_file: bool,
    io_open: bool,
}

impl FfmpegMuxer {
    /// Allocate an output context. The format is guessed from `path` unless
    /// `format` names one.
    pub fn create(path: &Path, format: Option<&str>) -> Result<Self> {
        let c_path = path_to_cstring(path)?;
        let c_format = format
            .map(|f| {
                CString::new(f).map_err(|_| RemuxError::Format(format!("bad format name {:?}", f)))
            })
            .transpose()?;

        let mut ctx: *mut ffmpeg::ffi::AVFormatContext = ptr::null_mut();
        // SAFETY: all pointers are either null or valid NUL-terminated
        // strings that outlive the call.
        let ret = unsafe {
            ffmpeg::ffi::avformat_alloc_output_context2(
                &mut ctx,
                ptr::null_mut(),
                c_format.as_ref().map_or(ptr::null(), |f| f.as_ptr()),
                c_path.as_ptr(),
            )
        };
        if ret < 0 || ctx.is_null() {
            let reason = if ret < 0 {
                ffmpeg::Error::from(ret).to_string()
            } else {
                "no matching muxer".to_string()
            };
            return Err(RemuxError::Format(format!(
                "cannot create output for {}: {}",
                path.display(),
                reason
            )));
        }

        // SAFETY: `ctx` is non-null and `oformat` is set by a successful
        // `avformat_alloc_output_context2`.
        let (needs_file, name) = unsafe {
            let oformat = (*ctx).oformat;
            if oformat.is_null() {
                ffmpeg::ffi::avformat_free_context(ctx);
                return Err(FfmpegError::AllocFailed("output format".to_string()).into());
            }
            let flags = (*oformat).flags as i32;
            let name = std::ffi::CStr::from_ptr((*oformat).name)
                .to_string_lossy()
                .into_owned();
            (flags & ffmpeg::ffi::AVFMT_NOFILE as i32 == 0, name)
        };

        tracing::debug!("Allocated {} muxer for {:?}", name, path);

        // SAFETY: ownership of `ctx` moves into the wrapper, which frees it
        // (and closes `pb`) on drop.
        let output = unsafe { ffmpeg::format::context::Output::wrap(ctx) };

        Ok(Self {
            output: Some(output),
            path: path.to_path_buf(),
            c_path,
            needs_file,
            io_open: false,
        })
    }

    fn context(&mut self) -> Result<&mut ffmpeg::format::context::Output> {
        self.output
            .as_mut()
            .ok_or_else(|| RemuxError::Write(format!("{} is closed", self.path.display())))
    }
}

impl Muxer for FfmpegMuxer {
    type Codec = ffmpeg::codec::Parameters;
    type Payload = ffmpeg::Packet;

    fn add_stream(
        &mut self,
        codec: &ffmpeg::codec::Parameters,
        time_base: Option<Timebase>,
    ) -> Result<usize> {
        let output = self.context()?;
        let mut stream = output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| RemuxError::Format(format!("Failed to add stream: {}", e)))?;
        stream.set_parameters(codec.clone());
        if let Some(tb) = time_base {
            stream.set_time_base(ffmpeg::Rational::from(tb));
        }
        Ok(stream.index())
    }

    fn needs_file(&self) -> bool {
        self.needs_file
    }

    fn open_io(&mut self) -> Result<()> {
        let c_path = self.c_path.clone();
        let path = self.path.clone();
        let output = self.context()?;
        // SAFETY: `pb` belongs to the live context and is null until this
        // call succeeds.
        let ret = unsafe {
            ffmpeg::ffi::avio_open(
                &mut (*output.as_mut_ptr()).pb,
                c_path.as_ptr(),
                ffmpeg::ffi::AVIO_FLAG_WRITE as i32,
            )
        };
        if ret < 0 {
            return Err(RemuxError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("cannot open {}: {}", path.display(), ffmpeg::Error::from(ret)),
            )));
        }
        self.io_open = true;
        Ok(())
    }

    fn write_header(&mut self, options: &[(String, String)]) -> Result<()> {
        let mut opts = ffmpeg::Dictionary::new();
        for (key, value) in options {
            opts.set(key, value);
        }

        let output = self.context()?;
        let unused = output
            .write_header_with(opts)
            .map_err(|e| RemuxError::HeaderWrite(e.to_string()))?;
        for (key, value) in unused.iter() {
            tracing::warn!("Muxer ignored option {}={}", key, value);
        }
        Ok(())
    }

    fn time_base(&self, index: usize) -> Option<Timebase> {
        self.output
            .as_ref()
            .and_then(|o| o.stream(index))
            .map(|s| Timebase::from(s.time_base()))
    }

    fn write_packet(&mut self, packet: Packet<ffmpeg::Packet>) -> Result<()> {
        let Packet {
            stream_index,
            pts,
            dts,
            duration,
            position,
            payload: mut av_packet,
            ..
        } = packet;

        av_packet.set_stream(stream_index);
        av_packet.set_pts(ts_to_option(pts));
        av_packet.set_dts(ts_to_option(dts));
        av_packet.set_duration(duration);
        av_packet.set_position(position as isize);

        let output = self.context()?;
        av_packet
            .write_interleaved(output)
            .map_err(|e| RemuxError::Write(format!("stream {}: {}", stream_index, e)))
    }

    fn write_trailer(&mut self) -> Result<()> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| RemuxError::TrailerWrite("output is closed".to_string()))?;
        output
            .write_trailer()
            .map_err(|e| RemuxError::TrailerWrite(e.to_string()))
    }

    fn close(&mut self) {
        let Some(mut output) = self.output.take() else {
            return;
        };
        if self.io_open {
            // SAFETY: `pb` was opened by `avio_open`; `avio_closep` nulls it
            // so the context destructor does not close it again.
            unsafe {
                ffmpeg::ffi::avio_closep(&mut (*output.as_mut_ptr()).pb);
            }
            self.io_open = false;
        }
        drop(output);
        tracing::trace!("Closed output context for {:?}", self.path);
    }
}
