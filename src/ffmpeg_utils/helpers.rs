use ffmpeg_next as ffmpeg;
use std::ffi::CString;
use std::path::Path;

use crate::error::FfmpegError;
use crate::media::{CodecParameters, MediaKind};

/// Map an FFmpeg media type onto ours
pub fn media_kind(medium: ffmpeg::media::Type) -> MediaKind {
    match medium {
        ffmpeg::media::Type::Video => MediaKind::Video,
        ffmpeg::media::Type::Audio => MediaKind::Audio,
        ffmpeg::media::Type::Subtitle => MediaKind::Subtitle,
        ffmpeg::media::Type::Data => MediaKind::Data,
        ffmpeg::media::Type::Attachment => MediaKind::Attachment,
        ffmpeg::media::Type::Unknown => MediaKind::Unknown,
    }
}

/// Convert a path for the C API. Fails on interior NUL bytes.
pub fn path_to_cstring(path: &Path) -> Result<CString, FfmpegError> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| FfmpegError::InvalidPath(path.display().to_string()))
}

impl CodecParameters for ffmpeg::codec::Parameters {
    fn kind(&self) -> MediaKind {
        media_kind(self.medium())
    }

    fn codec_name(&self) -> String {
        self.id().name().to_string()
    }

    fn codec_tag(&self) -> u32 {
        // SAFETY: `as_ptr` is a valid AVCodecParameters for the lifetime of
        // `self`; `codec_tag` is a plain integer field.
        unsafe { (*self.as_ptr()).codec_tag }
    }

    fn clear_codec_tag(&mut self) {
        // SAFETY: see `codec_tag`. `self` owns its parameters after `clone`.
        unsafe {
            (*self.as_mut_ptr()).codec_tag = 0;
        }
    }
}
