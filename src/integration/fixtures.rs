//! Test fixtures for integration tests
//!
//! An in-memory container library: inputs are scripted packet lists, outputs
//! record everything the pipeline asks of them.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::container::{ContainerLibrary, Demuxer, Muxer, ReadOutcome};
use crate::error::{RemuxError, Result};
use crate::media::{CodecParameters, MediaKind, Packet, StreamDescriptor};
use crate::timebase::Timebase;

pub const VIDEO_TB: Timebase = Timebase::new(1, 90000);
pub const AUDIO_TB: Timebase = Timebase::new(1, 48000);
pub const MUXER_TB: Timebase = Timebase::new(1, 1000);

/// 'avc1' as a little-endian fourcc
pub const AVC1_TAG: u32 = u32::from_le_bytes(*b"avc1");

#[derive(Debug, Clone, PartialEq)]
pub struct MockCodec {
    pub kind: MediaKind,
    pub name: &'static str,
    pub tag: u32,
    pub extradata: Bytes,
}

impl MockCodec {
    pub fn h264() -> Self {
        Self {
            kind: MediaKind::Video,
            name: "h264",
            tag: AVC1_TAG,
            extradata: Bytes::from_static(&[0x01, 0x64, 0x00, 0x1f]),
        }
    }

    pub fn aac() -> Self {
        Self {
            kind: MediaKind::Audio,
            name: "aac",
            tag: 0,
            extradata: Bytes::from_static(&[0x11, 0x90]),
        }
    }
}

impl CodecParameters for MockCodec {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn codec_name(&self) -> String {
        self.name.to_string()
    }

    fn codec_tag(&self) -> u32 {
        self.tag
    }

    fn clear_codec_tag(&mut self) {
        self.tag = 0;
    }
}

/// One step of a scripted input
#[derive(Debug, Clone)]
pub enum Scripted {
    Packet(Packet<Bytes>),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct MockSource {
    pub streams: Vec<StreamDescriptor<MockCodec>>,
    pub script: Vec<Scripted>,
}

/// Everything the muxer and demuxer were asked to do
#[derive(Debug, Default)]
pub struct MuxRecord {
    /// Codec and timebase hint per added stream
    pub streams: Vec<(MockCodec, Option<Timebase>)>,
    pub header_options: Vec<(String, String)>,
    pub headers: usize,
    pub packets: Vec<Packet<Bytes>>,
    pub trailers: usize,
    /// Counts every `close` call, repeated or not
    pub muxer_closes: usize,
    pub demuxer_closes: usize,
    pub io_opened: bool,
}

pub struct MockLibrary {
    sources: HashMap<PathBuf, MockSource>,
    pub chosen_time_base: Timebase,
    pub nofile: bool,
    pub fail_header: bool,
    pub fail_trailer: bool,
    pub fail_write_at: Option<usize>,
    pub record: Arc<Mutex<MuxRecord>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            chosen_time_base: MUXER_TB,
            nofile: false,
            fail_header: false,
            fail_trailer: false,
            fail_write_at: None,
            record: Arc::new(Mutex::new(MuxRecord::default())),
        }
    }

    pub fn with_source<P: Into<PathBuf>>(mut self, path: P, source: MockSource) -> Self {
        self.sources.insert(path.into(), source);
        self
    }
}

pub struct MockDemuxer {
    streams: Vec<StreamDescriptor<MockCodec>>,
    script: VecDeque<Scripted>,
    record: Arc<Mutex<MuxRecord>>,
}

impl Demuxer for MockDemuxer {
    type Codec = MockCodec;
    type Payload = Bytes;

    fn streams(&self) -> Vec<StreamDescriptor<MockCodec>> {
        self.streams.clone()
    }

    fn read_packet(&mut self) -> Result<ReadOutcome<Bytes>> {
        match self.script.pop_front() {
            Some(Scripted::Packet(packet)) => Ok(ReadOutcome::Packet(packet)),
            Some(Scripted::Error(message)) => Err(RemuxError::Read(message)),
            None => Ok(ReadOutcome::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.record.lock().demuxer_closes += 1;
    }
}

pub struct MockMuxer {
    path: PathBuf,
    nofile: bool,
    fail_header: bool,
    fail_trailer: bool,
    fail_write_at: Option<usize>,
    hints: Vec<Option<Timebase>>,
    chosen: Timebase,
    header_written: bool,
    record: Arc<Mutex<MuxRecord>>,
}

impl Muxer for MockMuxer {
    type Codec = MockCodec;
    type Payload = Bytes;

    fn add_stream(&mut self, codec: &MockCodec, time_base: Option<Timebase>) -> Result<usize> {
        self.hints.push(time_base);
        let mut record = self.record.lock();
        record.streams.push((codec.clone(), time_base));
        Ok(record.streams.len() - 1)
    }

    fn needs_file(&self) -> bool {
        !self.nofile
    }

    fn open_io(&mut self) -> Result<()> {
        std::fs::File::create(&self.path)?;
        self.record.lock().io_opened = true;
        Ok(())
    }

    fn write_header(&mut self, options: &[(String, String)]) -> Result<()> {
        if self.fail_header {
            return Err(RemuxError::HeaderWrite("mock header failure".to_string()));
        }
        let mut record = self.record.lock();
        record.header_options = options.to_vec();
        record.headers += 1;
        self.header_written = true;
        Ok(())
    }

    fn time_base(&self, index: usize) -> Option<Timebase> {
        let hint = *self.hints.get(index)?;
        if self.header_written {
            Some(hint.unwrap_or(self.chosen))
        } else {
            hint
        }
    }

    fn write_packet(&mut self, packet: Packet<Bytes>) -> Result<()> {
        let mut record = self.record.lock();
        if self.fail_write_at == Some(record.packets.len()) {
            return Err(RemuxError::Write("mock write failure".to_string()));
        }
        record.packets.push(packet);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if self.fail_trailer {
            return Err(RemuxError::TrailerWrite("mock trailer failure".to_string()));
        }
        self.record.lock().trailers += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.record.lock().muxer_closes += 1;
    }
}

impl ContainerLibrary for MockLibrary {
    type Codec = MockCodec;
    type Payload = Bytes;
    type Demuxer = MockDemuxer;
    type Muxer = MockMuxer;

    fn open_demuxer(&self, path: &Path) -> Result<MockDemuxer> {
        let source = self
            .sources
            .get(path)
            .ok_or_else(|| RemuxError::Open(format!("{}: No such file", path.display())))?;
        Ok(MockDemuxer {
            streams: source.streams.clone(),
            script: source.script.iter().cloned().collect(),
            record: Arc::clone(&self.record),
        })
    }

    fn open_muxer(&self, path: &Path, format: Option<&str>) -> Result<MockMuxer> {
        let format = format
            .map(str::to_string)
            .or_else(|| path.extension().map(|e| e.to_string_lossy().into_owned()));
        if format.as_deref().map_or(true, |f| f == "bogus") {
            return Err(RemuxError::Format(format!(
                "cannot create output for {}",
                path.display()
            )));
        }
        Ok(MockMuxer {
            path: path.to_path_buf(),
            nofile: self.nofile,
            fail_header: self.fail_header,
            fail_trailer: self.fail_trailer,
            fail_write_at: self.fail_write_at,
            hints: Vec::new(),
            chosen: self.chosen_time_base,
            header_written: false,
            record: Arc::clone(&self.record),
        })
    }
}

pub fn packet(
    stream: usize,
    pts: i64,
    duration: i64,
    keyframe: bool,
    position: i64,
) -> Packet<Bytes> {
    let payload = Bytes::from(vec![stream as u8; 16 + pts.rem_euclid(7) as usize]);
    let mut pkt = Packet::new(stream, payload.clone(), payload.len());
    pkt.pts = pts;
    pkt.dts = pts;
    pkt.duration = duration;
    pkt.keyframe = keyframe;
    pkt.position = position;
    pkt
}

/// Video (1/90000) and audio (1/48000) with ten packets interleaved as
/// v0 a0 a1 v1 a2 v2 a3 v3 a4 v4
pub fn video_audio_source() -> MockSource {
    let streams = vec![
        StreamDescriptor::new(0, VIDEO_TB, MockCodec::h264()),
        StreamDescriptor::new(1, AUDIO_TB, MockCodec::aac()),
    ];
    let video = |i: i64| packet(0, i * 3003, 3003, i == 0, 1000 + i * 500);
    let audio = |i: i64| packet(1, i * 1024, 1024, true, 1200 + i * 500);
    let script = vec![
        video(0),
        audio(0),
        audio(1),
        video(1),
        audio(2),
        video(2),
        audio(3),
        video(3),
        audio(4),
        video(4),
    ]
    .into_iter()
    .map(Scripted::Packet)
    .collect();
    MockSource { streams, script }
}

/// Same streams as [`video_audio_source`], no packets
pub fn empty_source() -> MockSource {
    MockSource {
        script: Vec::new(),
        ..video_audio_source()
    }
}
