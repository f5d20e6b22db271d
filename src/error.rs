use thiserror::Error;

/// Main error type for remuxing
#[derive(Error, Debug)]
pub enum RemuxError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be opened or probed
    #[error("Failed to open input: {0}")]
    Open(String),

    /// The output container format is unknown or cannot hold the streams
    #[error("Output format error: {0}")]
    Format(String),

    /// The container header could not be written
    #[error("Failed to write header: {0}")]
    HeaderWrite(String),

    /// Reading a packet from the input failed (distinct from end of input)
    #[error("Failed to read packet: {0}")]
    Read(String),

    /// Writing a packet to the output failed
    #[error("Failed to write packet: {0}")]
    Write(String),

    /// The container trailer could not be written
    #[error("Failed to write trailer: {0}")]
    TrailerWrite(String),

    /// A packet referenced a stream with no descriptor
    #[error("Packet references unknown stream index {0}")]
    UnknownStream(usize),

    /// Configuration, command line or batch file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more batch jobs failed
    #[error("Batch failed: {failed} of {total} jobs")]
    Batch { failed: usize, total: usize },

    /// A batch worker task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl RemuxError {
    /// Process status code for this error. Success is 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            RemuxError::Open(_) => 2,
            RemuxError::Format(_) => 3,
            RemuxError::HeaderWrite(_) => 4,
            RemuxError::Read(_) => 5,
            RemuxError::Write(_) => 6,
            RemuxError::TrailerWrite(_) => 7,
            RemuxError::UnknownStream(_) => 8,
            RemuxError::Config(_) => 9,
            RemuxError::Io(_) => 10,
            RemuxError::Ffmpeg(_) => 11,
            RemuxError::Batch { .. } => 12,
            RemuxError::Task(_) => 13,
        }
    }
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// A library allocation returned null
    #[error("Allocation failed: {0}")]
    AllocFailed(String),

    /// A path could not be handed to the C API
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RemuxError>;
