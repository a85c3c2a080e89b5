use thiserror::Error;

use crate::frame::AudioFormat;

/// Main error type for the repacketizer
#[derive(Error, Debug)]
pub enum PackError {
    /// The sample buffer could not grow to hold the incoming samples
    #[error("Allocation failed: could not reserve {requested} bytes for sample buffer")]
    Allocation { requested: usize },

    /// More samples were requested from the sample buffer than it holds
    #[error("Insufficient data: requested {requested} samples, {available} available")]
    InsufficientData { requested: usize, available: usize },

    /// Invalid filter configuration, rejected before any frame is processed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A frame's format descriptor disagrees with the one captured from the first frame
    #[error("Format mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        expected: AudioFormat,
        actual: AudioFormat,
    },

    /// A frame whose planes do not match its own format and sample count
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// A computed timestamp does not fit the output range
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Upstream kept answering not-ready while being driven to completion
    #[error("Upstream stalled after {0} consecutive not-ready responses")]
    UpstreamStalled(usize),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed or written
    #[error("Config file error: {0}")]
    ConfigFile(String),

    /// An error originating from the underlying FFmpeg library
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),
}

/// FFmpeg-specific errors
#[cfg(feature = "ffmpeg")]
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    #[error("No audio stream found: {0}")]
    NoAudioStream(String),

    #[error("Failed to find decoder: {0}")]
    DecoderNotFound(String),

    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    #[error("Failed to read frame: {0}")]
    ReadFrame(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PackError>;
